//! Crate-external coverage of `SseParser` edge cases not exercised by its
//! own inline unit tests: CRLF line endings, a `retry:` field being ignored
//! rather than surfaced, and a chunk boundary falling inside a field name.

use open_agent::SseParser;

#[test]
fn tolerates_crlf_line_endings() {
    let mut parser = SseParser::new();
    let events = parser.feed(b"event: ping\r\ndata: {\"ok\":true}\r\n\r\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "ping");
    assert_eq!(events[0].data, "{\"ok\":true}");
}

#[test]
fn retry_field_is_consumed_but_not_surfaced() {
    let mut parser = SseParser::new();
    let events = parser.feed(b"retry: 3000\ndata: hello\n\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, "hello");
}

#[test]
fn chunk_boundary_inside_a_field_name_still_parses() {
    let mut parser = SseParser::new();
    assert!(parser.feed(b"ev").is_empty());
    assert!(parser.feed(b"ent: endpoint\ndat").is_empty());
    let events = parser.feed(b"a: /mcp/session/abc\n\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "endpoint");
    assert_eq!(events[0].data, "/mcp/session/abc");
}

#[test]
fn unknown_field_names_are_ignored_per_spec() {
    let mut parser = SseParser::new();
    let events = parser.feed(b"foo: bar\ndata: still works\n\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, "still works");
}
