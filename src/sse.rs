//! Standalone Server-Sent Events parsing.
//!
//! Three different pieces of the runtime consume SSE: the Anthropic driver's
//! `messages` stream, an MCP server's `/sse` transport, and (already, before
//! this module existed) the OpenAI-compatible driver's chat completion
//! stream handled ad hoc in [`crate::utils::parse_sse_stream`]. This module
//! factors the wire-level parsing out so it isn't duplicated a third time:
//! [`SseParser`] is a restartable, line-oriented accumulator usable directly
//! against raw byte chunks (for transports, like the MCP SSE client, that
//! need to reconnect and resume parsing mid-stream), and [`sse_stream`]
//! adapts a `reqwest::Response` into a `Stream` of parsed [`SseEvent`]s using
//! the `eventsource-stream` crate for callers that just want events.

use crate::{Error, Result};
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;

/// A single parsed SSE event.
///
/// Per the SSE spec, `data` is the concatenation of every `data:` line in
/// the event (joined with `\n`), `event` defaults to `"message"` when the
/// stream never sends an `event:` field, and `id` is only set when the
/// stream sends one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Restartable, line-oriented SSE field accumulator.
///
/// Feed raw bytes (as they arrive off the wire, in whatever chunk sizes the
/// transport delivers) via [`SseParser::feed`]; complete events are
/// returned as soon as a blank line terminates them. Partial lines that
/// straddle a chunk boundary are buffered until the next `feed` call, so
/// callers never need to worry about alignment.
///
/// `comment:`-prefixed lines and blank keep-alive pings are consumed
/// silently, matching the SSE spec's `:`-prefixed comment convention.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: String,
    data_lines: Vec<String>,
    id: Option<String>,
}

impl SseParser {
    /// Create a fresh parser with no buffered state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every complete event it produced.
    ///
    /// Invalid UTF-8 at a chunk boundary is handled via lossy conversion,
    /// consistent with the rest of the streaming stack.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim_end_matches(['\r', '\n']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }

            if line.starts_with(':') {
                continue; // comment / keep-alive
            }

            self.consume_field(line);
        }

        events
    }

    /// Reset all in-progress event state without touching the line buffer.
    ///
    /// Used by transports that need to discard a partially-read event after
    /// a reconnect (the server will resend it from scratch).
    pub fn reset(&mut self) {
        self.event.clear();
        self.data_lines.clear();
        self.id = None;
    }

    fn consume_field(&mut self, line: &str) {
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => self.data_lines.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            "retry" => {} // reconnection hint, not surfaced as an event field
            _ => {}       // unknown field, ignored per spec
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() && self.event.is_empty() && self.id.is_none() {
            return None; // blank line with no preceding fields: nothing to dispatch
        }

        let event = SseEvent {
            event: if self.event.is_empty() {
                "message".to_string()
            } else {
                std::mem::take(&mut self.event)
            },
            data: self.data_lines.join("\n"),
            id: self.id.take(),
        };
        self.data_lines.clear();
        Some(event)
    }
}

/// Adapt an HTTP streaming response into a `Stream` of parsed [`SseEvent`]s.
///
/// This is the one-shot counterpart to [`SseParser`] for callers (the
/// Anthropic driver, the MCP SSE transport's initial connect) that hold a
/// live `reqwest::Response` and don't need to survive a reconnect mid-event.
pub fn sse_stream(response: reqwest::Response) -> Pin<Box<dyn Stream<Item = Result<SseEvent>> + Send>> {
    let stream = response.bytes_stream().eventsource().map(|result| {
        result
            .map(|event| SseEvent {
                event: if event.event.is_empty() {
                    "message".to_string()
                } else {
                    event.event
                },
                data: event.data,
                id: if event.id.is_empty() {
                    None
                } else {
                    Some(event.id)
                },
            })
            .map_err(|e| Error::protocol(format!("SSE stream error: {e}")))
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_field_event() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "hello");
        assert_eq!(events[0].id, None);
    }

    #[test]
    fn parses_event_and_id_fields() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: tool_call\nid: 42\ndata: {\"x\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "tool_call");
        assert_eq!(events[0].id, Some("42".to_string()));
        assert_eq!(events[0].data, "{\"x\":1}");
    }

    #[test]
    fn joins_multiple_data_lines_with_newline() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: line one\ndata: line two\n\n");
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn handles_chunk_boundary_mid_line() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: par").is_empty());
        let events = parser.feed(b"tial\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn ignores_comment_lines() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\ndata: real\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "real");
    }

    #[test]
    fn blank_line_with_no_fields_dispatches_nothing() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"\n\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn multiple_events_in_one_feed() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: one\n\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one");
        assert_eq!(events[1].data, "two");
    }

    #[test]
    fn reset_discards_in_progress_event() {
        let mut parser = SseParser::new();
        parser.feed(b"event: partial\ndata: unfinished");
        parser.reset();
        let events = parser.feed(b"data: fresh\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "fresh");
        assert_eq!(events[0].event, "message");
    }
}
