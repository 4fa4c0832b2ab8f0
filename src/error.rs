//! Error types for the Open Agent Runtime
//!
//! The taxonomy below mirrors the status codes a native agent runtime would
//! return across an FFI boundary (`ac_status_t` in the original C design):
//! each variant names a distinct failure domain so callers can match on
//! kind rather than parsing message strings.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// API error from the model server
    #[error("API error: {0}")]
    Api(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// Argument failed validation before any I/O was attempted
    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    /// An arena or other bounded allocator is out of budget
    #[error("Out of memory: {0}")]
    NoMemory(String),

    /// Low-level network failure (connection refused/reset, DNS aside)
    #[error("Network error: {0}")]
    Network(String),

    /// TLS handshake or certificate validation failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// DNS resolution failure
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    /// Non-2xx HTTP response, with the status code carried alongside
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// An operation was attempted before the owning object finished setup
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// The backend (LLM provider or MCP server) returned an application-level error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feature is recognized but intentionally unimplemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Requested entity (tool, server, session) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An operation requiring a live connection was attempted while disconnected
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Malformed or unexpected wire protocol framing (JSON-RPC, SSE, chat API)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Well-formed transport but content couldn't be parsed into the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// A streamed/buffered response exceeded the configured size ceiling
    #[error("Response too large: {0}")]
    ResponseTooLarge(String),

    /// Operation invalid for the object's current state (e.g. calling a tool
    /// on a session that has already been destroyed)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Create a new invalid argument error
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Error::InvalidArg(msg.into())
    }

    /// Create a new out-of-memory error
    pub fn no_memory(msg: impl Into<String>) -> Self {
        Error::NoMemory(msg.into())
    }

    /// Create a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Create a new not-initialized error
    pub fn not_initialized(msg: impl Into<String>) -> Self {
        Error::NotInitialized(msg.into())
    }

    /// Create a new backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Error::Backend(msg.into())
    }

    /// Create a new not-implemented error
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Error::NotImplemented(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a new not-connected error
    pub fn not_connected(msg: impl Into<String>) -> Self {
        Error::NotConnected(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create a new response-too-large error
    pub fn response_too_large(msg: impl Into<String>) -> Self {
        Error::ResponseTooLarge(msg.into())
    }

    /// Create a new invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, msg: impl Into<String>) -> Self {
        Error::HttpStatus {
            status,
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_config() {
        let err = Error::config("Invalid model");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model");
    }

    #[test]
    fn test_error_api() {
        let err = Error::api("500 Internal Server Error");
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(err.to_string(), "API error: 500 Internal Server Error");
    }

    #[test]
    fn test_error_stream() {
        let err = Error::stream("Connection lost");
        assert!(matches!(err, Error::Stream(_)));
        assert_eq!(err.to_string(), "Streaming error: Connection lost");
    }

    #[test]
    fn test_error_tool() {
        let err = Error::tool("Tool not found");
        assert!(matches!(err, Error::Tool(_)));
        assert_eq!(err.to_string(), "Tool execution error: Tool not found");
    }

    #[test]
    fn test_error_invalid_input() {
        let err = Error::invalid_input("Missing parameter");
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(err.to_string(), "Invalid input: Missing parameter");
    }

    #[test]
    fn test_error_timeout() {
        let err = Error::timeout();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(err.to_string(), "Request timeout");
    }

    #[test]
    fn test_error_other() {
        let err = Error::other("Something went wrong");
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(err.to_string(), "Error: Something went wrong");
    }

    #[test]
    fn test_error_from_reqwest() {
        fn _test_conversion(_e: reqwest::Error) -> Error {
            Error::Http(_e)
        }
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn _returns_result() -> Result<i32> {
            Ok(42)
        }

        fn _returns_error() -> Result<i32> {
            Err(Error::timeout())
        }
    }

    #[test]
    fn test_new_taxonomy_variants() {
        assert!(matches!(Error::invalid_arg("x"), Error::InvalidArg(_)));
        assert!(matches!(Error::no_memory("x"), Error::NoMemory(_)));
        assert!(matches!(Error::network("x"), Error::Network(_)));
        assert!(matches!(Error::not_initialized("x"), Error::NotInitialized(_)));
        assert!(matches!(Error::backend("x"), Error::Backend(_)));
        assert!(matches!(Error::not_implemented("x"), Error::NotImplemented(_)));
        assert!(matches!(Error::not_found("x"), Error::NotFound(_)));
        assert!(matches!(Error::not_connected("x"), Error::NotConnected(_)));
        assert!(matches!(Error::protocol("x"), Error::Protocol(_)));
        assert!(matches!(Error::parse("x"), Error::Parse(_)));
        assert!(matches!(
            Error::response_too_large("x"),
            Error::ResponseTooLarge(_)
        ));
        assert!(matches!(Error::invalid_state("x"), Error::InvalidState(_)));
        let status_err = Error::http_status(429, "rate limited");
        assert_eq!(status_err.to_string(), "HTTP 429: rate limited");
    }
}
