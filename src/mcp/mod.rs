//! Model Context Protocol (MCP) client.
//!
//! Grounded on `examples/original_source/libs/ac_core/src/mcp/{mcp,mcp_http,
//! mcp_sse}.c` and `include/agentc/mcp.h`: a JSON-RPC 2.0 client over one of
//! two transports ([`http::HttpTransport`] or [`sse_transport::SseTransport`]),
//! selected by URL shape, speaking the `initialize` → `notifications/initialized`
//! → `tools/list` → `tools/call` protocol sequence.

pub mod http;
pub mod sse_transport;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};

use crate::registry::ToolRegistry;
use crate::{Error, Result};

/// Matches `mcp_internal.h`'s `MCP_PROTOCOL_VERSION`.
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
/// Matches `mcp_internal.h`'s `MCP_DEFAULT_TIMEOUT_MS`.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CLIENT_NAME: &str = "open-agent-runtime";
const DEFAULT_CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Transport abstraction an [`McpClient`] drives.
///
/// `request`'s `id` doubles as the notification flag: `0` means "this is a
/// notification, don't wait for a reply" (the JSON-RPC request itself omits
/// an `id` field entirely — see [`build_request`]/[`build_notification`]).
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&mut self) -> Result<()>;
    async fn request(&mut self, json: &str, id: u64) -> Result<String>;
    async fn disconnect(&mut self);
}

/// True when `url` looks like a legacy HTTP+SSE MCP endpoint rather than a
/// Streamable HTTP one, mirroring `mcp.c`'s `is_sse_url`.
pub fn is_sse_url(url: &str) -> bool {
    url.ends_with("/sse") || url.ends_with("/sse/") || url.ends_with("/events")
}

/// Connection parameters for one MCP server.
#[derive(Debug, Clone)]
pub struct McpConfig {
    pub server_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub client_name: String,
    pub client_version: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            api_key: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
        }
    }
}

/// One entry in an MCP multi-server configuration file (spec.md §4.9).
///
/// Loaded from a JSON document shaped like:
/// ```json
/// { "servers": [ { "name": "search", "url": "http://localhost:9000/mcp" } ] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// The `{ "servers": [...] }` document `McpServerConfig`s are loaded from.
#[derive(Debug, Clone, Deserialize)]
pub struct McpServersFile {
    pub servers: Vec<McpServerConfig>,
}

impl McpServersFile {
    /// Parses a multi-server MCP config document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(Error::Json)
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = &McpServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }
}

/// A discovered remote tool's cached metadata.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    /// JSON Schema, same shape `Tool::input_schema` carries for local tools.
    pub parameters: Value,
}

/// Server identity returned from `initialize`.
#[derive(Debug, Clone, Default)]
pub struct McpServerInfo {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

/// A live connection to one MCP server.
pub struct McpClient {
    label: String,
    transport: Mutex<Box<dyn McpTransport>>,
    request_id: AtomicU64,
    connected: AtomicBool,
    client_name: String,
    client_version: String,
    server_info: RwLock<Option<McpServerInfo>>,
    tools: RwLock<Vec<McpToolInfo>>,
}

impl McpClient {
    /// Builds a client with the transport selected by [`is_sse_url`]. Does
    /// not connect yet; call [`McpClient::connect`] before discovering
    /// tools or calling any.
    pub fn new(config: McpConfig) -> Result<Self> {
        let transport: Box<dyn McpTransport> = if is_sse_url(&config.server_url) {
            Box::new(sse_transport::SseTransport::new(
                config.server_url.clone(),
                config.api_key.clone(),
                config.timeout,
            )?)
        } else {
            Box::new(http::HttpTransport::new(
                config.server_url.clone(),
                config.api_key.clone(),
                config.timeout,
            )?)
        };

        Ok(Self {
            label: config.server_url,
            transport: Mutex::new(transport),
            request_id: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            client_name: config.client_name,
            client_version: config.client_version,
            server_info: RwLock::new(None),
            tools: RwLock::new(Vec::new()),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn server_info(&self) -> Option<McpServerInfo> {
        self.server_info.read().await.clone()
    }

    pub async fn tools(&self) -> Vec<McpToolInfo> {
        self.tools.read().await.clone()
    }

    pub async fn tool_count(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Connects the transport, then runs `initialize` →
    /// `notifications/initialized`, per `ac_mcp_connect`.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut transport = self.transport.lock().await;
            transport.connect().await?;
        }

        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": self.client_name,
                "version": self.client_version,
            }
        });
        let result = self.call("initialize", Some(params)).await?;

        let info = McpServerInfo {
            protocol_version: result
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or(MCP_PROTOCOL_VERSION)
                .to_string(),
            name: result
                .get("serverInfo")
                .and_then(|s| s.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            version: result
                .get("serverInfo")
                .and_then(|s| s.get("version"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        };
        log::info!(
            "MCP: connected to {} ({} {})",
            self.label,
            info.name,
            info.version
        );
        *self.server_info.write().await = Some(info);
        self.connected.store(true, Ordering::SeqCst);

        // Required by the spec; some servers reject subsequent requests
        // without it. The response (if any) is ignored.
        self.notify("notifications/initialized", None).await?;

        Ok(())
    }

    pub async fn disconnect(&self) {
        let mut transport = self.transport.lock().await;
        transport.disconnect().await;
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Calls `tools/list` and replaces the cached tool set.
    pub async fn discover_tools(&self) -> Result<usize> {
        if !self.is_connected() {
            return Err(Error::not_connected("MCP client is not connected"));
        }

        let result = self.call("tools/list", None).await?;
        let mut discovered = Vec::new();

        if let Some(entries) = result.get("tools").and_then(Value::as_array) {
            for entry in entries {
                let Some(name) = entry.get("name").and_then(Value::as_str) else {
                    log::warn!("MCP: tool entry missing 'name', skipping");
                    continue;
                };
                let description = entry
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let parameters = entry
                    .get("inputSchema")
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}}));

                discovered.push(McpToolInfo {
                    name: name.to_string(),
                    description,
                    parameters,
                });
            }
        }

        let count = discovered.len();
        *self.tools.write().await = discovered;
        Ok(count)
    }

    /// Calls `tools/call` and collapses the `content` array per
    /// `ac_mcp_call_tool`: join `type == "text"` items with `\n`, wrapped as
    /// `{"result": "..."}`; fall back to the raw result if no text items
    /// are present.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        if !self.is_connected() {
            return Ok(json!({"error": "MCP not connected"}));
        }

        let params = json!({ "name": name, "arguments": arguments });
        let result = self.call("tools/call", Some(params)).await?;

        let Some(content) = result.get("content").and_then(Value::as_array) else {
            return Ok(json!({"result": Value::Null}));
        };

        let text_parts: Vec<&str> = content
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect();

        if text_parts.is_empty() {
            return Ok(result);
        }

        Ok(json!({ "result": text_parts.join("\n") }))
    }

    async fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Sends a request and parses its JSON-RPC envelope, raising
    /// [`Error::Backend`] for an `error` object per `mcp_parse_response`.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_request_id().await;
        let request = build_request(id, method, params);
        let raw = {
            let mut transport = self.transport.lock().await;
            transport.request(&request, id).await?
        };
        parse_response(&raw)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let request = build_notification(method, params);
        let mut transport = self.transport.lock().await;
        transport.request(&request, 0).await?;
        Ok(())
    }
}

/// JSON-RPC 2.0 request envelope, per `mcp_build_request`. `params` is
/// omitted entirely (not sent as `{}`) when absent — some servers reject an
/// explicit empty object.
fn build_request(id: u64, method: &str, params: Option<Value>) -> String {
    let mut body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(params) = params {
        body["params"] = params;
    }
    body.to_string()
}

/// JSON-RPC 2.0 notification (no `id`), per `mcp_build_notification`.
fn build_notification(method: &str, params: Option<Value>) -> String {
    let mut body = json!({
        "jsonrpc": "2.0",
        "method": method,
    });
    if let Some(params) = params {
        body["params"] = params;
    }
    body.to_string()
}

/// Parses a JSON-RPC response, mapping a top-level `error` to
/// [`Error::Backend`], per `mcp_parse_response`.
fn parse_response(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }

    let parsed: Value = serde_json::from_str(raw).map_err(Error::Json)?;

    if let Some(error) = parsed.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown MCP error");
        return Err(Error::backend(format!("MCP error {code}: {message}")));
    }

    Ok(parsed.get("result").cloned().unwrap_or_else(|| json!({})))
}

/// Connects to every enabled server in `config`, discovers its tools, and
/// registers them, per `ac_mcp_connect_all`. Failures are logged and
/// skipped rather than aborting the whole batch; returns the number of
/// servers that ended up contributing tools.
pub async fn connect_all(config: &McpServersFile, registry: &ToolRegistry) -> usize {
    let mut connected = 0;

    for entry in config.enabled_servers() {
        let label = entry.name.clone().unwrap_or_else(|| entry.url.clone());
        log::info!("MCP: connecting to {label}");

        let mcp_config = McpConfig {
            server_url: entry.url.clone(),
            api_key: entry.api_key.clone(),
            timeout: Duration::from_millis(entry.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            ..McpConfig::default()
        };

        let client = match McpClient::new(mcp_config) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                log::warn!("MCP: failed to create client for {label}: {e}");
                continue;
            }
        };

        if let Err(e) = client.connect().await {
            log::warn!("MCP: failed to connect to {label}: {e}");
            continue;
        }

        if let Err(e) = client.discover_tools().await {
            log::warn!("MCP: failed to discover tools from {label}: {e}");
            continue;
        }

        let tool_count = client.tool_count().await;
        match registry.add_mcp(client).await {
            Ok(added) => {
                connected += 1;
                log::info!("MCP: {label}: connected, {added}/{tool_count} tools added");
            }
            Err(e) => log::warn!("MCP: failed to register tools from {label}: {e}"),
        }
    }

    connected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_sse_url_matches_known_suffixes() {
        assert!(is_sse_url("http://localhost:9000/sse"));
        assert!(is_sse_url("http://localhost:9000/sse/"));
        assert!(is_sse_url("http://localhost:9000/events"));
        assert!(!is_sse_url("http://localhost:9000/mcp"));
    }

    #[test]
    fn build_request_omits_params_when_absent() {
        let request = build_request(1, "ping", None);
        let parsed: Value = serde_json::from_str(&request).unwrap();
        assert!(parsed.get("params").is_none());
        assert_eq!(parsed["id"], 1);
    }

    #[test]
    fn build_notification_has_no_id() {
        let request = build_notification("notifications/initialized", None);
        let parsed: Value = serde_json::from_str(&request).unwrap();
        assert!(parsed.get("id").is_none());
    }

    #[test]
    fn parse_response_surfaces_backend_error() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"no such method"}}"#;
        let err = parse_response(raw).unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[test]
    fn parse_response_defaults_missing_result_to_empty_object() {
        let raw = r#"{"jsonrpc":"2.0","id":1}"#;
        let result = parse_response(raw).unwrap();
        assert_eq!(result, json!({}));
    }

    #[test]
    fn servers_file_parses_minimal_entry() {
        let file = McpServersFile::from_json(r#"{"servers":[{"url":"http://localhost:9000/mcp"}]}"#)
            .unwrap();
        assert_eq!(file.servers.len(), 1);
        assert!(file.servers[0].enabled);
        assert!(file.servers[0].name.is_none());
    }
}
