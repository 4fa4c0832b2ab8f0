//! End-to-end coverage of the MCP Streamable HTTP transport against a real
//! (mocked) JSON-RPC server, rather than a fake `McpTransport`: exercises
//! `McpClient::connect` -> `discover_tools` -> `call_tool` and
//! `ToolRegistry::add_mcp` over actual HTTP.

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, routing::post};
use open_agent::{McpClient, McpConfig, ToolRegistry};
use serde_json::{Value, json};

async fn mock_mcp_handler(Json(body): Json<Value>) -> Json<Value> {
    let method = body.get("method").and_then(Value::as_str).unwrap_or("");

    let result = match method {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "mock-mcp-server", "version": "1.2.3"},
            "capabilities": {}
        }),
        "notifications/initialized" => {
            // Notification: no meaningful reply expected, but the transport
            // still expects a JSON body back from this mock (a real server
            // may answer with an empty 202 instead; either is tolerated for
            // a request whose `id` is 0 on the wire).
            return Json(json!({}));
        }
        "tools/list" => json!({
            "tools": [
                {
                    "name": "echo",
                    "description": "Echoes its input back",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"text": {"type": "string"}},
                        "required": ["text"]
                    }
                }
            ]
        }),
        "tools/call" => {
            let args = body
                .get("params")
                .and_then(|p| p.get("arguments"))
                .cloned()
                .unwrap_or(json!({}));
            let text = args.get("text").and_then(Value::as_str).unwrap_or("");
            json!({
                "content": [
                    {"type": "text", "text": format!("echoed: {text}")}
                ]
            })
        }
        other => {
            return Json(json!({
                "jsonrpc": "2.0",
                "error": {"code": -32601, "message": format!("method not found: {other}")}
            }));
        }
    };

    Json(json!({
        "jsonrpc": "2.0",
        "id": body.get("id").cloned().unwrap_or(Value::Null),
        "result": result
    }))
}

async fn spawn_mock_server() -> String {
    let app = Router::new().route("/mcp", post(mock_mcp_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .unwrap();
    });
    format!("http://{addr}/mcp")
}

#[tokio::test]
async fn connects_discovers_and_calls_a_tool_over_http() {
    let url = spawn_mock_server().await;

    let client = McpClient::new(McpConfig {
        server_url: url,
        timeout: Duration::from_secs(5),
        ..McpConfig::default()
    })
    .unwrap();

    client.connect().await.unwrap();
    assert!(client.is_connected());

    let info = client.server_info().await.unwrap();
    assert_eq!(info.name, "mock-mcp-server");
    assert_eq!(info.version, "1.2.3");

    let count = client.discover_tools().await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(client.tools().await[0].name, "echo");

    let result = client
        .call_tool("echo", json!({"text": "hello"}))
        .await
        .unwrap();
    assert_eq!(result["result"], "echoed: hello");

    client.disconnect().await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn registry_add_mcp_wraps_discovered_tools_as_callable_entries() {
    let url = spawn_mock_server().await;

    let client = Arc::new(
        McpClient::new(McpConfig {
            server_url: url,
            timeout: Duration::from_secs(5),
            ..McpConfig::default()
        })
        .unwrap(),
    );
    client.connect().await.unwrap();
    client.discover_tools().await.unwrap();

    let registry = ToolRegistry::new();
    let added = registry.add_mcp(client.clone()).await.unwrap();
    assert_eq!(added, 1);
    assert_eq!(registry.count().await, 1);

    let outcome = registry.call("echo", r#"{"text": "via registry"}"#).await;
    assert!(!outcome.is_error);
    assert_eq!(outcome.content["result"], "echoed: via registry");
}
