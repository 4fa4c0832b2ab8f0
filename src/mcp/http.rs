//! Streamable HTTP MCP transport.
//!
//! Stateless request/response: every call is an independent POST, grounded
//! on `mcp_http.c`'s `http_request` — same headers, same empty-body handling
//! (tolerated only for notifications, where `request_id == 0`).

use std::time::Duration;

use async_trait::async_trait;

use super::McpTransport;
use crate::{Error, Result};

/// Streamable HTTP transport: one POST per JSON-RPC call, no persistent
/// connection to maintain.
pub struct HttpTransport {
    http: reqwest::Client,
    server_url: String,
    api_key: Option<String>,
    connected: bool,
}

impl HttpTransport {
    pub fn new(server_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            server_url,
            api_key,
            connected: false,
        })
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn connect(&mut self) -> Result<()> {
        // Stateless: there's no handshake, just a readiness flag so
        // `request` can refuse to run before `connect` is called.
        self.connected = true;
        Ok(())
    }

    async fn request(&mut self, json: &str, id: u64) -> Result<String> {
        if !self.connected {
            return Err(Error::not_connected("MCP HTTP transport not connected"));
        }

        let mut builder = self
            .http
            .post(&self.server_url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .body(json.to_string());
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder.send().await.map_err(Error::Http)?;
        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            return Err(Error::http_status(status.as_u16(), body));
        }

        if body.trim().is_empty() {
            if id == 0 {
                return Ok(String::new());
            }
            return Err(Error::protocol(
                "MCP HTTP transport returned an empty body for a non-notification request",
            ));
        }

        Ok(body)
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}
