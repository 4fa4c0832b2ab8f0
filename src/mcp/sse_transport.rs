//! Legacy HTTP+SSE MCP transport.
//!
//! Grounded on `mcp_sse.c`: a persistent `GET /sse` stream delivers an
//! `endpoint` event carrying the URL to POST requests to, and JSON-RPC
//! responses arrive asynchronously on that same stream rather than in the
//! POST response body. The C implementation runs a background pthread that
//! polls a response queue every 50ms; this transport replaces the thread
//! with a Tokio task and the polling queue with a bounded map from request
//! id to a one-shot completion slot, exactly as spec.md §9 suggests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;
use serde_json::Value;
use tokio::sync::{Mutex, Notify, oneshot};
use tokio::task::JoinHandle;

use super::McpTransport;
use crate::sse::sse_stream;
use crate::{Error, Result};

/// Matches the C transport's `SSE_MAX_PENDING_RESPONSES`. Past this many
/// in-flight requests, new ones are rejected rather than queued unbounded.
const MAX_PENDING_RESPONSES: usize = 16;

type PendingTable = Arc<Mutex<HashMap<u64, oneshot::Sender<String>>>>;

/// Persistent SSE transport: one background reader task per client,
/// correlating responses to requests by JSON-RPC `id`.
pub struct SseTransport {
    http: reqwest::Client,
    server_url: String,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    endpoint: Arc<Mutex<Option<String>>>,
    pending: PendingTable,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    endpoint_ready: Arc<Notify>,
    shutdown: Arc<Notify>,
    reader: Option<JoinHandle<()>>,
}

impl SseTransport {
    pub fn new(server_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            // The long-lived GET stream needs no deadline; only the
            // request-scoped POSTs use `timeout`.
            .build()
            .map_err(Error::Http)?;
        let base_url = extract_base_url(&server_url);

        Ok(Self {
            http,
            server_url,
            base_url,
            api_key,
            timeout,
            endpoint: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            endpoint_ready: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
            reader: None,
        })
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);

        let task = ReaderTask {
            http: self.http.clone(),
            server_url: self.server_url.clone(),
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            pending: self.pending.clone(),
            connected: self.connected.clone(),
            running: self.running.clone(),
            endpoint_ready: self.endpoint_ready.clone(),
            shutdown: self.shutdown.clone(),
        };
        self.reader = Some(tokio::spawn(task.run()));

        match tokio::time::timeout(self.timeout, self.endpoint_ready.notified()).await {
            Ok(()) if self.connected.load(Ordering::SeqCst) => Ok(()),
            Ok(()) => Err(Error::not_connected("MCP SSE connection failed")),
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                Err(Error::timeout())
            }
        }
    }

    async fn request(&mut self, json: &str, id: u64) -> Result<String> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::not_connected("MCP SSE transport not connected"));
        }

        let endpoint = self
            .endpoint
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::not_connected("MCP SSE transport has no endpoint yet"))?;
        let full_url = if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            endpoint
        };

        let mut receiver = None;
        if id != 0 {
            let mut pending = self.pending.lock().await;
            if pending.len() >= MAX_PENDING_RESPONSES {
                log::warn!(
                    "MCP SSE: pending-response table full ({MAX_PENDING_RESPONSES} entries), dropping request id={id}"
                );
                return Err(Error::protocol(
                    "MCP SSE pending-response table is full",
                ));
            }
            let (tx, rx) = oneshot::channel();
            pending.insert(id, tx);
            receiver = Some(rx);
        }

        let mut builder = self
            .http
            .post(&full_url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .body(json.to_string());
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder.send().await.map_err(Error::Http)?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            if receiver.is_some() {
                self.pending.lock().await.remove(&id);
            }
            return Err(Error::http_status(status.as_u16(), body));
        }

        // Some servers answer directly in the POST body instead of over the
        // SSE stream; take that shortcut when it's there.
        if !body.trim().is_empty()
            && serde_json::from_str::<Value>(&body)
                .map(|v| v.get("jsonrpc").is_some())
                .unwrap_or(false)
        {
            if receiver.is_some() {
                self.pending.lock().await.remove(&id);
            }
            return Ok(body);
        }

        if id == 0 {
            return Ok(String::new());
        }

        let receiver = receiver.expect("non-notification requests always register a slot");
        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(Error::protocol("MCP SSE response channel closed early")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::timeout())
            }
        }
    }

    async fn disconnect(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }
}

struct ReaderTask {
    http: reqwest::Client,
    server_url: String,
    api_key: Option<String>,
    endpoint: Arc<Mutex<Option<String>>>,
    pending: PendingTable,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    endpoint_ready: Arc<Notify>,
    shutdown: Arc<Notify>,
}

impl ReaderTask {
    async fn run(self) {
        log::debug!("MCP SSE: reader task started for {}", self.server_url);

        while self.running.load(Ordering::SeqCst) {
            match self.connect_once().await {
                Ok(()) => self.read_until_closed().await,
                Err(e) => log::warn!("MCP SSE: connection failed: {e} (will reconnect)"),
            }

            self.connected.store(false, Ordering::SeqCst);

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            log::debug!("MCP SSE: reconnecting in 1s...");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = self.shutdown.notified() => break,
            }
        }

        log::debug!("MCP SSE: reader task exiting");
    }

    async fn connect_once(&self) -> Result<reqwest::Response> {
        let mut builder = self
            .http
            .get(&self.server_url)
            .header("Accept", "text/event-stream");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }
        let response = builder.send().await.map_err(Error::Http)?;
        if !response.status().is_success() {
            return Err(Error::http_status(
                response.status().as_u16(),
                "MCP SSE GET failed",
            ));
        }
        Ok(response)
    }

    async fn read_until_closed(&self) {
        let response = match self.connect_once().await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("MCP SSE: {e}");
                return;
            }
        };
        let mut events = sse_stream(response);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return,
                next = events.next() => {
                    match next {
                        Some(Ok(event)) => self.handle_event(event).await,
                        Some(Err(e)) => {
                            log::warn!("MCP SSE: stream error: {e} (will reconnect)");
                            return;
                        }
                        None => {
                            log::debug!("MCP SSE: stream closed (will reconnect)");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_event(&self, event: crate::sse::SseEvent) {
        log::debug!(
            "MCP SSE event: type={}, data={:.60}",
            event.event,
            event.data
        );

        if event.event == "endpoint" {
            *self.endpoint.lock().await = Some(event.data);
            self.connected.store(true, Ordering::SeqCst);
            self.endpoint_ready.notify_one();
            log::info!("MCP SSE: endpoint established");
            return;
        }

        let Ok(json) = serde_json::from_str::<Value>(&event.data) else {
            return;
        };
        if json.get("jsonrpc").is_none() {
            return;
        }
        let id = json.get("id").and_then(Value::as_u64).unwrap_or(0);

        let mut pending = self.pending.lock().await;
        if let Some(tx) = pending.remove(&id) {
            let _ = tx.send(event.data);
            log::debug!("MCP SSE: delivered response id={id}");
        }
    }
}

/// Extracts `scheme://host[:port]` from a server URL, matching
/// `mcp_sse.c`'s `extract_base_url` (used to resolve a relative `endpoint`
/// event against the server's origin).
fn extract_base_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let after_scheme = scheme_end + 3;
    match url[after_scheme..].find('/') {
        Some(path_start) => url[..after_scheme + path_start].to_string(),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_base_url_with_path() {
        assert_eq!(
            extract_base_url("http://localhost:8080/sse"),
            "http://localhost:8080"
        );
    }

    #[test]
    fn extracts_base_url_without_path() {
        assert_eq!(extract_base_url("http://localhost:8080"), "http://localhost:8080");
    }

    #[tokio::test]
    async fn request_before_connect_is_rejected() {
        let mut transport =
            SseTransport::new("http://localhost:1/sse".to_string(), None, Duration::from_secs(1))
                .unwrap();
        let err = transport.request("{}", 1).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected(_)));
    }
}
