//! Unified dispatch point for local and MCP-discovered tools.
//!
//! [`crate::tools::Tool`]/[`crate::tools::ToolBuilder`] stay exactly as the
//! teacher defines them for locally-implemented tools; `ToolRegistry` is new,
//! grounded on spec.md §4.6/§4.9 and `ac_tool_registry_add_mcp`/
//! `ac_mcp_connect_all`. A remote MCP tool is registered as an ordinary
//! [`Tool`] whose handler forwards to [`crate::mcp::McpClient::call_tool`] —
//! so [`crate::agent::Agent`] never needs to know which tools are local and
//! which are remote; it just asks the registry for `Arc<Tool>`s.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::mcp::McpClient;
use crate::tools::Tool;
use crate::{Error, Result};

/// Outcome of [`ToolRegistry::call`]. Always returned, never an `Err` —
/// the registry's whole point is to absorb tool-level failures so the
/// ReAct loop never has to special-case a missing tool or a handler panic.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    pub content: Value,
    pub is_error: bool,
}

impl ToolCallOutcome {
    fn error(content: Value) -> Self {
        Self {
            content,
            is_error: true,
        }
    }

    fn ok(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }
}

/// Registry of callable tools, local and MCP-backed alike.
///
/// Methods take `&self` rather than spec.md's `&mut self` for `add_mcp`: the
/// registry is shared (via `Arc`) between the agent loop and
/// `mcp::connect_all`, so interior mutability (a `tokio::sync::RwLock` over
/// the entry list) is used throughout instead, the same pattern
/// [`crate::llm::ProviderRegistry`] already uses.
#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<Vec<Arc<Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a locally-implemented tool. Rejects a name already present
    /// in the registry, whether local or MCP-backed.
    pub async fn add(&self, tool: Tool) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|t| t.name() == tool.name()) {
            return Err(Error::invalid_arg(format!(
                "tool '{}' is already registered",
                tool.name()
            )));
        }
        entries.push(Arc::new(tool));
        Ok(())
    }

    /// Wraps every tool `client` has already discovered (see
    /// [`McpClient::discover_tools`]) as a [`Tool`] whose handler forwards
    /// to [`McpClient::call_tool`], then registers it. Names colliding with
    /// an existing entry are skipped and logged rather than rejecting the
    /// whole batch, matching [`crate::mcp::connect_all`]'s fault tolerance.
    /// Returns the number of tools actually added.
    pub async fn add_mcp(&self, client: Arc<McpClient>) -> Result<usize> {
        let discovered = client.tools().await;
        let mut entries = self.entries.write().await;
        let mut added = 0;

        for info in discovered {
            if entries.iter().any(|t| t.name() == info.name) {
                log::warn!(
                    "MCP tool '{}' collides with an existing registry entry, skipping",
                    info.name
                );
                continue;
            }

            let client = client.clone();
            let tool_name = info.name.clone();
            let wrapped = Tool::new(
                info.name.clone(),
                info.description.clone(),
                info.parameters.clone(),
                move |args| {
                    let client = client.clone();
                    let tool_name = tool_name.clone();
                    async move { client.call_tool(&tool_name, args).await }
                },
            );
            entries.push(Arc::new(wrapped));
            added += 1;
        }

        Ok(added)
    }

    pub async fn find(&self, name: &str) -> Option<Arc<Tool>> {
        self.entries
            .read()
            .await
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    pub async fn list(&self) -> Vec<String> {
        self.entries
            .read()
            .await
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// OpenAI-compatible tool schema array, deterministic for a fixed set of
    /// entries registered in a fixed order.
    pub async fn schema(&self) -> Vec<Value> {
        self.entries
            .read()
            .await
            .iter()
            .map(|t| t.to_openai_format())
            .collect()
    }

    /// The registered tools as `Arc<Tool>`, the shape [`crate::llm::ProviderSession`]
    /// expects for building a wire `tools` array.
    pub async fn tools(&self) -> Vec<Arc<Tool>> {
        self.entries.read().await.clone()
    }

    /// Parses `args_json` (empty string tolerated as `{}`), looks up `name`,
    /// and invokes it. A malformed argument string does not skip the call:
    /// the handler still runs, with `{}` in place of the unparseable input,
    /// and the original string is logged. A missing tool, a handler-level
    /// error, or a handler panic are all captured as `{"error": "..."}` with
    /// `is_error = true` — this never returns an `Err` and never aborts the
    /// caller.
    pub async fn call(&self, name: &str, args_json: &str) -> ToolCallOutcome {
        let args: Value = if args_json.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(args_json) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!(
                        "tool '{name}' called with malformed arguments JSON ({e}), \
                         invoking with {{}} instead: {args_json}"
                    );
                    json!({})
                }
            }
        };

        let Some(tool) = self.find(name).await else {
            return ToolCallOutcome::error(json!({
                "error": format!("tool not found: {name}")
            }));
        };

        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(Ok(value)) => ToolCallOutcome::ok(value),
            Ok(Err(e)) => ToolCallOutcome::error(json!({"error": e.to_string()})),
            Err(_) => ToolCallOutcome::error(json!({
                "error": format!("tool '{name}' panicked during execution")
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool;

    fn adder() -> Tool {
        tool("add", "Adds two numbers")
            .param("a", "number")
            .param("b", "number")
            .build(|args| async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!({"result": a + b}))
            })
    }

    #[tokio::test]
    async fn add_rejects_duplicate_names() {
        let registry = ToolRegistry::new();
        registry.add(adder()).await.unwrap();
        let err = registry.add(adder()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArg(_)));
    }

    #[tokio::test]
    async fn call_runs_a_registered_tool() {
        let registry = ToolRegistry::new();
        registry.add(adder()).await.unwrap();
        let outcome = registry.call("add", r#"{"a": 2, "b": 3}"#).await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.content["result"], 5.0);
    }

    #[tokio::test]
    async fn call_tolerates_empty_args() {
        let registry = ToolRegistry::new();
        registry.add(adder()).await.unwrap();
        let outcome = registry.call("add", "").await;
        assert!(!outcome.is_error);
    }

    #[tokio::test]
    async fn call_on_missing_tool_is_captured_not_raised() {
        let registry = ToolRegistry::new();
        let outcome = registry.call("does_not_exist", "{}").await;
        assert!(outcome.is_error);
        assert!(outcome.content["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn call_on_malformed_json_still_invokes_the_handler() {
        let registry = ToolRegistry::new();
        registry.add(adder()).await.unwrap();
        let outcome = registry.call("add", "{not json").await;
        // `adder` defaults missing params to 0.0 rather than erroring, so a
        // successful result here proves the handler ran with `{}` instead of
        // the call being short-circuited before it ever reached the tool.
        assert!(!outcome.is_error);
        assert_eq!(outcome.content["result"], 0.0);
    }

    #[tokio::test]
    async fn call_on_malformed_json_surfaces_handler_errors_too() {
        let registry = ToolRegistry::new();
        let picky = tool("picky", "Requires an explicit flag").build(|args| async move {
            if args["must_be_set"].as_bool().unwrap_or(false) {
                Ok(json!({"ok": true}))
            } else {
                Err(Error::Tool("must_be_set was missing".to_string()))
            }
        });
        registry.add(picky).await.unwrap();
        let outcome = registry.call("picky", "{not json").await;
        assert!(outcome.is_error);
        assert!(
            outcome.content["error"]
                .as_str()
                .unwrap()
                .contains("must_be_set")
        );
    }

    #[tokio::test]
    async fn call_catches_handler_panics() {
        let registry = ToolRegistry::new();
        let panics =
            tool("boom", "Always panics").build(|_| async move { panic!("handler exploded") });
        registry.add(panics).await.unwrap();
        let outcome = registry.call("boom", "{}").await;
        assert!(outcome.is_error);
        assert!(outcome.content["error"].as_str().unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn schema_reflects_registered_tools() {
        let registry = ToolRegistry::new();
        registry.add(adder()).await.unwrap();
        let schema = registry.schema().await;
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0]["function"]["name"], "add");
    }
}
