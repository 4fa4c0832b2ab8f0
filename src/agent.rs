//! Provider-agnostic ReAct loop.
//!
//! Generalizes [`crate::client::Client::auto_execute_loop`] from a single
//! OpenAI-bound `Client` to any [`crate::llm::LlmProvider`]: collect a full
//! response, split it into text and `tool_use` blocks, stop if there are
//! none, otherwise execute every tool call (even the one that trips the
//! iteration cap — the cap is only re-checked at the top of the next round)
//! and loop. `PreToolUse`/`PostToolUse`/`UserPromptSubmit` hooks fire at the
//! same points the teacher's loop fires them; tool lookup and execution goes
//! through [`crate::registry::ToolRegistry`] instead of a flat `Vec<Arc<Tool>>`
//! so MCP-discovered tools are indistinguishable from local ones.
//!
//! State machine (spec.md §4.7): `Idle -> Calling_LLM ->` either
//! `Returning_Text -> Done`, or `Executing_Tools -> Calling_LLM` (loop), or
//! `Aborted` (an `on_stream` callback returns `false`), or `Error`, or
//! `MaxIter` once the iteration cap is hit with tool calls still pending.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use crate::hooks::{HookDecision, Hooks, PostToolUseEvent, PreToolUseEvent, UserPromptSubmitEvent};
use crate::llm::{LlmProvider, ProviderConfig, ProviderSession};
use crate::registry::ToolRegistry;
use crate::types::{ContentBlock, Message, ToolResultBlock};
use crate::{Error, Result};

const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// How an [`Agent::run`] call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// The model returned a text-only response; the loop is done.
    Success,
    /// The iteration cap was hit while the model still wanted to call tools.
    MaxIterations,
    /// An `on_stream` callback returned `false`.
    Aborted,
    /// The provider or a tool dispatch failed unrecoverably.
    Error(String),
}

/// Outcome of a single [`Agent::run`] call.
#[derive(Debug, Clone)]
pub struct AgentRunOutcome {
    pub status: AgentStatus,
    /// Text/Thinking/Reasoning blocks from the final assistant turn, in the
    /// order the model produced them. Empty on `Aborted` and `Error`.
    pub blocks: Vec<ContentBlock>,
}

/// Callback invoked with each content block as soon as it's produced.
///
/// Returning `false` aborts the run immediately: the current round's
/// history mutation is skipped and [`Agent::run`] returns
/// [`AgentStatus::Aborted`]. Mirrors the original runtime's
/// "non-zero return aborts" streaming callback convention.
pub type StreamCallback = Arc<dyn Fn(&ContentBlock) -> bool + Send + Sync>;

/// A single ReAct conversation loop bound to one provider session and tool
/// registry.
///
/// Distinct from [`crate::client::Client`]: `Client` stays OpenAI-bound and
/// streaming-first for callers that already depend on it, while `Agent` is
/// the provider-agnostic entry point new code should use, built over
/// [`LlmProvider`]/[`ProviderSession`] and [`ToolRegistry`].
pub struct Agent {
    session: Box<dyn ProviderSession>,
    registry: Arc<ToolRegistry>,
    hooks: Hooks,
    system_prompt: Option<String>,
    max_iterations: u32,
    stream: bool,
}

impl Agent {
    /// Builds an agent from a provider and config, with no hooks and the
    /// default iteration cap.
    pub async fn new(
        provider: Arc<dyn LlmProvider>,
        config: ProviderConfig,
        registry: Arc<ToolRegistry>,
    ) -> Result<Self> {
        Self::with_hooks(provider, config, registry, Hooks::new(), DEFAULT_MAX_ITERATIONS).await
    }

    /// Builds an agent with explicit hooks and iteration cap.
    pub async fn with_hooks(
        provider: Arc<dyn LlmProvider>,
        config: ProviderConfig,
        registry: Arc<ToolRegistry>,
        hooks: Hooks,
        max_iterations: u32,
    ) -> Result<Self> {
        let system_prompt = config.system_prompt.clone();
        let stream = config.stream;
        let session = provider.create_session(config).await?;
        Ok(Self {
            session,
            registry,
            hooks,
            system_prompt,
            max_iterations,
            stream,
        })
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Runs the ReAct loop for one user turn, mutating `history` in place.
    ///
    /// The system prompt (if any) is injected only when `history` is empty,
    /// matching a fresh conversation's first turn; later calls on the same
    /// history rely on the provider already having seen it.
    pub async fn run(
        &self,
        user_input: &str,
        history: &mut Vec<Message>,
        on_stream: Option<StreamCallback>,
    ) -> AgentRunOutcome {
        let prompt_event = UserPromptSubmitEvent::new(
            user_input.to_string(),
            history_snapshot(history),
        );
        let mut final_prompt = user_input.to_string();
        if let Some(decision) = self.hooks.execute_user_prompt_submit(prompt_event).await {
            if !decision.continue_execution {
                return AgentRunOutcome {
                    status: AgentStatus::Error(format!(
                        "prompt blocked by hook: {}",
                        decision.reason.unwrap_or_default()
                    )),
                    blocks: Vec::new(),
                };
            }
            if let Some(modified) = decision.modified_prompt {
                final_prompt = modified;
            }
        }

        if history.is_empty() {
            if let Some(system_prompt) = &self.system_prompt {
                if !system_prompt.is_empty() {
                    history.push(Message::system(system_prompt.clone()));
                }
            }
        }
        history.push(Message::user(final_prompt));

        let mut iteration = 0u32;

        loop {
            let tools = self.registry.tools().await;

            let blocks = if self.stream {
                let mut block_stream = match self.session.chat_stream(history, &tools).await {
                    Ok(s) => s,
                    Err(e) => {
                        return AgentRunOutcome {
                            status: AgentStatus::Error(e.to_string()),
                            blocks: Vec::new(),
                        };
                    }
                };

                let mut collected = Vec::new();
                loop {
                    match block_stream.next().await {
                        Some(Ok(block)) => {
                            if let Some(callback) = &on_stream {
                                if !callback(&block) {
                                    return AgentRunOutcome {
                                        status: AgentStatus::Aborted,
                                        blocks: Vec::new(),
                                    };
                                }
                            }
                            collected.push(block);
                        }
                        Some(Err(e)) => {
                            return AgentRunOutcome {
                                status: AgentStatus::Error(e.to_string()),
                                blocks: Vec::new(),
                            };
                        }
                        None => break,
                    }
                }
                collected
            } else {
                let blocks = match self.session.chat(history, &tools).await {
                    Ok(blocks) => blocks,
                    Err(e) => {
                        return AgentRunOutcome {
                            status: AgentStatus::Error(e.to_string()),
                            blocks: Vec::new(),
                        };
                    }
                };

                if let Some(callback) = &on_stream {
                    for block in &blocks {
                        if !callback(block) {
                            return AgentRunOutcome {
                                status: AgentStatus::Aborted,
                                blocks: Vec::new(),
                            };
                        }
                    }
                }
                blocks
            };

            let mut text_blocks = Vec::new();
            let mut tool_blocks = Vec::new();
            for block in blocks {
                match &block {
                    ContentBlock::ToolUse(_) => tool_blocks.push(block),
                    _ => text_blocks.push(block),
                }
            }

            if tool_blocks.is_empty() {
                if !text_blocks.is_empty() {
                    history.push(Message::assistant(text_blocks.clone()));
                }
                return AgentRunOutcome {
                    status: AgentStatus::Success,
                    blocks: text_blocks,
                };
            }

            iteration += 1;
            if iteration > self.max_iterations {
                if !text_blocks.is_empty() {
                    history.push(Message::assistant(text_blocks.clone()));
                }
                return AgentRunOutcome {
                    status: AgentStatus::MaxIterations,
                    blocks: text_blocks,
                };
            }

            let mut assistant_blocks = text_blocks.clone();
            assistant_blocks.extend(tool_blocks.iter().cloned());
            history.push(Message::assistant(assistant_blocks));

            let mut tool_results = Vec::with_capacity(tool_blocks.len());

            for block in tool_blocks {
                let ContentBlock::ToolUse(tool_use) = block else {
                    continue;
                };

                let snapshot = history_snapshot(history);
                let pre_event = PreToolUseEvent::new(
                    tool_use.name.clone(),
                    tool_use.input.clone(),
                    tool_use.id.clone(),
                    snapshot.clone(),
                );

                let mut tool_input = tool_use.input.clone();
                let mut blocked_reason = None;
                if let Some(decision) = self.hooks.execute_pre_tool_use(pre_event).await {
                    if !decision.continue_execution {
                        blocked_reason = Some(
                            decision
                                .reason
                                .unwrap_or_else(|| "blocked by PreToolUse hook".to_string()),
                        );
                    } else if let Some(modified) = decision.modified_input {
                        tool_input = modified;
                    }
                }

                let (result, is_error) = if let Some(reason) = blocked_reason {
                    (json!({"error": reason}), true)
                } else {
                    let args_json = tool_input.to_string();
                    let outcome = self.registry.call(&tool_use.name, &args_json).await;
                    (outcome.content, outcome.is_error)
                };

                let post_event = PostToolUseEvent::new(
                    tool_use.name.clone(),
                    tool_input,
                    tool_use.id.clone(),
                    result.clone(),
                    snapshot,
                );
                let mut final_result = result;
                if let Some(decision) = self.hooks.execute_post_tool_use(post_event).await {
                    if let Some(modified) = decision.modified_input {
                        final_result = modified;
                    }
                }

                let tool_result = if is_error {
                    ToolResultBlock::new_error(&tool_use.id, final_result)
                } else {
                    ToolResultBlock::new(&tool_use.id, final_result)
                };
                tool_results.push(ContentBlock::ToolResult(tool_result));
            }

            // One user message per assistant turn, not one per tool call:
            // Anthropic's Messages API rejects consecutive same-role messages.
            history.push(Message::user_with_blocks(tool_results));
        }
    }
}

/// Placeholder history snapshot for hook events until a richer
/// conversation-introspection API is needed; matches the teacher's own
/// `client.rs` simplification ("Simplified for now").
fn history_snapshot(history: &[Message]) -> Vec<serde_json::Value> {
    history.iter().map(|_| json!({})).collect()
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("max_iterations", &self.max_iterations)
            .field("has_system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ContentStream;
    use crate::tools::{tool, Tool};
    use crate::types::{TextBlock, ToolUseBlock};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedSession {
        responses: Mutex<Vec<Vec<ContentBlock>>>,
    }

    #[async_trait]
    impl ProviderSession for ScriptedSession {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[Arc<Tool>],
        ) -> Result<Vec<ContentBlock>> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(Error::other("scripted session exhausted"));
            }
            Ok(responses.remove(0))
        }

        async fn chat_stream(
            &self,
            _messages: &[Message],
            _tools: &[Arc<Tool>],
        ) -> Result<ContentStream> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(Error::other("scripted session exhausted"));
            }
            let blocks = responses.remove(0);
            Ok(Box::pin(futures::stream::iter(blocks.into_iter().map(Ok))))
        }
    }

    struct ScriptedProvider {
        responses: Mutex<Option<Vec<Vec<ContentBlock>>>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn create_session(&self, _config: ProviderConfig) -> Result<Box<dyn ProviderSession>> {
            let responses = self
                .responses
                .lock()
                .unwrap()
                .take()
                .expect("provider used only once per test");
            Ok(Box::new(ScriptedSession {
                responses: Mutex::new(responses),
            }))
        }
    }

    fn text(s: &str) -> ContentBlock {
        ContentBlock::Text(TextBlock::new(s))
    }

    fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
        ContentBlock::ToolUse(ToolUseBlock::new(id, name, input))
    }

    async fn agent_with(responses: Vec<Vec<ContentBlock>>, registry: Arc<ToolRegistry>) -> Agent {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            responses: Mutex::new(Some(responses)),
        });
        Agent::new(provider, ProviderConfig::default(), registry)
            .await
            .unwrap()
    }

    async fn agent_with_streaming(
        responses: Vec<Vec<ContentBlock>>,
        registry: Arc<ToolRegistry>,
    ) -> Agent {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            responses: Mutex::new(Some(responses)),
        });
        let config = ProviderConfig {
            stream: true,
            ..ProviderConfig::default()
        };
        Agent::new(provider, config, registry).await.unwrap()
    }

    #[tokio::test]
    async fn text_only_response_finishes_successfully() {
        let registry = Arc::new(ToolRegistry::new());
        let agent = agent_with(vec![vec![text("hello there")]], registry).await;
        let mut history = Vec::new();

        let outcome = agent.run("hi", &mut history, None).await;

        assert_eq!(outcome.status, AgentStatus::Success);
        assert_eq!(outcome.blocks.len(), 1);
        // user turn + assistant turn
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn tool_call_round_trips_before_final_answer() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .add(
                tool("add", "Adds two numbers")
                    .param("a", "number")
                    .param("b", "number")
                    .build(|args| async move {
                        let a = args["a"].as_f64().unwrap_or(0.0);
                        let b = args["b"].as_f64().unwrap_or(0.0);
                        Ok(json!({"result": a + b}))
                    }),
            )
            .await
            .unwrap();

        let responses = vec![
            vec![tool_use("call_1", "add", json!({"a": 2, "b": 3}))],
            vec![text("the answer is 5")],
        ];
        let agent = agent_with(responses, registry).await;
        let mut history = Vec::new();

        let outcome = agent.run("what is 2+3?", &mut history, None).await;

        assert_eq!(outcome.status, AgentStatus::Success);
        assert_eq!(outcome.blocks.len(), 1);
        // user, assistant(tool_use), user(tool_result), assistant(text)
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn multiple_tool_calls_in_one_turn_produce_a_single_user_message() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .add(tool("add", "Adds two numbers").build(|_| async move { Ok(json!({"result": 5})) }))
            .await
            .unwrap();

        let responses = vec![
            vec![
                tool_use("call_1", "add", json!({"a": 2, "b": 3})),
                tool_use("call_2", "add", json!({"a": 1, "b": 1})),
            ],
            vec![text("done")],
        ];
        let agent = agent_with(responses, registry).await;
        let mut history = Vec::new();

        let outcome = agent.run("add twice", &mut history, None).await;

        assert_eq!(outcome.status, AgentStatus::Success);
        // user, assistant(tool_use x2), user(tool_result x2), assistant(text)
        assert_eq!(history.len(), 4);
        let Message { role, content } = &history[2];
        assert_eq!(role, &crate::types::MessageRole::User);
        assert_eq!(content.len(), 2);
        assert!(content.iter().all(|b| matches!(b, ContentBlock::ToolResult(_))));
    }

    #[tokio::test]
    async fn stream_true_uses_chat_stream_and_forwards_blocks_live() {
        let registry = Arc::new(ToolRegistry::new());
        let agent =
            agent_with_streaming(vec![vec![text("hello"), text("there")]], registry).await;
        let mut history = Vec::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback: StreamCallback = Arc::new(move |block| {
            if let ContentBlock::Text(t) = block {
                seen_clone.lock().unwrap().push(t.text.clone());
            }
            true
        });

        let outcome = agent.run("hi", &mut history, Some(callback)).await;

        assert_eq!(outcome.status, AgentStatus::Success);
        assert_eq!(outcome.blocks.len(), 2);
        // Each block was forwarded to on_stream as it arrived from chat_stream,
        // not replayed once from a fully-collected Vec.
        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string(), "there".to_string()]);
    }

    #[tokio::test]
    async fn max_iterations_stops_the_loop() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .add(tool("noop", "Does nothing").build(|_| async move { Ok(json!({})) }))
            .await
            .unwrap();

        let responses: Vec<Vec<ContentBlock>> = (0..5)
            .map(|i| vec![tool_use(&format!("call_{i}"), "noop", json!({}))])
            .collect();
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            responses: Mutex::new(Some(responses)),
        });
        let agent = Agent::with_hooks(
            provider,
            ProviderConfig::default(),
            registry,
            Hooks::new(),
            2,
        )
        .await
        .unwrap();
        let mut history = Vec::new();

        let outcome = agent.run("loop forever", &mut history, None).await;

        assert_eq!(outcome.status, AgentStatus::MaxIterations);
    }

    #[tokio::test]
    async fn on_stream_returning_false_aborts_the_run() {
        let registry = Arc::new(ToolRegistry::new());
        let agent = agent_with(vec![vec![text("should not be kept")]], registry).await;
        let mut history = Vec::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let callback: StreamCallback = Arc::new(move |_block| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            false
        });

        let outcome = agent.run("hi", &mut history, Some(callback)).await;

        assert_eq!(outcome.status, AgentStatus::Aborted);
        assert!(outcome.blocks.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Only the user message was pushed before the aborted round.
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn pre_tool_use_hook_can_block_a_call() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .add(tool("dangerous", "Does something risky").build(|_| async move {
                Ok(json!({"did": "it"}))
            }))
            .await
            .unwrap();

        let responses = vec![
            vec![tool_use("call_1", "dangerous", json!({}))],
            vec![text("done")],
        ];
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            responses: Mutex::new(Some(responses)),
        });
        let hooks = Hooks::new().add_pre_tool_use(|event| async move {
            if event.tool_name == "dangerous" {
                return Some(HookDecision::block("not allowed"));
            }
            None
        });
        let agent = Agent::with_hooks(provider, ProviderConfig::default(), registry, hooks, 10)
            .await
            .unwrap();
        let mut history = Vec::new();

        let outcome = agent.run("do it", &mut history, None).await;

        assert_eq!(outcome.status, AgentStatus::Success);
        let Message { content, .. } = &history[2];
        let ContentBlock::ToolResult(result) = &content[0] else {
            panic!("expected a tool result block");
        };
        assert!(result.is_error);
        assert_eq!(result.content["error"], "not allowed");
    }
}
