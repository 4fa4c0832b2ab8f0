//! Anthropic Messages API driver.
//!
//! The original provider (`anthropic_chat` in the C runtime) only read
//! `content[0].text` from a non-streaming response and left tool calling as
//! a `(void)tools; /* TODO */`. This driver fills that gap: full streaming
//! via SSE, and the Messages API's content-block protocol (`text`,
//! `tool_use`, `tool_result`, `thinking`) round-tripped against
//! [`ContentBlock`], grounded on the same URL/header choices
//! (`x-api-key`, `anthropic-version: 2023-06-01`, `system` as a top-level
//! field rather than a message) as the original.

use super::{ContentStream, LlmProvider, ProviderConfig, ProviderSession};
use crate::sse::sse_stream;
use crate::tools::Tool;
use crate::types::{ContentBlock, Message, MessageRole, ThinkingBlock};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Factory for [`AnthropicSession`]s.
#[derive(Debug, Default)]
pub struct AnthropicProvider;

impl AnthropicProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn create_session(&self, config: ProviderConfig) -> Result<Box<dyn ProviderSession>> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Box::new(AnthropicSession { config, http_client }))
    }
}

pub struct AnthropicSession {
    config: ProviderConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(clippy::enum_variant_names)]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(default, skip_serializing_if = "is_false")]
        is_error: bool,
    },
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
}

fn is_false(b: &bool) -> bool {
    !b
}

impl AnthropicSession {
    fn build_request(&self, messages: &[Message], tools: &[Arc<Tool>], stream: bool) -> AnthropicRequest {
        let wire_messages = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(message_to_anthropic)
            .collect();

        let system = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .flat_map(|m| m.content.iter())
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        let system = if system.is_empty() {
            self.config.system_prompt.clone()
        } else {
            Some(system.join("\n"))
        };

        let wire_tools = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name().to_string(),
                        description: t.description().to_string(),
                        input_schema: t.input_schema().clone(),
                    })
                    .collect(),
            )
        };

        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: wire_messages,
            system,
            stream,
            temperature: self.config.temperature,
            tools: wire_tools,
        }
    }

    async fn send(&self, request: &AnthropicRequest) -> Result<reqwest::Response> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let mut builder = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json; charset=utf-8")
            .header("anthropic-version", ANTHROPIC_API_VERSION);

        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("x-api-key", api_key);
        }

        let response = builder.json(request).send().await.map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(Error::http_status(status.as_u16(), body));
        }

        Ok(response)
    }
}

fn message_to_anthropic(message: &Message) -> AnthropicMessage {
    let role = match message.role {
        MessageRole::Assistant => "assistant",
        // Anthropic has no distinct "tool" role; tool results travel inside
        // a user message's content array.
        MessageRole::User | MessageRole::Tool | MessageRole::System => "user",
    };

    let content = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text(text) => AnthropicContentBlock::Text {
                text: text.text.clone(),
            },
            ContentBlock::ToolUse(tool_use) => AnthropicContentBlock::ToolUse {
                id: tool_use.id.clone(),
                name: tool_use.name.clone(),
                input: tool_use.input.clone(),
            },
            ContentBlock::ToolResult(result) => AnthropicContentBlock::ToolResult {
                tool_use_id: result.tool_use_id.clone(),
                content: result.content.clone(),
                is_error: result.is_error,
            },
            ContentBlock::Thinking(thinking) => AnthropicContentBlock::Thinking {
                thinking: thinking.thinking.clone(),
                signature: thinking.signature.clone(),
            },
            // Anthropic has no OpenAI-style "reasoning" field distinct from
            // thinking blocks; fold it in as plain text rather than drop it.
            ContentBlock::Reasoning(reasoning) => AnthropicContentBlock::Text {
                text: reasoning.text.clone(),
            },
            ContentBlock::Image(image) => AnthropicContentBlock::Text {
                text: format!("[image: {}]", image.url()),
            },
        })
        .collect();

    AnthropicMessage {
        role: role.to_string(),
        content,
    }
}

/// Streaming event payloads this driver understands. Anthropic's `event:`
/// name duplicates the `"type"` field inside `data:`, so only the latter is
/// deserialized here; `sse.rs` already exposes the parsed [`SseEvent`].
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart,
    ContentBlockStart {
        index: usize,
        content_block: StartBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: Delta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta,
    MessageStop,
    Ping,
    Error {
        error: Value,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StartBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
}

#[derive(Default)]
struct PartialBlock {
    kind: PartialKind,
    text: String,
    tool_id: String,
    tool_name: String,
    tool_json: String,
    signature: Option<String>,
}

#[derive(Default, PartialEq)]
enum PartialKind {
    #[default]
    Text,
    ToolUse,
    Thinking,
}

fn finish_block(partial: PartialBlock) -> Result<Option<ContentBlock>> {
    match partial.kind {
        PartialKind::Text => {
            if partial.text.is_empty() {
                Ok(None)
            } else {
                Ok(Some(ContentBlock::Text(crate::types::TextBlock::new(
                    partial.text,
                ))))
            }
        }
        PartialKind::ToolUse => {
            let input: Value = if partial.tool_json.is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&partial.tool_json)
                    .map_err(|e| Error::stream(format!("failed to parse tool_use input: {e}")))?
            };
            Ok(Some(ContentBlock::ToolUse(crate::types::ToolUseBlock::new(
                partial.tool_id,
                partial.tool_name,
                input,
            ))))
        }
        PartialKind::Thinking => {
            let block = match partial.signature {
                Some(sig) => ThinkingBlock::with_signature(partial.text, sig),
                None => ThinkingBlock::new(partial.text),
            };
            Ok(Some(ContentBlock::Thinking(block)))
        }
    }
}

#[async_trait]
impl ProviderSession for AnthropicSession {
    async fn chat(&self, messages: &[Message], tools: &[Arc<Tool>]) -> Result<Vec<ContentBlock>> {
        let mut stream = self.chat_stream(messages, tools).await?;
        let mut blocks = Vec::new();
        while let Some(block) = stream.next().await {
            blocks.push(block?);
        }
        Ok(blocks)
    }

    async fn chat_stream(&self, messages: &[Message], tools: &[Arc<Tool>]) -> Result<ContentStream> {
        let request = self.build_request(messages, tools, true);
        let response = self.send(&request).await?;
        let events = sse_stream(response);

        let stream: Pin<Box<dyn Stream<Item = Result<ContentBlock>> + Send>> = Box::pin(
            events
                .scan(HashMap::<usize, PartialBlock>::new(), |blocks, event_result| {
                    let outcome = (|| -> Result<Option<Vec<Result<ContentBlock>>>> {
                        let event = match event_result {
                            Ok(e) => e,
                            Err(e) => return Ok(Some(vec![Err(e)])),
                        };
                        if event.data.is_empty() {
                            return Ok(None);
                        }
                        let parsed: StreamEvent = match serde_json::from_str(&event.data) {
                            Ok(p) => p,
                            // Unknown/forward-compatible event types are ignored.
                            Err(_) => return Ok(None),
                        };

                        match parsed {
                            StreamEvent::ContentBlockStart { index, content_block } => {
                                let partial = match content_block {
                                    StartBlock::Text { text } => PartialBlock {
                                        kind: PartialKind::Text,
                                        text,
                                        ..Default::default()
                                    },
                                    StartBlock::ToolUse { id, name } => PartialBlock {
                                        kind: PartialKind::ToolUse,
                                        tool_id: id,
                                        tool_name: name,
                                        ..Default::default()
                                    },
                                    StartBlock::Thinking { thinking } => PartialBlock {
                                        kind: PartialKind::Thinking,
                                        text: thinking,
                                        ..Default::default()
                                    },
                                };
                                blocks.insert(index, partial);
                                Ok(None)
                            }
                            StreamEvent::ContentBlockDelta { index, delta } => {
                                if let Some(partial) = blocks.get_mut(&index) {
                                    match delta {
                                        Delta::TextDelta { text } => partial.text.push_str(&text),
                                        Delta::InputJsonDelta { partial_json } => {
                                            partial.tool_json.push_str(&partial_json)
                                        }
                                        Delta::ThinkingDelta { thinking } => partial.text.push_str(&thinking),
                                        Delta::SignatureDelta { signature } => {
                                            partial.signature = Some(signature)
                                        }
                                    }
                                }
                                Ok(None)
                            }
                            StreamEvent::ContentBlockStop { index } => {
                                if let Some(partial) = blocks.remove(&index) {
                                    match finish_block(partial) {
                                        Ok(Some(block)) => Ok(Some(vec![Ok(block)])),
                                        Ok(None) => Ok(None),
                                        Err(e) => Ok(Some(vec![Err(e)])),
                                    }
                                } else {
                                    Ok(None)
                                }
                            }
                            StreamEvent::Error { error } => {
                                Ok(Some(vec![Err(Error::api(format!("Anthropic stream error: {error}")))]))
                            }
                            StreamEvent::MessageStart
                            | StreamEvent::MessageDelta
                            | StreamEvent::MessageStop
                            | StreamEvent::Ping => Ok(None),
                        }
                    })();

                    futures::future::ready(Some(outcome.unwrap_or_else(|e| Some(vec![Err(e)]))))
                })
                .filter_map(|item| async move { item })
                .flat_map(futures::stream::iter),
        );

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolResultBlock, ToolUseBlock};

    #[test]
    fn system_messages_are_extracted_not_inlined() {
        let session = AnthropicSession {
            config: ProviderConfig {
                base_url: "http://localhost".to_string(),
                ..Default::default()
            },
            http_client: reqwest::Client::new(),
        };

        let messages = vec![Message::new(MessageRole::System, vec![ContentBlock::Text(
            crate::types::TextBlock::new("be terse"),
        )]), Message::user("hi")];

        let request = session.build_request(&messages, &[], false);
        assert_eq!(request.system.as_deref(), Some("be terse"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }

    #[test]
    fn tool_use_round_trips_to_wire_block() {
        let message = Message::assistant(vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "toolu_1",
            "search",
            serde_json::json!({"q": "rust"}),
        ))]);
        let wire = message_to_anthropic(&message);
        assert_eq!(wire.role, "assistant");
        match &wire.content[0] {
            AnthropicContentBlock::ToolUse { id, name, .. } => {
                assert_eq!(id, "toolu_1");
                assert_eq!(name, "search");
            }
            other => panic!("expected tool_use, got {other:?}"),
        }
    }

    #[test]
    fn tool_result_error_flag_round_trips() {
        let message = Message::user_with_blocks(vec![ContentBlock::ToolResult(
            ToolResultBlock::new_error("toolu_1", serde_json::json!("boom")),
        )]);
        let wire = message_to_anthropic(&message);
        match &wire.content[0] {
            AnthropicContentBlock::ToolResult { is_error, .. } => assert!(is_error),
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn finish_block_parses_accumulated_tool_json() {
        let partial = PartialBlock {
            kind: PartialKind::ToolUse,
            tool_id: "toolu_2".to_string(),
            tool_name: "calc".to_string(),
            tool_json: r#"{"x":1}"#.to_string(),
            ..Default::default()
        };
        let block = finish_block(partial).unwrap().unwrap();
        match block {
            ContentBlock::ToolUse(tool_use) => assert_eq!(tool_use.input["x"], 1),
            other => panic!("expected tool_use, got {other:?}"),
        }
    }
}
