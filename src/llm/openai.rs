//! OpenAI-compatible chat completions driver.
//!
//! Generalizes the `query`/`Client::send` request-building logic and the
//! [`crate::utils::ToolCallAggregator`]/[`crate::utils::parse_sse_stream`]
//! streaming logic into a [`LlmProvider`]/[`ProviderSession`] pair, so the
//! same wire format can be driven by [`crate::agent::Agent`] against any
//! OpenAI-compatible endpoint (vLLM, llama.cpp, Azure OpenAI, etc).
//!
//! Unlike the legacy [`crate::client::Client`], this driver round-trips the
//! full content-block model: `ToolUse` becomes an assistant `tool_calls`
//! entry, `ToolResult` becomes a separate `role: "tool"` message keyed by
//! `tool_call_id`, and `Image` becomes an `image_url` content part.

use super::{ContentStream, LlmProvider, ProviderConfig, ProviderSession};
use crate::tools::Tool;
use crate::types::{
    ContentBlock, Message, MessageRole, OpenAIContent, OpenAIContentPart, OpenAIFunction,
    OpenAIMessage, OpenAIRequest, OpenAIToolCall,
};
use crate::utils::{ToolCallAggregator, parse_sse_stream};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::sync::Arc;

/// Factory for [`OpenAiSession`]s.
#[derive(Debug, Default)]
pub struct OpenAiProvider;

impl OpenAiProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn create_session(&self, config: ProviderConfig) -> Result<Box<dyn ProviderSession>> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Box::new(OpenAiSession { config, http_client }))
    }
}

/// Per-conversation handle bound to one OpenAI-compatible base URL/model.
pub struct OpenAiSession {
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl OpenAiSession {
    fn build_request(&self, messages: &[Message], tools: &[Arc<Tool>]) -> Result<OpenAIRequest> {
        let mut wire_messages = Vec::new();

        if let Some(system_prompt) = &self.config.system_prompt {
            if !system_prompt.is_empty() {
                wire_messages.push(OpenAIMessage {
                    role: "system".to_string(),
                    content: Some(OpenAIContent::Text(system_prompt.clone())),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
        }

        for message in messages {
            wire_messages.extend(message_to_openai(message)?);
        }

        let wire_tools = if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(|t| t.to_openai_format()).collect())
        };

        Ok(OpenAIRequest {
            model: self.config.model.clone(),
            messages: wire_messages,
            stream: true,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools: wire_tools,
        })
    }

    async fn send(&self, messages: &[Message], tools: &[Arc<Tool>]) -> Result<reqwest::Response> {
        let request = self.build_request(messages, tools)?;
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut builder = self.http_client.post(&url).header("Content-Type", "application/json");
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder.json(&request).send().await.map_err(Error::Http)?;

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

/// Converts one internal [`Message`] into zero or more OpenAI wire messages.
///
/// Most roles map 1:1, but an assistant message carrying both text and
/// `ToolUse` blocks becomes a single message with `tool_calls`, and a user
/// message carrying `ToolResult` blocks expands into one `role: "tool"`
/// message per result (OpenAI has no batched tool-result shape).
fn message_to_openai(message: &Message) -> Result<Vec<OpenAIMessage>> {
    let tool_results: Vec<_> = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
        .collect();

    if !tool_results.is_empty() {
        return tool_results
            .into_iter()
            .map(|result| {
                let content = if result.is_error {
                    serde_json::json!({ "error": result.content })
                } else {
                    result.content.clone()
                };
                Ok(OpenAIMessage {
                    role: "tool".to_string(),
                    content: Some(OpenAIContent::Text(
                        serde_json::to_string(&content).map_err(Error::Json)?,
                    )),
                    tool_calls: None,
                    tool_call_id: Some(result.tool_use_id.clone()),
                })
            })
            .collect();
    }

    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut plain_text_only = true;

    for block in &message.content {
        match block {
            ContentBlock::Text(text) => parts.push(OpenAIContentPart::text(text.text.clone())),
            ContentBlock::Image(image) => {
                plain_text_only = false;
                parts.push(OpenAIContentPart::from_image(image));
            }
            ContentBlock::ToolUse(tool_use) => {
                tool_calls.push(OpenAIToolCall {
                    id: tool_use.id.clone(),
                    call_type: "function".to_string(),
                    function: OpenAIFunction {
                        name: tool_use.name.clone(),
                        arguments: serde_json::to_string(&tool_use.input).map_err(Error::Json)?,
                    },
                });
            }
            // Thinking/Reasoning blocks are provider-internal scratch content;
            // OpenAI-compatible chat completions has no wire slot for them.
            ContentBlock::Thinking(_) | ContentBlock::Reasoning(_) => {}
            ContentBlock::ToolResult(_) => unreachable!("handled above"),
        }
    }

    let content = if parts.is_empty() {
        None
    } else if plain_text_only {
        let joined = parts
            .iter()
            .map(|p| match p {
                OpenAIContentPart::Text { text } => text.as_str(),
                OpenAIContentPart::ImageUrl { .. } => "",
            })
            .collect::<Vec<_>>()
            .join("");
        Some(OpenAIContent::Text(joined))
    } else {
        Some(OpenAIContent::Parts(parts))
    };

    Ok(vec![OpenAIMessage {
        role: role.to_string(),
        content,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        tool_call_id: None,
    }])
}

#[async_trait]
impl ProviderSession for OpenAiSession {
    async fn chat(&self, messages: &[Message], tools: &[Arc<Tool>]) -> Result<Vec<ContentBlock>> {
        let mut stream = self.chat_stream(messages, tools).await?;
        let mut blocks = Vec::new();
        while let Some(block) = stream.next().await {
            blocks.push(block?);
        }
        Ok(blocks)
    }

    async fn chat_stream(&self, messages: &[Message], tools: &[Arc<Tool>]) -> Result<ContentStream> {
        let response = self.send(messages, tools).await?;
        let sse_stream = parse_sse_stream(response);

        let stream = sse_stream.scan(ToolCallAggregator::new(), |aggregator, chunk_result| {
            let result = match chunk_result {
                Ok(chunk) => match aggregator.process_chunk(chunk) {
                    Ok(blocks) if blocks.is_empty() => Some(None),
                    Ok(blocks) => Some(Some(Ok(blocks))),
                    Err(e) => Some(Some(Err(e))),
                },
                Err(e) => Some(Some(Err(e))),
            };
            futures::future::ready(result)
        });

        let flattened = stream
            .filter_map(|item| async move { item })
            .flat_map(|result| {
                futures::stream::iter(match result {
                    Ok(blocks) => blocks.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                })
            });

        Ok(Box::pin(flattened))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolResultBlock, ToolUseBlock};

    #[test]
    fn text_only_message_becomes_single_string_content() {
        let message = Message::user("hello there");
        let wire = message_to_openai(&message).unwrap();
        assert_eq!(wire.len(), 1);
        match &wire[0].content {
            Some(OpenAIContent::Text(t)) => assert_eq!(t, "hello there"),
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[test]
    fn tool_use_becomes_tool_calls_field() {
        let message = Message::assistant(vec![ContentBlock::ToolUse(ToolUseBlock::new(
            "call_1",
            "get_weather",
            serde_json::json!({"city": "Paris"}),
        ))]);
        let wire = message_to_openai(&message).unwrap();
        assert_eq!(wire.len(), 1);
        let calls = wire[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "get_weather");
    }

    #[test]
    fn tool_result_becomes_its_own_tool_message() {
        let message = Message::user_with_blocks(vec![ContentBlock::ToolResult(
            ToolResultBlock::new("call_1", serde_json::json!({"temp": 72})),
        )]);
        let wire = message_to_openai(&message).unwrap();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].role, "tool");
        assert_eq!(wire[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn error_tool_result_is_wrapped_with_error_key() {
        let message = Message::user_with_blocks(vec![ContentBlock::ToolResult(
            ToolResultBlock::new_error("call_1", serde_json::json!("boom")),
        )]);
        let wire = message_to_openai(&message).unwrap();
        let content = match &wire[0].content {
            Some(OpenAIContent::Text(t)) => t.clone(),
            other => panic!("expected text content, got {other:?}"),
        };
        assert!(content.contains("error"));
    }
}
