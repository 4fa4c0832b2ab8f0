//! # Open Agent SDK - Rust Implementation
//!
//! A production-ready, streaming-first Rust SDK for building AI agents with local OpenAI-compatible servers.
//!
//! ## Overview
//!
//! This SDK provides a clean, ergonomic API for working with local LLM servers such as:
//! - LM Studio
//! - Ollama
//! - llama.cpp
//! - vLLM
//!
//! ## Key Features
//!
//! - **Zero API Costs**: Run models on your own hardware
//! - **Privacy-First**: All data stays local on your machine
//! - **High Performance**: Native async/await with Tokio runtime
//! - **Streaming Responses**: Real-time token-by-token streaming
//! - **Tool Calling**: Define and execute tools with automatic schema generation
//! - **Lifecycle Hooks**: Intercept and control execution at key points
//! - **Interrupts**: Gracefully cancel long-running operations
//! - **Context Management**: Manual token estimation and history truncation
//! - **Retry Logic**: Exponential backoff with jitter for reliability
//!
//! ## Two Interaction Modes
//!
//! ### 1. Simple Query Function (`query()`)
//! For single-turn interactions without conversation state:
//!
//! ```rust,no_run
//! use open_agent::{query, AgentOptions, ContentBlock};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Configure the agent with required settings
//!     let options = AgentOptions::builder()
//!         .system_prompt("You are a helpful assistant")
//!         .model("qwen2.5-32b-instruct")
//!         .base_url("http://localhost:1234/v1")
//!         .build()?;
//!
//!     // Send a single query and stream the response
//!     let mut stream = query("What's the capital of France?", &options).await?;
//!
//!     // Process each content block as it arrives
//!     while let Some(block) = stream.next().await {
//!         match block? {
//!             ContentBlock::Text(text_block) => {
//!                 print!("{}", text_block.text);
//!             }
//!             ContentBlock::ToolUse(tool_block) => {
//!                 println!("Tool called: {}", tool_block.name);
//!             }
//!             ContentBlock::ToolResult(_) => {
//!                 // Tool results can be ignored in simple queries
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### 2. Client Object (`Client`)
//! For multi-turn conversations with persistent state:
//!
//! ```rust,no_run
//! use open_agent::{Client, AgentOptions, ContentBlock};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AgentOptions::builder()
//!         .system_prompt("You are a helpful assistant")
//!         .model("qwen2.5-32b-instruct")
//!         .base_url("http://localhost:1234/v1")
//!         .build()?;
//!
//!     // Create a stateful client that maintains conversation history
//!     let mut client = Client::new(options)?;
//!
//!     // First turn
//!     client.send("What's 2+2?").await?;
//!     while let Some(block) = client.receive().await? {
//!         if let ContentBlock::Text(text) = block {
//!             print!("{}", text.text);
//!         }
//!     }
//!
//!     // Second turn - client remembers previous context
//!     client.send("What about if we multiply that by 3?").await?;
//!     while let Some(block) = client.receive().await? {
//!         if let ContentBlock::Text(text) = block {
//!             print!("{}", text.text);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The SDK is organized into several modules, each with a specific responsibility:
//!
//! - **client**: Core streaming query engine and multi-turn client
//! - **agent**: Provider-agnostic ReAct loop over `llm`/`registry`
//! - **session**: Arena-scoped root object owning `Agent`s and `McpClient`s
//! - **llm**: Provider-agnostic chat driver trait plus OpenAI/Anthropic backends
//! - **mcp**: Model Context Protocol client (Streamable HTTP + legacy SSE)
//! - **registry**: Unified dispatch over local and MCP-discovered tools
//! - **arena**: Byte-budgeted scratch allocator
//! - **http_pool**: Pooled `reqwest::Client` reuse across provider/MCP calls
//! - **sse**: Server-Sent Events line parsing shared by streaming transports
//! - **types**: Data structures for messages, content blocks, and configuration
//! - **tools**: Tool definition system with automatic JSON schema generation
//! - **hooks**: Lifecycle event system for intercepting execution
//! - **config**: Provider-specific configuration helpers
//! - **error**: Comprehensive error types and conversions
//! - **context**: Token estimation and message truncation utilities
//! - **retry**: Exponential backoff retry logic with jitter
//! - **utils**: Internal utilities for SSE parsing and tool aggregation

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
// These modules are private (internal implementation details) unless explicitly
// re-exported through `pub use` statements below.

/// Core client implementation providing streaming queries and stateful conversations.
/// Contains the `query()` function for single-turn queries and `Client` struct
/// for multi-turn conversations with automatic state management.
mod client;

/// Byte-budgeted scratch allocator standing in for the original runtime's
/// bump arena, scoped to a [`Session`].
mod arena;

/// Provider-agnostic ReAct loop (`Agent`), generalizing `Client`'s
/// OpenAI-bound auto-execution loop over any `LlmProvider`.
mod agent;

/// Provider configuration helpers for LM Studio, Ollama, llama.cpp, and vLLM.
/// Simplifies endpoint and model name resolution with environment variable support.
mod config;

/// Context window management utilities for token estimation and history truncation.
/// Provides manual control over conversation memory to prevent context overflow.
mod context;

/// Error types and conversions for comprehensive error handling throughout the SDK.
/// Defines the `Error` enum and `Result<T>` type alias used across all public APIs.
mod error;

/// Pooled HTTP client management shared by provider drivers and the MCP
/// Streamable HTTP transport.
mod http_pool;

/// Lifecycle hooks system for intercepting and controlling execution at key points.
/// Enables security gates, audit logging, input/output modification, and compliance checks.
mod hooks;

/// Provider-agnostic LLM driver layer (`LlmProvider`/`ProviderSession`) plus
/// the built-in OpenAI-compatible and Anthropic drivers.
pub mod llm;

/// Model Context Protocol client: Streamable HTTP and legacy SSE transports,
/// multi-server config loading, and tool discovery/invocation.
pub mod mcp;

/// Unified registry dispatching to local and MCP-discovered tools alike.
mod registry;

/// Arena-scoped session object owning the `Agent`s and `McpClient`s created
/// under it, with explicit async teardown via `Session::close`.
mod session;

/// Server-Sent Events parsing shared by the OpenAI driver and the MCP SSE
/// transport.
mod sse;

/// Tool definition and execution system with automatic JSON schema generation.
/// Allows LLMs to call Rust functions with type-safe parameter handling.
mod tools;

/// Core type definitions for messages, content blocks, and agent configuration.
/// Includes builder patterns for ergonomic configuration and OpenAI API serialization.
mod types;

/// Internal utilities for Server-Sent Events (SSE) parsing and tool call aggregation.
/// Handles the low-level details of streaming response parsing.
mod utils;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================
// These items form the public API of the SDK. Everything else is internal.

/// Retry utilities with exponential backoff and jitter.
/// Made public as a module so users can access retry configuration and functions
/// for their own operations that need retry logic.
pub mod retry;

// --- Core Client API ---

pub use client::{Client, query};

// --- ReAct Agent ---

pub use agent::{Agent, AgentRunOutcome, AgentStatus, StreamCallback};

// --- Arena-Scoped Session ---

pub use session::Session;

// --- Scratch Arena ---

pub use arena::{Arena, ArenaHandle};

// --- Provider Configuration ---

pub use config::{
    ANTHROPIC_DEFAULT_BASE_URL, Provider, get_anthropic_api_key, get_anthropic_base_url,
    get_base_url, get_model,
};

// --- Context Management ---

pub use context::{estimate_tokens, is_approaching_limit, truncate_messages};

// --- Error Handling ---

pub use error::{Error, Result};

// --- HTTP Connection Pooling ---

pub use http_pool::{HttpPool, HttpPoolConfig, PooledClient};

// --- Lifecycle Hooks ---

pub use hooks::{
    HOOK_POST_TOOL_USE, HOOK_PRE_TOOL_USE, HOOK_USER_PROMPT_SUBMIT, HookDecision, Hooks,
    PostToolUseEvent, PreToolUseEvent, UserPromptSubmitEvent,
};

// --- LLM Provider Layer ---

pub use llm::{ContentStream, LlmProvider, ProviderConfig, ProviderRegistry, ProviderSession};

// --- Model Context Protocol Client ---

pub use mcp::{
    McpClient, McpConfig, McpServerConfig, McpServerInfo, McpServersFile, McpToolInfo,
    connect_all, is_sse_url,
};

// --- Tool Registry ---

pub use registry::{ToolCallOutcome, ToolRegistry};

// --- Server-Sent Events ---

pub use sse::{SseEvent, SseParser, sse_stream};

// --- Tool System ---

pub use tools::{Tool, ToolBuilder, tool};

// --- Core Types ---

pub use types::{
    AgentOptions, AgentOptionsBuilder, BaseUrl, ContentBlock, ImageBlock, ImageDetail, Message,
    MessageRole, ModelName, ReasoningBlock, Temperature, TextBlock, ThinkingBlock, ToolResultBlock,
    ToolUseBlock,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module containing the most commonly used types and functions.
/// Import with `use open_agent::prelude::*;` to get everything you need for typical usage.
///
/// This includes:
/// - Configuration: AgentOptions, AgentOptionsBuilder
/// - Client: Client, query()
/// - Content: ContentBlock, TextBlock, ToolUseBlock
/// - Tools: Tool, tool()
/// - Hooks: Hooks, HookDecision, hook event types
/// - Errors: Error, Result
pub mod prelude {
    pub use crate::{
        Agent, AgentOptions, AgentOptionsBuilder, AgentStatus, Client, ContentBlock, Error,
        HookDecision, Hooks, LlmProvider, McpClient, PostToolUseEvent, PreToolUseEvent,
        ProviderConfig, ProviderSession, Result, Session, TextBlock, Tool, ToolRegistry,
        ToolUseBlock, UserPromptSubmitEvent, query, tool,
    };
}
