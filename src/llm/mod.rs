//! Provider-agnostic LLM driver layer.
//!
//! The rest of the runtime (the [`crate::agent::Agent`] ReAct loop) talks to
//! models through [`LlmProvider`]/[`ProviderSession`] rather than to a
//! concrete HTTP client, the same separation the original runtime draws
//! between `ac_llm_provider_t`'s vtable (`create`/`chat`/`chat_stream`/
//! `cleanup`) and the OpenAI/Anthropic backends that implement it. The
//! vtable becomes an `async_trait` pair here: [`LlmProvider`] is the
//! provider-level factory (stateless, one per backend), [`ProviderSession`]
//! is the per-conversation handle it creates (owns an HTTP client, does the
//! actual requests).
//!
//! [`openai`] generalizes the teacher crate's `client.rs`/`utils.rs`
//! streaming logic into this trait; [`anthropic`] is a new driver grounded
//! on the Messages API and the original C provider's header/URL/field
//! choices.

pub mod anthropic;
pub mod openai;

use crate::tools::Tool;
use crate::types::{ContentBlock, Message};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

/// Stream of content blocks produced by a streaming chat call.
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<ContentBlock>> + Send>>;

/// Connection and generation parameters a [`ProviderSession`] is built from.
///
/// Distinct from [`crate::types::AgentOptions`]: this is the narrow subset
/// a provider driver actually needs, so new providers don't have to learn
/// about hooks, auto-execution, or tool registries.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout: Duration,
    /// Exact registered provider name to use, e.g. `"anthropic"`.
    ///
    /// Used by [`ProviderRegistry::resolve`] when the caller wants the
    /// built-in driver behind a name rather than an OpenAI-compatible
    /// endpoint. Ignored when [`compatible`](Self::compatible) is set.
    pub provider: Option<String>,
    /// Name of the OpenAI-compatible provider this config targets, e.g.
    /// `"openai"`, `"ollama"`, `"groq"`.
    ///
    /// Takes priority over [`provider`](Self::provider) in
    /// [`ProviderRegistry::resolve`]: any OpenAI-compatible backend can be
    /// reached through the same `openai` driver by pointing `base_url` at
    /// it, so `compatible` only needs to name *that* driver, not a new one.
    pub compatible: Option<String>,
    /// Whether [`crate::agent::Agent::run`] should use
    /// [`ProviderSession::chat_stream`] (forwarding blocks to `on_stream`
    /// live) instead of [`ProviderSession::chat`] (collect, then replay).
    pub stream: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            model: String::new(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            timeout: Duration::from_secs(120),
            provider: None,
            compatible: None,
            stream: false,
        }
    }
}

/// A provider-agnostic chat backend.
///
/// Implementations are expected to be cheap to construct and stateless
/// beyond whatever `reqwest::Client` they cache; all per-conversation state
/// lives in the [`ProviderSession`] returned by [`create_session`].
///
/// [`create_session`]: LlmProvider::create_session
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Canonical provider name used for [`ProviderRegistry`] lookups.
    fn name(&self) -> &'static str;

    /// Build a session bound to the given configuration.
    async fn create_session(&self, config: ProviderConfig) -> Result<Box<dyn ProviderSession>>;
}

/// A live, per-conversation handle to a chat backend.
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// Send the full message history (plus available tools) and wait for
    /// the complete response as a list of content blocks.
    async fn chat(&self, messages: &[Message], tools: &[Arc<Tool>]) -> Result<Vec<ContentBlock>>;

    /// Same request as [`chat`](ProviderSession::chat), but streamed as
    /// content blocks become available.
    async fn chat_stream(&self, messages: &[Message], tools: &[Arc<Tool>]) -> Result<ContentStream>;

    /// Release any session-scoped resources (pooled HTTP clients, etc).
    /// Default no-op; providers with nothing to release don't need to
    /// override it.
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

/// Registry mapping provider names to factories.
///
/// Mirrors the original runtime's static provider table, but built with an
/// explicit, session-injectable `OnceLock`-backed registry instead of a
/// process-wide mutable global: [`ProviderRegistry::global`] lazily
/// populates the built-in OpenAI and Anthropic drivers the first time it's
/// touched, but callers that want isolation (tests, multi-tenant hosts) can
/// build their own registry with [`ProviderRegistry::new`] instead.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers registered.
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry pre-populated with the built-in OpenAI-compatible
    /// and Anthropic drivers.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(openai::OpenAiProvider::new()));
        registry.register(Arc::new(anthropic::AnthropicProvider::new()));
        registry
    }

    /// The process-wide default registry, lazily initialized with builtins
    /// on first access.
    pub fn global() -> &'static ProviderRegistry {
        static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_builtins)
    }

    /// Register (or replace) a provider under its [`LlmProvider::name`].
    pub fn register(&self, provider: Arc<dyn LlmProvider>) {
        let mut providers = self.providers.write().unwrap_or_else(|p| p.into_inner());
        providers.insert(provider.name().to_string(), provider);
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        let providers = self.providers.read().unwrap_or_else(|p| p.into_inner());
        providers.get(name).cloned()
    }

    /// Names of all registered providers.
    pub fn names(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(|p| p.into_inner());
        providers.keys().cloned().collect()
    }

    /// Selects a provider from `config` per the original runtime's 3-step
    /// policy: an explicit [`compatible`](ProviderConfig::compatible) wins,
    /// else an explicit [`provider`](ProviderConfig::provider), else the
    /// call fails rather than silently defaulting to some built-in.
    pub fn resolve(&self, config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
        if let Some(name) = &config.compatible {
            return self
                .get(name)
                .ok_or_else(|| Error::invalid_arg(format!("unknown compatible provider: {name}")));
        }
        if let Some(name) = &config.provider {
            return self
                .get(name)
                .ok_or_else(|| Error::invalid_arg(format!("unknown provider: {name}")));
        }
        Err(Error::invalid_arg(
            "no provider specified: set either `compatible` or `provider` on ProviderConfig",
        ))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_builtins_registers_openai_and_anthropic() {
        let registry = ProviderRegistry::with_builtins();
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["anthropic".to_string(), "openai".to_string()]);
    }

    #[test]
    fn global_registry_is_a_singleton() {
        let a = ProviderRegistry::global();
        let b = ProviderRegistry::global();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn unregistered_provider_returns_none() {
        let registry = ProviderRegistry::new();
        assert!(registry.get("does-not-exist").is_none());
    }

    #[test]
    fn resolve_prefers_compatible_over_provider() {
        let registry = ProviderRegistry::with_builtins();
        let config = ProviderConfig {
            compatible: Some("openai".to_string()),
            provider: Some("anthropic".to_string()),
            ..ProviderConfig::default()
        };
        let provider = registry.resolve(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn resolve_falls_back_to_provider() {
        let registry = ProviderRegistry::with_builtins();
        let config = ProviderConfig {
            provider: Some("anthropic".to_string()),
            ..ProviderConfig::default()
        };
        let provider = registry.resolve(&config).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn resolve_fails_invalid_arg_when_neither_is_set() {
        let registry = ProviderRegistry::with_builtins();
        let err = registry.resolve(&ProviderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidArg(_)));
    }

    #[test]
    fn resolve_fails_on_unknown_compatible_name() {
        let registry = ProviderRegistry::with_builtins();
        let config = ProviderConfig {
            compatible: Some("does-not-exist".to_string()),
            ..ProviderConfig::default()
        };
        assert!(registry.resolve(&config).is_err());
    }
}
