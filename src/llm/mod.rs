//! LLM providers and client
//!
//! Provides a unified interface to the hosted LLM providers (Anthropic, `OpenAI`)
//! and the routing that picks a provider from the requested model.

mod common;
pub(crate) mod http_utils;
/// Implementations of specific LLM providers
pub mod providers;

use crate::config::{
    get_model_info, ModelInfo, Provider, Settings, DEFAULT_MODEL, DEFAULT_STRUCTURED_MODEL,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Model is not in the catalog
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    /// Model cannot produce schema-constrained output
    #[error("Model {0} does not support structured output")]
    StructuredUnsupported(String),
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A message in an LLM conversation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    /// Role of the message sender (user, assistant)
    pub role: String,
    /// Text content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    /// Create a new assistant message
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

/// Interface for all LLM providers
///
/// An empty `system_prompt` means no system prompt is sent.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a plain text completion
    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError>;

    /// Generate a JSON value constrained to `schema`
    async fn structured_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        schema: &Value,
    ) -> Result<Value, LlmError>;
}

/// Picks the catalog entry serving a request.
///
/// Falls back to the default model for the request kind when `model` is
/// `None`. Structured requests are only accepted by models that support a
/// strict JSON schema response format.
///
/// # Examples
///
/// ```
/// use oxide_relay::config::Provider;
/// use oxide_relay::llm::route;
///
/// let info = route(None, false).unwrap();
/// assert_eq!(info.provider, Provider::Anthropic);
/// let info = route(None, true).unwrap();
/// assert_eq!(info.id, "gpt-4o");
/// ```
///
/// # Errors
///
/// Returns `LlmError::UnknownModel` for models outside the catalog and
/// `LlmError::StructuredUnsupported` for structured requests to text-only models.
pub fn route(model: Option<&str>, structured: bool) -> Result<&'static ModelInfo, LlmError> {
    let name = model.unwrap_or(if structured {
        DEFAULT_STRUCTURED_MODEL
    } else {
        DEFAULT_MODEL
    });

    let info = get_model_info(name).ok_or_else(|| LlmError::UnknownModel(name.to_string()))?;

    if structured && !info.structured {
        return Err(LlmError::StructuredUnsupported(name.to_string()));
    }

    Ok(info)
}

/// Client dispatching requests to the configured providers
pub struct LlmClient {
    anthropic: Option<Box<dyn LlmProvider>>,
    openai: Option<Box<dyn LlmProvider>>,
    system_prompt: String,
}

impl LlmClient {
    /// Build a client from settings; providers without an API key stay disabled.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let anthropic = settings.anthropic_api_key.as_ref().map(|k| {
            Box::new(providers::AnthropicProvider::new(k.clone())) as Box<dyn LlmProvider>
        });
        let openai = settings.openai_api_key.as_ref().map(|k| {
            Box::new(providers::OpenAiProvider::new(k.clone())) as Box<dyn LlmProvider>
        });

        info!(
            "LLM providers: anthropic={}, openai={}",
            anthropic.is_some(),
            openai.is_some()
        );

        Self::with_providers(anthropic, openai, settings.system_prompt().to_string())
    }

    /// Build a client from explicit provider instances
    #[must_use]
    pub fn with_providers(
        anthropic: Option<Box<dyn LlmProvider>>,
        openai: Option<Box<dyn LlmProvider>>,
        system_prompt: String,
    ) -> Self {
        Self {
            anthropic,
            openai,
            system_prompt,
        }
    }

    fn get_provider(&self, provider: Provider) -> Result<&dyn LlmProvider, LlmError> {
        match provider {
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::OpenAi => self.openai.as_deref(),
        }
        .ok_or_else(|| LlmError::MissingConfig(provider.to_string()))
    }

    /// Generate a plain text answer to a single prompt
    ///
    /// # Errors
    ///
    /// Returns routing errors, `LlmError::MissingConfig` when the provider has
    /// no API key, or the provider's own error.
    pub async fn chat(&self, prompt: &str, model: Option<&str>) -> Result<String, LlmError> {
        let info = route(model, false)?;
        let provider = self.get_provider(info.provider)?;

        debug!("Routing text request to {} ({})", info.id, info.provider);
        provider
            .chat_completion(
                &self.system_prompt,
                &[],
                prompt,
                info.id,
                info.max_tokens,
            )
            .await
    }

    /// Generate a JSON value matching `schema` for a single prompt
    ///
    /// # Errors
    ///
    /// Returns routing errors, `LlmError::MissingConfig` when the provider has
    /// no API key, or the provider's own error.
    pub async fn structured(
        &self,
        prompt: &str,
        schema: &Value,
        model: Option<&str>,
    ) -> Result<Value, LlmError> {
        let info = route(model, true)?;
        let provider = self.get_provider(info.provider)?;

        debug!("Routing structured request to {} ({})", info.id, info.provider);
        provider
            .structured_completion(&self.system_prompt, &[], prompt, info.id, schema)
            .await
    }

    /// Whether a provider is configured for the given model's provider
    #[must_use]
    pub fn is_available(&self, provider: Provider) -> bool {
        self.get_provider(provider).is_ok()
    }
}
