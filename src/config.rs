//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the model catalog.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of user IDs allowed to use the bot.
    /// Empty or unset means the bot is open to everyone.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,

    /// `OpenAI` API key (chat, structured output, images)
    pub openai_api_key: Option<String>,
    /// Anthropic API key
    pub anthropic_api_key: Option<String>,

    /// Optional system prompt sent with every generation request
    pub system_message: Option<String>,

    /// Model used by `/imagine`
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Image size requested from the image API
    #[serde(default = "default_image_size")]
    pub image_size: String,

    /// Path to the background removal script
    #[serde(default = "default_nukki_script")]
    pub nukki_script: String,
    /// Interpreter used to run the background removal script
    #[serde(default = "default_nukki_interpreter")]
    pub nukki_interpreter: String,
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_nukki_script() -> String {
    "scripts/nukki.py".to_string()
}

fn default_nukki_interpreter() -> String {
    "python3".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use oxide_relay::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__IMAGE_MODEL=dall-e-3 ./target/app` would set the `image_model` key
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain env vars: UPPER_SNAKE_CASE maps to snake_case, empty values count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Returns the set of Telegram IDs that are allowed to use the bot
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the user may use the bot. An empty allow-list admits everyone.
    #[must_use]
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        let allowed = self.allowed_users();
        allowed.is_empty() || allowed.contains(&user_id)
    }

    /// System prompt for generation requests; empty when none is configured.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        self.system_message.as_deref().unwrap_or_default()
    }
}

/// Hosted provider serving a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provider {
    /// Anthropic Messages API
    Anthropic,
    /// `OpenAI` Chat Completions API
    OpenAi,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Information about a supported LLM model
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelInfo {
    /// Model identifier, shown to users and sent to the provider
    pub id: &'static str,
    /// Maximum allowed output tokens
    pub max_tokens: u32,
    /// Provider serving the model
    pub provider: Provider,
    /// Whether the model accepts a strict JSON schema response format
    pub structured: bool,
}

/// List of all supported models. Regular models come first in display order.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-sonnet-4-5",
        max_tokens: 8192,
        provider: Provider::Anthropic,
        structured: false,
    },
    ModelInfo {
        id: "claude-haiku-4-5",
        max_tokens: 8192,
        provider: Provider::Anthropic,
        structured: false,
    },
    ModelInfo {
        id: "gpt-4o",
        max_tokens: 16_384,
        provider: Provider::OpenAi,
        structured: true,
    },
    ModelInfo {
        id: "gpt-4o-mini",
        max_tokens: 16_384,
        provider: Provider::OpenAi,
        structured: true,
    },
    ModelInfo {
        id: "gpt-4-turbo",
        max_tokens: 4096,
        provider: Provider::OpenAi,
        structured: true,
    },
    ModelInfo {
        id: "o1",
        max_tokens: 100_000,
        provider: Provider::OpenAi,
        structured: true,
    },
    ModelInfo {
        id: "o1-mini",
        max_tokens: 65_536,
        provider: Provider::OpenAi,
        structured: true,
    },
];

/// Default model for plain text generation
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
/// Default model for structured output
pub const DEFAULT_STRUCTURED_MODEL: &str = "gpt-4o";

/// Look up a model by identifier
#[must_use]
pub fn get_model_info(model: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|info| info.id == model)
}

/// Models selectable for plain text generation
#[must_use]
pub fn regular_models() -> Vec<&'static str> {
    MODELS.iter().map(|info| info.id).collect()
}

/// Models selectable for structured output
#[must_use]
pub fn structured_models() -> Vec<&'static str> {
    MODELS
        .iter()
        .filter(|info| info.structured)
        .map(|info| info.id)
        .collect()
}

// Telegram API retry configuration
/// Maximum retries for Telegram file operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff in milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff in milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Default timeout for LLM HTTP requests (seconds)
pub const LLM_HTTP_TIMEOUT_SECS: u64 = 120;
/// Default timeout for image generation requests (seconds)
pub const IMAGE_HTTP_TIMEOUT_SECS: u64 = 180;
/// Default timeout for the background removal script (seconds)
pub const NUKKI_TIMEOUT_SECS: u64 = 300;

/// Cooldown period (seconds) between "Access Denied" messages for same user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Get LLM HTTP timeout from env or default.
///
/// Environment variable: `LLM_HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_llm_http_timeout_secs() -> u64 {
    env_or("LLM_HTTP_TIMEOUT_SECS", LLM_HTTP_TIMEOUT_SECS)
}

/// Get image generation HTTP timeout from env or default.
///
/// Environment variable: `IMAGE_HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_image_http_timeout_secs() -> u64 {
    env_or("IMAGE_HTTP_TIMEOUT_SECS", IMAGE_HTTP_TIMEOUT_SECS)
}

/// Get background removal script timeout from env or default.
///
/// Environment variable: `NUKKI_TIMEOUT_SECS`.
#[must_use]
pub fn get_nukki_timeout_secs() -> u64 {
    env_or("NUKKI_TIMEOUT_SECS", NUKKI_TIMEOUT_SECS)
}

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    env_or("UNAUTHORIZED_COOLDOWN_SECS", UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    env_or("UNAUTHORIZED_CACHE_MAX_SIZE", UNAUTHORIZED_CACHE_MAX_SIZE)
}
