//! Per-user model preferences, kept in memory for the lifetime of the process.

use crate::config::{
    regular_models, structured_models, DEFAULT_MODEL, DEFAULT_STRUCTURED_MODEL,
};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;

/// Which generation command a preference applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKind {
    /// `/llm`
    Llm,
    /// `/properties_gen`
    Structured,
}

impl PreferenceKind {
    /// Models a user may pick for this kind
    #[must_use]
    pub fn choices(self) -> Vec<&'static str> {
        match self {
            Self::Llm => regular_models(),
            Self::Structured => structured_models(),
        }
    }

    /// Model used when the user has not chosen one
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Llm => DEFAULT_MODEL,
            Self::Structured => DEFAULT_STRUCTURED_MODEL,
        }
    }

    /// Whether `model` is a valid choice for this kind
    #[must_use]
    pub fn accepts(self, model: &str) -> bool {
        self.choices().contains(&model)
    }

    /// Short tag used in callback data
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Structured => "structured",
        }
    }

    /// Inverse of [`PreferenceKind::tag`]
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "llm" => Some(Self::Llm),
            "structured" => Some(Self::Structured),
            _ => None,
        }
    }
}

impl fmt::Display for PreferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Llm => write!(f, "LLM"),
            Self::Structured => write!(f, "Structured"),
        }
    }
}

/// Models chosen by one user; `None` means the default for that kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelPreferences {
    /// Model for plain generation
    pub llm: Option<String>,
    /// Model for structured generation
    pub structured: Option<String>,
}

impl ModelPreferences {
    /// Preference for `kind`, if any
    #[must_use]
    pub fn get(&self, kind: PreferenceKind) -> Option<&str> {
        match kind {
            PreferenceKind::Llm => self.llm.as_deref(),
            PreferenceKind::Structured => self.structured.as_deref(),
        }
    }

    fn set(&mut self, kind: PreferenceKind, model: String) {
        match kind {
            PreferenceKind::Llm => self.llm = Some(model),
            PreferenceKind::Structured => self.structured = Some(model),
        }
    }
}

/// In-memory `user id -> preferences` map shared by all handlers
#[derive(Debug, Default)]
pub struct PreferenceStore {
    inner: RwLock<HashMap<i64, ModelPreferences>>,
}

impl PreferenceStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the user's choice for `kind`, replacing any previous one
    pub async fn set(&self, user_id: i64, kind: PreferenceKind, model: &str) {
        debug!("User {user_id} set {kind} model to {model}");
        self.inner
            .write()
            .await
            .entry(user_id)
            .or_default()
            .set(kind, model.to_string());
    }

    /// The user's model for `kind`, if one was chosen
    pub async fn model_for(&self, user_id: i64, kind: PreferenceKind) -> Option<String> {
        self.inner
            .read()
            .await
            .get(&user_id)
            .and_then(|prefs| prefs.get(kind))
            .map(str::to_string)
    }
}
