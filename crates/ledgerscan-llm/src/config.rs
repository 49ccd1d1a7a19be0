//! LLM configuration loading and provider selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{LLMConfigResponse, LLMProvider, ResolvedProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-0125-preview";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// LLM configuration (read from llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
            config_path: PathBuf::new(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config = Self::from_file(config_path);
        config.fill_from_env(|name| std::env::var(name).ok());
        config
    }

    fn from_file(config_path: &Path) -> Self {
        let mut config: LLMConfig = match std::fs::read_to_string(config_path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring unreadable {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => {
                debug!("No LLM config at {}", config_path.display());
                LLMConfig::default()
            }
        };
        config.config_path = config_path.to_path_buf();
        config
    }

    /// Fill keys missing from the file with `OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY` and `GROQ_API_KEY`.
    fn fill_from_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (slot, var) in [
            (&mut self.openai_api_key, "OPENAI_API_KEY"),
            (&mut self.anthropic_api_key, "ANTHROPIC_API_KEY"),
            (&mut self.groq_api_key, "GROQ_API_KEY"),
        ] {
            if non_empty(slot).is_none() {
                *slot = lookup(var).filter(|k| !k.trim().is_empty());
            }
        }
    }

    /// Resolve which provider and model to use.
    ///
    /// `auto` prefers OpenAI, then Anthropic, then Groq.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        let openai = || self.resolved(LLMProvider::OpenAI, &self.openai_api_key, &self.openai_model);
        let anthropic = || {
            self.resolved(
                LLMProvider::Anthropic,
                &self.anthropic_api_key,
                &self.anthropic_model,
            )
        };
        let groq = || self.resolved(LLMProvider::Groq, &self.groq_api_key, &self.groq_model);

        match self.preferred_provider.as_str() {
            "openai" => openai(),
            "anthropic" => anthropic(),
            "groq" => groq(),
            "auto" => openai().or_else(anthropic).or_else(groq),
            other => {
                warn!("Unknown preferred LLM provider: {}", other);
                None
            }
        }
    }

    fn resolved(
        &self,
        provider: LLMProvider,
        key: &Option<String>,
        model: &str,
    ) -> Option<ResolvedProvider> {
        non_empty(key).map(|api_key| ResolvedProvider {
            provider,
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> LLMConfigResponse {
        let resolved = self.resolve_provider();
        LLMConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            openai_configured: non_empty(&self.openai_api_key).is_some(),
            anthropic_configured: non_empty(&self.anthropic_api_key).is_some(),
            groq_configured: non_empty(&self.groq_api_key).is_some(),
            active_provider: resolved.as_ref().map(|r| r.provider.to_string()),
            active_model: resolved.map(|r| r.model),
        }
    }
}

fn non_empty(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}
