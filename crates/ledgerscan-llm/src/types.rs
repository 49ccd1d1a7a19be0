//! Provider and message types.

use serde::{Deserialize, Serialize};

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Anthropic,
    Groq,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Groq => write!(f, "groq"),
        }
    }
}

/// A chat message sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Provider and model selected from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: String,
}

/// Public view of the LLM configuration (keys masked).
#[derive(Debug, Clone, Serialize)]
pub struct LLMConfigResponse {
    #[serde(rename = "preferredProvider")]
    pub preferred_provider: String,
    #[serde(rename = "openaiConfigured")]
    pub openai_configured: bool,
    #[serde(rename = "anthropicConfigured")]
    pub anthropic_configured: bool,
    #[serde(rename = "groqConfigured")]
    pub groq_configured: bool,
    #[serde(rename = "activeProvider")]
    pub active_provider: Option<String>,
    #[serde(rename = "activeModel")]
    pub active_model: Option<String>,
}
