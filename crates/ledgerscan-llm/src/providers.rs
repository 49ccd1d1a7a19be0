//! Non-streaming chat completion against OpenAI, Groq and Anthropic.
//!
//! OpenAI and Groq share the chat-completions format; Anthropic uses the
//! Messages API with the system prompt as a top-level field. The client is
//! blocking: call it from a blocking thread when inside an async runtime.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;
use tracing::{debug, info};

use crate::clean::parse_model_json;
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::types::{ChatMessage, LLMProvider, ResolvedProvider};
use ledgerscan_core::{Error, Result};

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

pub const EXTRACTION_TEMPERATURE: f64 = 0.2;
const MAX_TOKENS: usize = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// A chat model that answers a list of messages with one reply.
pub trait CompletionBackend: Send + Sync {
    fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String>;

    fn model_name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }
}

/// HTTP client for the configured provider.
pub struct LlmClient {
    client: Client,
    provider: LLMProvider,
    model: String,
    api_key: String,
    url: String,
}

impl LlmClient {
    pub fn new(resolved: ResolvedProvider) -> Result<Self> {
        let url = match resolved.provider {
            LLMProvider::OpenAI => OPENAI_CHAT_URL,
            LLMProvider::Groq => GROQ_CHAT_URL,
            LLMProvider::Anthropic => ANTHROPIC_MESSAGES_URL,
        };
        Self::with_url(resolved, url)
    }

    /// Point the client at another endpoint speaking the provider's format.
    pub fn with_url(resolved: ResolvedProvider, url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("failed to build LLM client: {}", e)))?;
        info!("LLM provider: {} ({})", resolved.provider, resolved.model);
        Ok(Self {
            client,
            provider: resolved.provider,
            model: resolved.model,
            api_key: resolved.api_key,
            url: url.to_string(),
        })
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    fn request_body(&self, messages: &[ChatMessage], temperature: f64) -> serde_json::Value {
        match self.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => {
                let msgs: Vec<serde_json::Value> = messages
                    .iter()
                    .map(|m| json!({"role": m.role, "content": m.content}))
                    .collect();
                json!({
                    "model": self.model,
                    "messages": msgs,
                    "temperature": temperature,
                })
            }
            LLMProvider::Anthropic => {
                let conv: Vec<serde_json::Value> = messages
                    .iter()
                    .filter(|m| m.role != "system")
                    .map(|m| json!({"role": m.role, "content": m.content}))
                    .collect();
                let mut body = json!({
                    "model": self.model,
                    "messages": conv,
                    "temperature": temperature,
                    "max_tokens": MAX_TOKENS,
                });
                if let Some(system) = messages.iter().find(|m| m.role == "system") {
                    body["system"] = json!(system.content);
                }
                body
            }
        }
    }
}

impl CompletionBackend for LlmClient {
    fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        let body = self.request_body(messages, temperature);
        debug!("Requesting completion from {} with model {}", self.provider, self.model);

        let request = self.client.post(&self.url).json(&body);
        let request = match self.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            }
            LLMProvider::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
        };

        let response = request
            .send()
            .map_err(|e| Error::Llm(format!("request failed: {}", e)))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| Error::Llm(format!("failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(Error::Llm(format!("API error {}: {}", status, text)));
        }

        match self.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => parse_chat_completion(&text),
            LLMProvider::Anthropic => parse_anthropic_message(&text),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Stand-in used when no provider key is configured.
pub struct UnconfiguredLlm;

impl CompletionBackend for UnconfiguredLlm {
    fn complete(&self, _messages: &[ChatMessage], _temperature: f64) -> Result<String> {
        Err(Error::Llm("no LLM provider configured".into()))
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Reply text of a chat-completions response.
pub fn parse_chat_completion(body: &str) -> Result<String> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Llm(format!("unreadable completion response: {}", e)))?;
    parsed["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Llm("completion response has no message content".into()))
}

/// Concatenated text blocks of an Anthropic Messages response.
pub fn parse_anthropic_message(body: &str) -> Result<String> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Llm(format!("unreadable Anthropic response: {}", e)))?;
    let blocks = parsed["content"]
        .as_array()
        .ok_or_else(|| Error::Llm("Anthropic response has no content".into()))?;
    let text: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();
    Ok(text.trim().to_string())
}

/// Ask the model for the accounting rows of a document.
///
/// `tokens` are `(id, text)` pairs in document order; `examples` are rows
/// validated on similar documents. Returns the parsed JSON reply.
pub fn extract_rows<I, K, V>(
    backend: &dyn CompletionBackend,
    tokens: I,
    examples: &[serde_json::Value],
) -> Result<serde_json::Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: std::fmt::Display,
    V: std::fmt::Display,
{
    let messages = [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(tokens, examples)),
    ];
    let reply = backend.complete(&messages, EXTRACTION_TEMPERATURE)?;
    let rows = parse_model_json(&reply)?;
    info!(
        "Model {} returned {} rows",
        backend.model_name(),
        rows.as_array().map_or(0, Vec::len)
    );
    Ok(rows)
}
