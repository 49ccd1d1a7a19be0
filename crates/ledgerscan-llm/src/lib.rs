//! LedgerScan LLM: turns extracted tokens into accounting rows through an
//! external chat model (OpenAI/Anthropic/Groq).

pub mod clean;
pub mod config;
pub mod prompt;
pub mod providers;
pub mod types;

pub use clean::{clean_json_output, parse_model_json};
pub use config::LLMConfig;
pub use prompt::{build_prompt, ROW_FIELDS, SYSTEM_PROMPT};
pub use providers::{extract_rows, CompletionBackend, LlmClient, UnconfiguredLlm};
pub use types::*;

use std::sync::Arc;

/// Build the completion backend for `config`, or a stand-in that fails
/// every request when no provider key is configured.
pub fn create_backend(config: &LLMConfig) -> Arc<dyn CompletionBackend> {
    match config.resolve_provider() {
        Some(resolved) => match LlmClient::new(resolved) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!("LLM client unavailable: {}", e);
                Arc::new(UnconfiguredLlm)
            }
        },
        None => {
            tracing::warn!("No LLM API key configured; extraction requests will fail");
            Arc::new(UnconfiguredLlm)
        }
    }
}
