//! LedgerScan Infer: embedding backends and embedding cache.
//!
//! Provides the `EmbedderBackend` trait for generating embeddings.
//! With an API key, `OpenAiEmbedder` calls an OpenAI-compatible
//! `/embeddings` endpoint (text-embedding-3-small, 1536-dim by default).
//! Without one, `NoopEmbedder` is used and extraction runs without
//! retrieved examples.

pub mod cache;
pub mod embedder;
pub mod openai;

pub use cache::EmbeddingCache;
pub use embedder::{EmbedderBackend, EmbeddingResult, NoopEmbedder};
pub use openai::OpenAiEmbedder;

use std::sync::Arc;

/// Create the best available embedder.
///
/// Uses the OpenAI backend when an API key is present, falls back to
/// `NoopEmbedder` otherwise. Builds a blocking HTTP client, so call it
/// outside of async contexts.
pub fn create_embedder(api_key: Option<&str>, model: &str, dimension: usize) -> Arc<dyn EmbedderBackend> {
    match api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => match OpenAiEmbedder::new(key, model, dimension) {
            Ok(embedder) => {
                tracing::info!("Using OpenAI embedder (model={}, dim={})", model, dimension);
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!("OpenAI embedder unavailable: {}. Continuing without embeddings.", e);
            }
        },
        None => {
            tracing::info!("No embedding API key configured. Extraction runs without examples.");
        }
    }

    Arc::new(NoopEmbedder::new(dimension))
}
