//! Embedding backend trait and implementations.
//!
//! The `EmbedderBackend` trait abstracts over embedding generation.
//! Implementations:
//! - `OpenAiEmbedder`: OpenAI-compatible `/embeddings` endpoint (see `openai`)
//! - `NoopEmbedder`: no backend configured; every call fails with
//!   `Error::Embedding` so callers can carry on without retrieval

use ndarray::Array1;

use ledgerscan_core::{Error, Result};

/// Result of an embedding operation.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// Float32 embedding vector (1536-dim for text-embedding-3-small).
    pub embedding: Array1<f32>,
    /// Whether this was served from cache.
    pub cached: bool,
}

/// Trait for embedding backends.
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    fn embed(&self, text: &str) -> Result<EmbeddingResult>;

    /// Generate embeddings for a batch of texts, one vector per text in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        texts
            .iter()
            .map(|t| self.embed(t).map(|r| r.embedding))
            .collect()
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Check if the embedder can produce vectors.
    fn is_available(&self) -> bool;

    fn model_name(&self) -> &str;
}

/// Placeholder embedder used when no API key is configured.
pub struct NoopEmbedder {
    dim: usize,
}

impl NoopEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl EmbedderBackend for NoopEmbedder {
    fn embed(&self, _text: &str) -> Result<EmbeddingResult> {
        Err(Error::Embedding("no embedding backend configured".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Err(Error::Embedding("no embedding backend configured".into()))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_available(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        "none"
    }
}
