//! OpenAI-compatible embeddings client.
//!
//! Blocking: call from a blocking thread when inside an async runtime.

use std::thread;
use std::time::Duration;

use ndarray::Array1;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::EmbeddingCache;
use crate::embedder::{EmbedderBackend, EmbeddingResult};
use ledgerscan_core::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: usize = 3;
/// Inputs sent per request.
const BATCH_SIZE: usize = 256;

/// Embeddings through `POST {base_url}/embeddings`.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    cache: EmbeddingCache,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, model: impl Into<String>, dimension: usize) -> Result<Self> {
        Self::with_base_url(api_key, model, dimension, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: &str,
        model: impl Into<String>,
        dimension: usize,
        base_url: &str,
    ) -> Result<Self> {
        let model = model.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("missing OpenAI API key".into()));
        }
        if model.trim().is_empty() {
            return Err(Error::Config("missing embedding model name".into()));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| Error::Config("invalid OpenAI API key".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Http(format!("failed to build embeddings client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            dimension,
            cache: EmbeddingCache::default(),
        })
    }

    /// One request for at most `BATCH_SIZE` inputs.
    fn request(&self, inputs: &[&str]) -> Result<Vec<Array1<f32>>> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
            };
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp
                        .text()
                        .map_err(|e| Error::Http(format!("failed to read embeddings response: {}", e)))?;
                    if status.is_success() {
                        return parse_embedding_response(&body, inputs.len());
                    }
                    if should_retry(status) && attempt + 1 < MAX_RETRIES {
                        attempt += 1;
                        warn!("Embeddings request returned {}, retrying ({})", status, attempt);
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(Error::Embedding(format!(
                        "embeddings request failed ({}): {}",
                        status, body
                    )));
                }
                Err(err) => {
                    if (err.is_timeout() || err.is_connect()) && attempt + 1 < MAX_RETRIES {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(Error::Http(format!("embeddings request failed: {}", err)));
                }
            }
        }
    }
}

impl EmbedderBackend for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        if let Some(embedding) = self.cache.get(text) {
            return Ok(EmbeddingResult {
                embedding,
                cached: true,
            });
        }
        let embedding = self
            .request(&[text])?
            .pop()
            .ok_or_else(|| Error::Embedding("empty embeddings response".into()))?;
        self.cache.put(text.to_string(), embedding.clone());
        Ok(EmbeddingResult {
            embedding,
            cached: false,
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        let mut out: Vec<Option<Array1<f32>>> = texts.iter().map(|t| self.cache.get(t)).collect();
        let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        debug!(
            "Embedding {} texts ({} cached)",
            texts.len(),
            texts.len() - missing.len()
        );

        for batch in missing.chunks(BATCH_SIZE) {
            let inputs: Vec<&str> = batch.iter().map(|&i| texts[i]).collect();
            let vectors = self.request(&inputs)?;
            for (&i, vector) in batch.iter().zip(vectors) {
                if vector.len() != self.dimension {
                    warn!(
                        "Embedding dimension {} differs from configured {}",
                        vector.len(),
                        self.dimension
                    );
                }
                self.cache.put(texts[i].to_string(), vector.clone());
                out[i] = Some(vector);
            }
        }

        out.into_iter()
            .map(|v| v.ok_or_else(|| Error::Embedding("missing embedding in response".into())))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Parse an `/embeddings` response body into vectors ordered by input index.
pub fn parse_embedding_response(body: &str, expected: usize) -> Result<Vec<Array1<f32>>> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| Error::Embedding(format!("failed to parse embeddings response: {}", e)))?;
    parsed.data.sort_by_key(|entry| entry.index);
    if parsed.data.len() != expected {
        return Err(Error::Embedding(format!(
            "received {} embeddings for {} inputs",
            parsed.data.len(),
            expected
        )));
    }
    Ok(parsed
        .data
        .into_iter()
        .map(|entry| Array1::from(entry.embedding))
        .collect())
}
