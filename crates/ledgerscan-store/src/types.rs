//! Data types for extraction records, corrections and chunk embeddings.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Lifecycle of an extraction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// Placeholder reserved before processing finished.
    Pending,
    Complete,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            other => Err(format!("unknown extraction status: {}", other)),
        }
    }
}

/// A previous version of an extraction's final data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub version: i64,
    /// RFC 3339 time at which this version was replaced.
    pub timestamp: String,
    pub final_data: serde_json::Value,
}

/// An extraction record, keyed by the SHA-256 of the uploaded PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub document_id: String,
    pub file_name: String,
    pub status: ExtractionStatus,
    /// `[{id, text}]` tokens sent to the model.
    pub raw: serde_json::Value,
    /// Current list of accounting rows.
    pub final_data: serde_json::Value,
    pub meta: serde_json::Value,
    pub corrections: Vec<Correction>,
    pub created_at: String,
    pub updated_at: String,
}

impl Extraction {
    pub fn is_complete(&self) -> bool {
        self.status == ExtractionStatus::Complete
    }

    /// Final rows as a list; anything other than a JSON array has no rows.
    pub fn final_rows(&self) -> Vec<serde_json::Value> {
        match &self.final_data {
            serde_json::Value::Array(rows) => rows.clone(),
            _ => Vec::new(),
        }
    }
}

/// One chunk vector of a document, as read back for ranking.
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Array1<f32>,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_extractions: i64,
    pub pending_extractions: i64,
    pub complete_extractions: i64,
    pub corrections: i64,
    pub embedded_documents: i64,
    pub embeddings_stored: i64,
    pub embedding_dimension: usize,
    pub db_path: String,
    pub db_size_mb: f64,
}
