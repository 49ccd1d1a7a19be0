//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Paths to all LedgerScan data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
    /// Uploaded PDFs, stored as `<documentId>.pdf` (`data/uploads/`).
    pub uploads: PathBuf,
    /// Rendered page images served to the review UI (`data/pages/`).
    pub pages: PathBuf,
    /// Token dumps with bounding boxes (`data/tokens/`).
    pub tokens: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            uploads: root.join("uploads"),
            pages: root.join("pages"),
            tokens: root.join("tokens"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.db)?;
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.pages)?;
        std::fs::create_dir_all(&self.tokens)?;
        Ok(())
    }
}

/// Output format for rendered page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            other => Err(format!("unsupported image format: {}", other)),
        }
    }
}

/// Knobs for the retrieval-augmented example selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Characters per table chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of one row.
    pub chunk_overlap: usize,
    /// Number of similar documents to pull examples from.
    pub top_k_docs: usize,
    /// Rows taken from the head of each similar document.
    pub top_k_per_doc: usize,
    /// Overall cap on few-shot rows.
    pub max_examples: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            chunk_overlap: 50,
            top_k_docs: 3,
            top_k_per_doc: 3,
            max_examples: 6,
        }
    }
}

/// Top-level LedgerScan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerScanConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Single origin allowed by CORS; `None` means permissive.
    pub allowed_origin: Option<String>,
    /// Embedding model name sent to the embeddings API.
    pub embedding_model: String,
    /// Embedding dimension (1536 for text-embedding-3-small).
    pub embedding_dim: usize,
    /// Horizontal gap below which number fragments are merged.
    pub max_gap: i64,
    /// Resolution of rendered page images.
    pub render_dpi: u32,
    pub image_format: ImageFormat,
    pub retrieval: RetrievalSettings,
}

impl LedgerScanConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port: env_or("PORT", 5001),
            data_paths,
            allowed_origin: std::env::var("LEDGERSCAN_ALLOWED_ORIGIN")
                .ok()
                .filter(|o| !o.trim().is_empty()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embedding_dim: env_or("EMBEDDING_DIM", 1536),
            max_gap: env_or("LEDGERSCAN_MAX_GAP", 10),
            render_dpi: env_or("LEDGERSCAN_RENDER_DPI", 200),
            image_format: env_or("LEDGERSCAN_IMAGE_FORMAT", ImageFormat::Jpg),
            retrieval: RetrievalSettings::default(),
        })
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}
