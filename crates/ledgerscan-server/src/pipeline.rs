//! The extraction pipeline behind `POST /extract`.
//!
//! Everything here is blocking (PDF parsing, SQLite, HTTP calls to the
//! embedding and chat APIs); handlers run it on the blocking pool.

use std::path::Path;

use ndarray::Array1;
use thiserror::Error;
use tracing::{info, warn};

use crate::state::AppState;
use ledgerscan_core::Error;
use ledgerscan_ingest::{content_hash, create_chunks, raw_tokens, save_tokens, PageTable};
use ledgerscan_retrieval::{rank_similar_documents, select_examples};

/// URL prefix under which rendered pages are served.
pub const IMAGES_ROUTE: &str = "images_pdf";

/// An uploaded PDF.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Result of one extraction request.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub document_id: String,
    /// Rows returned by the model, or the stored rows of a known document.
    pub data: serde_json::Value,
    /// Page images relative to the server root, e.g. `images_pdf/x_page-0001.jpg`.
    pub images: Vec<String>,
    pub reused: bool,
}

/// A pipeline stage failed; the message is what the client sees.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Erreur lors de la sauvegarde du fichier")]
    Upload(#[source] Error),
    #[error("Erreur lors de l'extraction des tokens")]
    Tokens(#[source] Error),
    #[error("Erreur lors de la conversion en images")]
    Images(#[source] Error),
    #[error("Erreur lors de la lecture de l'extraction")]
    Lookup(#[source] Error),
    #[error("Erreur lors de l'insertion du placeholder")]
    Placeholder(#[source] Error),
    #[error("Erreur lors du processing LLM")]
    Llm(#[source] Error),
    #[error("Erreur lors de la mise à jour finale")]
    Completion(#[source] Error),
}

impl PipelineError {
    pub fn cause(&self) -> &Error {
        match self {
            Self::Upload(e)
            | Self::Tokens(e)
            | Self::Images(e)
            | Self::Lookup(e)
            | Self::Placeholder(e)
            | Self::Llm(e)
            | Self::Completion(e) => e,
        }
    }
}

/// Run the full extraction for one uploaded PDF.
pub fn run_extraction(state: &AppState, upload: &Upload) -> Result<ExtractionOutcome, PipelineError> {
    let paths = &state.config.data_paths;
    let document_id = content_hash(&upload.bytes);
    info!("Extracting {} as document {}", upload.file_name, document_id);

    let pdf_path = paths.uploads.join(format!("{}.pdf", document_id));
    std::fs::write(&pdf_path, &upload.bytes).map_err(|e| PipelineError::Upload(e.into()))?;

    let extracted = state
        .ingester
        .extract_file(&pdf_path)
        .map_err(PipelineError::Tokens)?;
    let tokens_path = paths.tokens.join(format!("{}.json", file_stem(&upload.file_name)));
    save_tokens(&extracted.tokens, &tokens_path).map_err(PipelineError::Tokens)?;

    let images = state
        .renderer
        .rasterize(&pdf_path, &paths.pages)
        .map_err(PipelineError::Images)?;
    let images: Vec<String> = images
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .map(|name| format!("{}/{}", IMAGES_ROUTE, name))
        .collect();
    info!("{} page images for {}", images.len(), document_id);

    let existing = state
        .store
        .get_extraction(&document_id)
        .map_err(PipelineError::Lookup)?;
    if let Some(existing) = existing.filter(|e| e.is_complete()) {
        info!("Document {} already extracted, reusing its final data", document_id);
        return Ok(ExtractionOutcome {
            document_id,
            data: existing.final_data,
            images,
            reused: true,
        });
    }

    state
        .store
        .insert_placeholder(&document_id, &upload.file_name)
        .map_err(PipelineError::Placeholder)?;

    let vectors = match embed_tables(state, &document_id, &extracted.tables) {
        Ok(vectors) => vectors,
        Err(e) => {
            warn!("Embeddings unavailable for {}: {}", document_id, e);
            Vec::new()
        }
    };
    let examples = similar_examples(state, &document_id, &vectors);
    if examples.is_empty() {
        info!("No examples available, extracting without guidance");
    } else {
        info!("Guiding extraction with {} examples", examples.len());
    }

    let raw = raw_tokens(&extracted.tokens);
    let data = ledgerscan_llm::extract_rows(
        state.llm.as_ref(),
        raw.iter().map(|t| (t.id.as_str(), t.text.as_str())),
        &examples,
    )
    .map_err(PipelineError::Llm)?;

    let raw = serde_json::to_value(&raw).map_err(|e| PipelineError::Completion(e.into()))?;
    state
        .store
        .complete_extraction(&document_id, &raw, &data)
        .map_err(PipelineError::Completion)?;

    Ok(ExtractionOutcome {
        document_id,
        data,
        images,
        reused: false,
    })
}

/// Chunk the document's tables, embed the chunks and store the vectors.
///
/// The vectors are returned even when storing them fails, so they can still
/// serve as ranking queries.
fn embed_tables(
    state: &AppState,
    document_id: &str,
    tables: &[PageTable],
) -> ledgerscan_core::Result<Vec<Array1<f32>>> {
    let settings = &state.config.retrieval;
    let chunks = create_chunks(tables, settings.chunk_size, settings.chunk_overlap)?;
    let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
    let vectors = state.embedder.embed_batch(&texts)?;
    match state.store.store_embeddings(document_id, &chunks, &vectors) {
        Ok(stored) => info!(
            "{} tables, {} chunks, {} embeddings stored for {}",
            tables.len(),
            chunks.len(),
            stored,
            document_id
        ),
        Err(e) => warn!("Could not store embeddings for {}: {}", document_id, e),
    }
    Ok(vectors)
}

/// Rows of the most similar past documents; empty on any failure.
fn similar_examples(
    state: &AppState,
    document_id: &str,
    vectors: &[Array1<f32>],
) -> Vec<serde_json::Value> {
    if vectors.is_empty() {
        return Vec::new();
    }
    let settings = &state.config.retrieval;
    let corpus = match state.store.all_embeddings() {
        Ok(corpus) => corpus,
        Err(e) => {
            warn!("Could not load stored embeddings: {}", e);
            return Vec::new();
        }
    };
    let similar = rank_similar_documents(vectors, &corpus, Some(document_id), settings.top_k_docs);
    info!("Similar documents for {}: {:?}", document_id, similar);
    select_examples(&state.store, &similar, settings.top_k_per_doc, settings.max_examples)
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document")
        .to_string()
}
