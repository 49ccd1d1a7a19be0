//! Store and backend statistics.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(get_stats))
}

/// GET /stats: extraction and embedding counts, active backends.
async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = match state.store.get_stats() {
        Ok(stats) => stats,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "extractions": stats.total_extractions,
            "pending": stats.pending_extractions,
            "complete": stats.complete_extractions,
            "corrections": stats.corrections,
            "embeddedDocuments": stats.embedded_documents,
            "embeddings": stats.embeddings_stored,
            "embeddingDimension": stats.embedding_dimension,
            "dbSizeMb": stats.db_size_mb,
            "uploads": count_files_in_dir(&state.config.data_paths.uploads),
            "embedder": {
                "model": state.embedder.model_name(),
                "available": state.embedder.is_available(),
            },
            "llm": state.llm_config.to_response(),
        })),
    )
}

fn count_files_in_dir(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .count()
        })
        .unwrap_or(0)
}
