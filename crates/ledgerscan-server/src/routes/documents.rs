//! Stored extractions: lookup and human corrections.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info};

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/correct", patch(correct))
        .route("/documents/{id}", get(get_document))
}

#[derive(Debug, Deserialize)]
struct CorrectionRequest {
    #[serde(rename = "documentId")]
    document_id: Option<String>,
    #[serde(rename = "finalData")]
    final_data: Option<serde_json::Value>,
}

/// Missing, null, empty string and empty list all count as absent.
fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// PATCH /correct: replace a document's final rows, keeping history.
async fn correct(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CorrectionRequest>,
) -> impl IntoResponse {
    let document_id = req.document_id.filter(|id| !id.is_empty());
    let final_data = req.final_data.filter(|data| !is_blank(data));
    let (Some(document_id), Some(final_data)) = (document_id, final_data) else {
        return error_response(StatusCode::BAD_REQUEST, "documentId et finalData sont requis");
    };

    match state.store.update_extraction_with_correction(&document_id, &final_data) {
        Ok(Some(updated)) => {
            info!("Correction applied to {}", document_id);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "documentId": document_id,
                    "finalData": updated.final_data,
                    "raw": updated.raw,
                    "source": "corrected",
                    "corrections": updated.corrections,
                })),
            )
        }
        Ok(None) => {
            info!("Document {} not found", document_id);
            error_response(StatusCode::NOT_FOUND, "Document introuvable")
        }
        Err(e) => {
            error!("Correction of {} failed: {}", document_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Erreur lors de la mise à jour")
        }
    }
}

/// GET /documents/{id}: the stored extraction record.
async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_extraction(&id) {
        Ok(Some(extraction)) => (StatusCode::OK, Json(serde_json::json!(extraction))),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Document introuvable"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
