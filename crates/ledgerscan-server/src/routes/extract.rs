//! PDF upload and extraction.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{error, info};

use super::error_response;
use crate::pipeline::{run_extraction, Upload};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/extract", post(extract))
}

/// POST /extract: multipart upload with a `file` field.
async fn extract(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> impl IntoResponse {
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        upload = Some(Upload {
                            file_name,
                            bytes: bytes.to_vec(),
                        });
                        break;
                    }
                    Err(e) => {
                        return error_response(StatusCode::BAD_REQUEST, format!("Lecture du fichier impossible: {}", e));
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Requête multipart invalide: {}", e));
            }
        }
    }

    let Some(upload) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "Aucun fichier fourni");
    };
    if upload.file_name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Nom de fichier vide");
    }

    let worker_state = state.clone();
    let result = tokio::task::spawn_blocking(move || run_extraction(&worker_state, &upload)).await;

    match result {
        Ok(Ok(outcome)) => {
            info!(
                "Extraction of {} done ({})",
                outcome.document_id,
                if outcome.reused { "reused" } else { "new" }
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "data": outcome.data,
                    "images": outcome.images,
                    "documentId": outcome.document_id,
                })),
            )
        }
        Ok(Err(e)) => {
            error!("{}: {}", e, e.cause());
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!("Extraction task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Erreur interne")
        }
    }
}
