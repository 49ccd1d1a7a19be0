//! HTTP route handlers.

pub mod documents;
pub mod extract;
pub mod stats;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::pipeline::IMAGES_ROUTE;
use crate::state::AppState;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let paths = &state.config.data_paths;
    let cors = cors_layer(state.config.allowed_origin.as_deref());

    Router::new()
        .merge(extract::routes())
        .merge(documents::routes())
        .merge(stats::routes())
        .nest_service(&format!("/{}", IMAGES_ROUTE), ServeDir::new(&paths.pages))
        .nest_service("/data", ServeDir::new(&paths.tokens))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Some(Err(_)) => {
            // No allowed origin: cross-origin requests are refused.
            error!("Invalid LEDGERSCAN_ALLOWED_ORIGIN, cross-origin requests disabled");
            CorsLayer::new()
        }
        None => CorsLayer::permissive(),
    }
}

/// `{"error": message}` with `status`.
pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::routing::get;
    use tower::ServiceExt;

    async fn allow_origin_header(allowed: Option<&str>, origin: &str) -> Option<String> {
        let router: Router = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(cors_layer(allowed));
        let request = Request::builder()
            .uri("/ping")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_configured_origin_only() {
        let allowed = Some("https://compta.example");
        assert_eq!(
            allow_origin_header(allowed, "https://compta.example").await.as_deref(),
            Some("https://compta.example")
        );
        assert_eq!(allow_origin_header(allowed, "https://other.example").await, None);
    }

    #[tokio::test]
    async fn test_unset_origin_is_permissive() {
        assert_eq!(
            allow_origin_header(None, "https://other.example").await.as_deref(),
            Some("*")
        );
    }

    #[tokio::test]
    async fn test_invalid_origin_allows_nothing() {
        assert_eq!(
            allow_origin_header(Some("https://compta.example\n"), "https://compta.example").await,
            None
        );
    }
}
