use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// A failed question, tagged with the pipeline stage that failed. Every
/// stage depends on a remote service, so all map to 502.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),
    #[error("Answer generation failed: {0:#}")]
    Generation(anyhow::Error),
    #[error("Answer translation failed: {0:#}")]
    Translation(anyhow::Error),
}

impl ApiError {
    pub fn stage(&self) -> &'static str {
        match self {
            ApiError::Retrieval(_) => "retrieval",
            ApiError::Generation(_) => "generation",
            ApiError::Translation(_) => "translation",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        error!("{message}");
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": message, "stage": self.stage() })),
        )
            .into_response()
    }
}
