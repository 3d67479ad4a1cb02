//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use codeexec_sandbox::SandboxError;

/// Errors surfaced to HTTP callers. Failed executions are not errors: they
/// come back as a regular result with `success: false`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Sandbox(err) if err.is_rejection() => StatusCode::BAD_REQUEST,
            ApiError::Sandbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Error executing code");
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
