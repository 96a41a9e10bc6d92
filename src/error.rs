use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::service::calculator::PanelError;
use crate::service::orchestrator::OrchestratorError;

/// Errors surfaced through the HTTP API
#[derive(Debug, Error)]
pub enum AppError {
    #[error("document {0} not found")]
    DocumentNotFound(Uuid),

    #[error("document {0} has no extraction result yet")]
    DocumentNotReady(Uuid),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported file type '{mime_type}' for {file_name}")]
    UnsupportedMediaType { file_name: String, mime_type: String },
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "DOCUMENT_NOT_FOUND"),
            AppError::DocumentNotReady(_) => (StatusCode::CONFLICT, "DOCUMENT_NOT_READY"),
            AppError::Panel(PanelError::NotVerifying) => (StatusCode::CONFLICT, "NOT_VERIFYING"),
            AppError::Panel(PanelError::RowOutOfRange(_)) => (StatusCode::NOT_FOUND, "ROW_NOT_FOUND"),
            AppError::Panel(PanelError::NotRetentionRow(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NOT_RETENTION_ROW")
            }
            AppError::Orchestrator(OrchestratorError::NoFiles) => (StatusCode::BAD_REQUEST, "NO_FILES"),
            AppError::Orchestrator(OrchestratorError::Stopped) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ORCHESTRATOR_STOPPED")
            }
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            AppError::UnsupportedMediaType { .. } => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
