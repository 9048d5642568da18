//! Error types for the call scheduler

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use consultline_core::ConsultlineError;
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Call scheduler error types
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Dependency error: {0}")]
    Dependency(ConsultlineError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Scheduler is shutting down")]
    ShuttingDown,
}

impl From<ConsultlineError> for SchedulerError {
    fn from(err: ConsultlineError) -> Self {
        match err {
            ConsultlineError::Validation(msg) => Self::Validation(msg),
            ConsultlineError::NotFound(msg) => Self::SessionNotFound(msg),
            ConsultlineError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Dependency(other),
        }
    }
}

impl From<validator::ValidationErrors> for SchedulerError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SchedulerError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            SchedulerError::SessionNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            SchedulerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            SchedulerError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            SchedulerError::Dependency(inner) if inner.is_transient() => {
                tracing::warn!(code = inner.error_code(), "Dependency unavailable: {:?}", self);
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            SchedulerError::Dependency(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
