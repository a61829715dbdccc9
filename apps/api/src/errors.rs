use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;
use crate::sync::SyncError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid task address: {0}")]
    InvalidAddress(String),

    #[error("Session gone: {0}")]
    Gone(String),

    #[error("Analysis engine error: {0}")]
    Upstream(String),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        let message = err.to_string();
        match err {
            SyncError::Validation(_) => AppError::Validation(message),
            SyncError::InvalidAddress(_) => AppError::InvalidAddress(message),
            SyncError::UnknownIdentity(_) => AppError::Gone(message),
            SyncError::NetworkFailure { .. } => AppError::Upstream(message),
            SyncError::Session(SessionError::NoActiveSession) => AppError::NotFound(message),
            SyncError::Session(_) => AppError::Conflict(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::InvalidAddress(msg) => (StatusCode::CONFLICT, "INVALID_ADDRESS", msg),
            AppError::Gone(msg) => {
                tracing::warn!("Session lost: {msg}");
                (StatusCode::GONE, "UNKNOWN_IDENTITY", msg)
            }
            AppError::Upstream(msg) => {
                tracing::error!("Analysis engine error: {msg}");
                (StatusCode::BAD_GATEWAY, "NETWORK_FAILURE", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCall;
    use crate::models::profile::SubjectId;
    use crate::sync::ValidationError;

    fn status_of(err: SyncError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_sync_errors_map_to_statuses() {
        assert_eq!(
            status_of(ValidationError::MissingTargetRole.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SyncError::InvalidAddress("30/9".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(SyncError::UnknownIdentity(SubjectId::new("u1"))),
            StatusCode::GONE
        );
        assert_eq!(
            status_of(SyncError::NetworkFailure {
                call: EngineCall::FetchProgress,
                message: "timed out".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(SessionError::NoActiveSession.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(SessionError::AlreadyActive(SubjectId::new("u1")).into()),
            StatusCode::CONFLICT
        );
    }
}
