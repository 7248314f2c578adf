//! Error types for reviewd

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use review_types::ReviewError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Engine construction error
    #[error("Engine error: {0}")]
    Engine(#[from] ReviewError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Engine refused or failed the operation
    #[error(transparent)]
    Review(#[from] ReviewError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        let ApiError::Review(error) = self else {
            return (StatusCode::BAD_REQUEST, "BAD_REQUEST");
        };
        match error {
            ReviewError::InvalidTransition { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TRANSITION")
            }
            ReviewError::ChecklistIncomplete(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CHECKLIST_INCOMPLETE")
            }
            ReviewError::ResubmissionRejected(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "RESUBMISSION_REJECTED")
            }
            ReviewError::InvalidTemplate(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TEMPLATE")
            }
            ReviewError::UnauthorizedApprover { .. } => {
                (StatusCode::FORBIDDEN, "UNAUTHORIZED_APPROVER")
            }
            ReviewError::ConcurrentModification { .. } => {
                (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION")
            }
            ReviewError::VersionAlreadyHasActiveWorkflow { .. } => {
                (StatusCode::CONFLICT, "ACTIVE_WORKFLOW_EXISTS")
            }
            ReviewError::ChecklistAlreadyAttached(_) => {
                (StatusCode::CONFLICT, "CHECKLIST_ALREADY_ATTACHED")
            }
            ReviewError::UnknownWorkflowType(_) => {
                (StatusCode::BAD_REQUEST, "UNKNOWN_WORKFLOW_TYPE")
            }
            ReviewError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            e if e.is_not_found() => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Review(ReviewError::ChecklistIncomplete(shortfall)) => {
                serde_json::to_value(shortfall).ok()
            }
            ApiError::Review(ReviewError::InvalidTransition {
                entity,
                expected,
                actual,
            }) => Some(serde_json::json!({
                "entity": entity,
                "expected": expected,
                "actual": actual,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
