//! Net service error types.
//!
//! Every business-rule failure maps to one of the taxonomy kinds below and
//! is rejected before any state is written. Database and internal errors
//! return a generic message to clients; the real cause is logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Net service error type.
///
/// Maps to HTTP status codes:
/// - Validation: 400 Bad Request
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - InvalidState, Capacity: 409 Conflict
/// - Unavailable: 503 Service Unavailable
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The acting user lacks the role the operation requires.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    /// The external media transport is not configured.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NetError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            NetError::Validation(_) => 400,
            NetError::Forbidden(_) => 403,
            NetError::NotFound(_) => 404,
            NetError::InvalidState(_) | NetError::Capacity(_) => 409,
            NetError::Unavailable(_) => 503,
            NetError::Database(_) | NetError::Internal(_) => 500,
        }
    }

    /// Machine-readable error code returned to clients.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            NetError::Validation(_) => "VALIDATION_ERROR",
            NetError::NotFound(_) => "NOT_FOUND",
            NetError::Forbidden(_) => "FORBIDDEN",
            NetError::InvalidState(_) => "INVALID_STATE",
            NetError::Capacity(_) => "CAPACITY_EXCEEDED",
            NetError::Unavailable(_) => "UNAVAILABLE",
            NetError::Database(_) => "DATABASE_ERROR",
            NetError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Bounded label for metrics.
    #[must_use]
    pub fn error_type_label(&self) -> &'static str {
        match self {
            NetError::Validation(_) => "validation",
            NetError::NotFound(_) => "not_found",
            NetError::Forbidden(_) => "forbidden",
            NetError::InvalidState(_) => "invalid_state",
            NetError::Capacity(_) => "capacity",
            NetError::Unavailable(_) => "unavailable",
            NetError::Database(_) => "database",
            NetError::Internal(_) => "internal",
        }
    }

    /// Message safe to return to a client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            NetError::Validation(reason)
            | NetError::NotFound(reason)
            | NetError::Forbidden(reason)
            | NetError::InvalidState(reason)
            | NetError::Capacity(reason)
            | NetError::Unavailable(reason) => reason.clone(),
            NetError::Database(_) => "An internal database error occurred".to_string(),
            NetError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for NetError {
    fn into_response(self) -> Response {
        match &self {
            NetError::Database(err) => {
                tracing::error!(target: "net.database", error = %err, "Database operation failed");
            }
            NetError::Internal(err) => {
                tracing::error!(target: "net.internal", error = %err, "Internal error");
            }
            _ => {}
        }

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for NetError {
    fn from(err: sqlx::Error) -> Self {
        NetError::Database(err.to_string())
    }
}
