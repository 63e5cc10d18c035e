//! Error types for the gatekeeper.
//!
//! Normal authentication failures are not errors: they resolve to "no identity".
//! The types here cover collaborator faults and HTTP-facing failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Infrastructure failure reported by an authentication collaborator.
///
/// A down store is not the same as an invalid credential, so these propagate
/// instead of collapsing into an anonymous request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Credential store unavailable: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for authentication collaborators.
pub type AuthResult<T> = Result<T, AuthError>;

/// Unified error type for HTTP-facing operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication backend error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body for API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ServiceError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            ServiceError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None)
            }
            ServiceError::Database(e) => {
                // Log the actual error but don't expose internals
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            ServiceError::Auth(e) => {
                tracing::error!(error = %e, "Authentication backend failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_BACKEND_ERROR",
                    "Authentication is temporarily unavailable".to_string(),
                    None,
                )
            }
            ServiceError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Configuration error".to_string(),
                Some(msg.clone()),
            ),
            ServiceError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for HTTP-facing operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
