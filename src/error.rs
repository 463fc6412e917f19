//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::storage::StorageError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Idempotency conflict: same key with different request")]
    IdempotencyConflict,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Storage errors (501 for missing capabilities, 500 otherwise)
    #[error(transparent)]
    Storage(#[from] StorageError),

    // Server errors (5xx)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    /// HTTP status, stable error code and optional details for this error
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }
            AppError::IdempotencyConflict => (StatusCode::CONFLICT, "idempotency_conflict", None),

            AppError::Domain(domain_err) => match domain_err {
                DomainError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
                }
                DomainError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                }
                DomainError::SameAccountTransfer => {
                    (StatusCode::BAD_REQUEST, "source_destination_equal", None)
                }
                DomainError::AccountNotFound(id) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(id.clone()))
                }
                DomainError::ExpenseNotFound(id) => {
                    (StatusCode::NOT_FOUND, "expense_not_found", Some(id.clone()))
                }
                DomainError::InsufficientFunds { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "insufficient_funds",
                    Some(domain_err.to_string()),
                ),
                DomainError::OverPayment { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "over_payment",
                    Some(domain_err.to_string()),
                ),
                DomainError::OverPaymentOnRevert { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "over_payment_on_revert",
                    Some(domain_err.to_string()),
                ),
            },

            AppError::Storage(StorageError::Unsupported(what)) => (
                StatusCode::NOT_IMPLEMENTED,
                "unsupported_operation",
                Some(what.to_string()),
            ),
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.parts();

        // Server-side failures never leak their message
        let error = if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
