//! API error type and its HTTP mapping.
//!
//! Client errors carry the underlying message; server errors are logged and
//! answered with a generic message so internals do not leak.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::ChainError;
use crate::db::StoreError;
use crate::verification::VerificationError;

#[derive(Debug, Error)]
pub enum ApiError {
    // 400
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // 401
    #[error("Authentication required")]
    Unauthorized,

    // 404
    #[error("{0} not found")]
    NotFound(String),

    // 409
    #[error("{0}")]
    Conflict(String),

    // 502
    #[error("Blockchain error: {0}")]
    Chain(String),

    // 500
    #[error("Database error: {0}")]
    Database(String),

    // 500
    #[error("Internal error: {0}")]
    Internal(String),

    // 503
    #[error("Blockchain not available: {0}")]
    ChainUnavailable(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Chain(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ChainUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Chain(_) => "CHAIN_ERROR",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::ChainUnavailable(_) => "CHAIN_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Database(detail) => {
                tracing::error!(error = %detail, "Database error");
                "Database error occurred".to_string()
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                "Internal error occurred".to_string()
            }
            ApiError::Chain(detail) => {
                tracing::error!(error = %detail, "Blockchain error");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            error: message,
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(what) => ApiError::NotFound(what),
            StoreError::InvalidTransition { .. } | StoreError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::NotAvailable(reason) => ApiError::ChainUnavailable(reason),
            other => ApiError::Chain(other.to_string()),
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::NotFound(id) => ApiError::NotFound(format!("donation {}", id)),
            VerificationError::ChainSubmission(e) => e.into(),
            VerificationError::LedgerWrite(e) => ApiError::Database(e.to_string()),
            VerificationError::Store(e) => e.into(),
        }
    }
}
