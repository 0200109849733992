//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps engine errors from fieldops-state and fieldops-core to HTTP
//! status codes. Returns JSON error response bodies with error code,
//! message, and details. Never exposes internal error details in
//! responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use fieldops_state::TransitionError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface. The `details` field carries additional context for 422
/// validation errors but is omitted for 500-class errors to prevent
/// information leakage.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422). Rejected before touching storage.
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (422).
    ///
    /// Normalized with `Validation` to 422 Unprocessable Entity: the
    /// client sent syntactically valid HTTP but semantically invalid
    /// content. Only malformed HTTP framing is 400.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Identity headers missing or malformed (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Role/state rule violation (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state, including a concurrent
    /// writer detected by the version counter (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned
    /// to the client.
    #[error("internal error: {0}")]
    Internal(String),

    /// Service dependency not available (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert fieldops-core validation errors to API errors.
impl From<fieldops_core::ValidationError> for AppError {
    fn from(err: fieldops_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Convert lifecycle engine errors to API errors.
///
/// Role/state rule violations are 403; the unsupported-target-state
/// rejections are 422; reopening a non-completed request is 409.
impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match &err {
            TransitionError::ReopenRequiresAdministrator | TransitionError::CompletedFrozen => {
                Self::Forbidden(err.to_string())
            }
            TransitionError::UnsupportedState(_)
            | TransitionError::UnsupportedReopenTarget(_) => Self::Validation(err.to_string()),
            TransitionError::NotCompleted { .. } => Self::Conflict(err.to_string()),
        }
    }
}

/// Convert in-memory store apply failures to API errors.
///
/// A version conflict means a concurrent writer got there first; the
/// caller should re-read and retry.
impl From<crate::state::ApplyError> for AppError {
    fn from(err: crate::state::ApplyError) -> Self {
        match &err {
            crate::state::ApplyError::NotFound(id) => {
                Self::NotFound(format!("request {id} not found"))
            }
            crate::state::ApplyError::VersionConflict { .. } => Self::Conflict(err.to_string()),
        }
    }
}

/// Storage faults are fatal for the call and never leak details.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("storage error: {err}"))
    }
}
