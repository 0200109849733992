//! # Validated JSON Extraction
//!
//! Request bodies implement [`Validate`]; handlers route their Axum
//! `Json` rejection through [`extract_validated_json`] so both JSON
//! parse failures and field-level validation failures surface as
//! structured 422 responses.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Field-level validation for deserialized request bodies.
pub trait Validate {
    /// Return `Err` with a human-readable message naming the offending
    /// field when the body is semantically invalid.
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a possibly-rejected `Json` body and run its validation.
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}
