//! Structured validation errors shared across the stack.

use thiserror::Error;

/// Errors raised when constructing domain primitives from raw input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifier field was zero or negative.
    #[error("{field} must be a positive integer, got {value}")]
    NonPositiveId {
        /// Which identifier field was rejected.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// A role string did not name a known actor role.
    #[error("unknown role: {0:?}")]
    UnknownRole(String),
}
