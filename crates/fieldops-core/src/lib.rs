//! # fieldops-core — Foundational Types
//!
//! Domain-primitive newtypes and shared error types for the FieldOps
//! stack. Identifiers are distinct types — you cannot pass a
//! [`TechnicianId`] where a [`RequestId`] is expected — and every
//! identifier validates positivity at construction time, so a zero or
//! negative id never travels past the boundary it arrived at.

pub mod error;
pub mod id;
pub mod role;

pub use error::ValidationError;
pub use id::{CustomerId, RequestId, TechnicianId};
pub use role::Role;
