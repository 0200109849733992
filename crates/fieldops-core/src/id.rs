//! # Identifier Newtypes
//!
//! Positive-integer identifiers for the three record families the
//! lifecycle engine touches: service requests, technicians, and
//! customers. Each is a distinct type with a validating constructor.
//!
//! ## Validation
//!
//! All identifiers must be strictly positive. Deserialization routes
//! through the `new()` constructor so an invalid id is rejected at the
//! wire boundary, not deep inside a handler.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Helper macro for positive-integer identifier newtypes. Serializes
/// as a bare integer; deserializes through `new()` so non-positive
/// values are rejected at deserialization time.
macro_rules! positive_id {
    ($(#[$doc:meta])* $ty:ident, $field:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $ty(i64);

        impl $ty {
            /// Construct from a raw integer, rejecting zero and negatives.
            pub fn new(raw: i64) -> Result<Self, ValidationError> {
                if raw <= 0 {
                    return Err(ValidationError::NonPositiveId {
                        field: $field,
                        value: raw,
                    });
                }
                Ok(Self(raw))
            }

            /// The underlying integer value.
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = i64::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<i64> for $ty {
            type Error = ValidationError;

            fn try_from(raw: i64) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }
    };
}

positive_id!(
    /// Identifier of a service request (ticket).
    RequestId,
    "request id"
);

positive_id!(
    /// Identifier of a technician user.
    TechnicianId,
    "technician id"
);

positive_id!(
    /// Identifier of a customer account.
    CustomerId,
    "customer id"
);
