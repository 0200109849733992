//! # Actor Roles
//!
//! The three roles the identity layer can attach to a caller. The
//! lifecycle engine trusts this input — credential checks happen
//! upstream at the gateway.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Role of an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Back-office staff: triages, assigns, reopens, may change anything.
    Administrator,
    /// Field staff: works assigned requests; blocked from completed ones.
    Technician,
    /// Request owner: opens requests and reads their own records.
    Customer,
}

impl Role {
    /// The canonical string name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Technician => "technician",
            Self::Customer => "customer",
        }
    }

    /// Parse a role from its canonical name.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw {
            "administrator" => Ok(Self::Administrator),
            "technician" => Ok(Self::Technician),
            "customer" => Ok(Self::Customer),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }

    /// Whether this role is internal staff (administrator or technician).
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Administrator | Self::Technician)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_all_roles() {
        for role in [Role::Administrator, Role::Technician, Role::Customer] {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(matches!(
            Role::parse("superuser"),
            Err(ValidationError::UnknownRole(_))
        ));
    }

    #[test]
    fn staff_excludes_customer() {
        assert!(Role::Administrator.is_staff());
        assert!(Role::Technician.is_staff());
        assert!(!Role::Customer.is_staff());
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::Administrator).unwrap(),
            "\"administrator\""
        );
        let role: Role = serde_json::from_str("\"technician\"").unwrap();
        assert_eq!(role, Role::Technician);
    }
}
