//! # Caller Identity
//!
//! The identity/access layer lives upstream: the gateway authenticates
//! the caller and forwards `{id, role}` in trusted headers. This
//! module extracts that pair — it performs no credential checks of its
//! own. Per-route role gates live in the handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use fieldops_core::Role;

use crate::error::AppError;

/// Header carrying the authenticated actor's integer id.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the authenticated actor's role name.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The authenticated actor on whose behalf a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Actor id as issued by the identity layer.
    pub id: i64,
    /// Actor role; gates every lifecycle transition.
    pub role: Role,
}

impl CallerIdentity {
    /// Whether this caller is internal staff (administrator or
    /// technician).
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Reject the call unless the caller is an administrator.
    pub fn require_administrator(&self) -> Result<(), AppError> {
        if self.role != Role::Administrator {
            return Err(AppError::Forbidden(
                "administrator role required".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject the call unless the caller is staff.
    pub fn require_staff(&self) -> Result<(), AppError> {
        if !self.is_staff() {
            return Err(AppError::Forbidden(
                "administrator or technician role required".to_string(),
            ));
        }
        Ok(())
    }
}

fn header_str<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("malformed {name} header")))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id: i64 = header_str(parts, ACTOR_ID_HEADER)?
            .trim()
            .parse()
            .map_err(|_| {
                AppError::Unauthorized(format!("malformed {ACTOR_ID_HEADER} header"))
            })?;
        if id <= 0 {
            return Err(AppError::Unauthorized(format!(
                "malformed {ACTOR_ID_HEADER} header"
            )));
        }
        let role = Role::parse(header_str(parts, ACTOR_ROLE_HEADER)?.trim())
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
        Ok(CallerIdentity { id, role })
    }
}
