//! # Write-Plans
//!
//! The value types the authorizer consumes and produces. A
//! [`WritePlan`] is the set of column assignments to persist for one
//! call, built before any I/O occurs. The store applies a plan as one
//! atomic unit: row update and history append either both happen or
//! neither does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldops_core::TechnicianId;

use crate::status::RequestState;

/// The authorizer's view of a request row at decision time.
///
/// Re-read from the store on every call; the engine never caches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current canonical state.
    pub state: RequestState,
    /// Currently linked technician, if any.
    pub technician: Option<TechnicianId>,
}

/// Tri-state technician field of an update call.
///
/// The wire form distinguishes an absent field (keep the current
/// technician) from an explicit `null` (unlink) from an explicit id
/// (link). Collapsing these would make unlinking inexpressible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Field absent — leave the technician reference untouched.
    Keep,
    /// Explicit null — unlink the current technician.
    Clear,
    /// Explicit id — link this technician.
    Set(TechnicianId),
}

/// Audit entry to append when a plan is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryNote {
    /// The resulting canonical state recorded in the trail.
    pub state: RequestState,
    /// Free-text comment; possibly synthesized by the authorizer.
    pub comment: Option<String>,
}

/// Column assignments for one mutating call.
///
/// `None` fields are left untouched. The nested options on
/// `technician` and `closed_at` encode "set this column to NULL" as
/// `Some(None)`, mirroring the nullable columns they target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan {
    /// New canonical state, when the state actually changes. The
    /// dedicated assign path may leave this `None` while still
    /// carrying a history note.
    pub state: Option<RequestState>,
    /// Technician reference change, including explicit unlink.
    pub technician: Option<Option<TechnicianId>>,
    /// Set when the technician reference crosses the null→non-null
    /// edge (or unconditionally on the dedicated assign path).
    pub assigned_at: Option<DateTime<Utc>>,
    /// `Some(Some(t))` on entering `completed`, `Some(None)` on
    /// leaving it, `None` otherwise.
    pub closed_at: Option<Option<DateTime<Utc>>>,
    /// Always stamped when any column fires.
    pub updated_at: DateTime<Utc>,
    /// Audit entry to append in the same atomic unit, if any.
    pub note: Option<HistoryNote>,
}

impl WritePlan {
    /// A plan that touches only the update timestamp. Building block
    /// for the specializations.
    pub(crate) fn stamped(now: DateTime<Utc>) -> Self {
        Self {
            state: None,
            technician: None,
            assigned_at: None,
            closed_at: None,
            updated_at: now,
            note: None,
        }
    }

    /// Whether this plan changes the persisted canonical state.
    pub fn is_realized_transition(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamped_plan_touches_nothing_but_updated_at() {
        let now = Utc::now();
        let plan = WritePlan::stamped(now);
        assert_eq!(plan.state, None);
        assert_eq!(plan.technician, None);
        assert_eq!(plan.assigned_at, None);
        assert_eq!(plan.closed_at, None);
        assert_eq!(plan.updated_at, now);
        assert!(plan.note.is_none());
        assert!(!plan.is_realized_transition());
    }
}
