//! # Transition Authorizer
//!
//! The decision procedure for moving a service request between states.
//! Given the acting role, the current row snapshot, and the requested
//! change, it either rejects the call with a [`TransitionError`] or
//! produces a [`WritePlan`] for the store to apply atomically.
//!
//! The generic [`authorize`] function is the single source of truth
//! for the rule set. [`plan_assignment`] and [`plan_reopen`] are thin
//! specializations with their own documented deviations (the assign
//! path records history even without a state change; the reopen path
//! restricts the destination set).

use chrono::{DateTime, Utc};
use thiserror::Error;

use fieldops_core::{Role, TechnicianId};

use crate::plan::{Assignment, HistoryNote, Snapshot, WritePlan};
use crate::status::RequestState;

/// Comment synthesized when a request is cancelled without one.
///
/// Applied to every cancellation, whether or not a technician is
/// linked at the time.
pub const CANCELLED_DEFAULT_COMMENT: &str = "cancelled with technician assigned";

/// Comment recorded by the dedicated assign operation.
pub const ASSIGNED_COMMENT: &str = "assigned by administrator";

/// Comment recorded by the dedicated reopen operation when none given.
pub const REOPENED_DEFAULT_COMMENT: &str = "reopened by administrator";

/// A requested change, already normalized at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Requested state as a canonical token from
    /// [`normalize`](crate::status::normalize); `None` means "no
    /// requested state". Unknown tokens are rejected here, not at the
    /// normalizer, so there is one unambiguous error path.
    pub state: Option<String>,
    /// Tri-state technician field.
    pub technician: Assignment,
    /// Caller-provided comment, already trimmed.
    pub comment: Option<String>,
}

/// Outcome of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Everything requested already holds. Read-only result: no write,
    /// no history.
    NoChange,
    /// Apply this plan as one atomic unit.
    Apply(WritePlan),
}

/// Rejections produced by the authorizer and its specializations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The requested state token is not in the canonical vocabulary.
    #[error("unsupported target state: {0:?}")]
    UnsupportedState(String),

    /// A non-administrator tried to move a completed request.
    #[error("only administrators may reopen a completed request")]
    ReopenRequiresAdministrator,

    /// A technician tried to mutate a completed request.
    #[error("technicians cannot modify a completed request")]
    CompletedFrozen,

    /// Reopen was attempted on a request that is not completed.
    #[error("cannot reopen a request in state {state}")]
    NotCompleted {
        /// The request's actual current state.
        state: RequestState,
    },

    /// Reopen destination outside the permitted set.
    #[error("cannot reopen into state {0}; expected pending or in_progress")]
    UnsupportedReopenTarget(RequestState),
}

/// Trim a caller comment, treating whitespace-only as absent.
fn clean_comment(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

/// Evaluate the generic update rule set.
///
/// Decision procedure, in order:
/// 1. No-op short circuit — both fields absent-or-equal yields
///    [`Decision::NoChange`].
/// 2. Reopening gate — leaving `completed` is administrator-only.
/// 3. Frozen-completed gate — any remaining mutating attempt by a
///    technician against a completed request is rejected uniformly.
/// 4. Cancellation auto-comment — a realized transition to `cancelled`
///    without a comment gets [`CANCELLED_DEFAULT_COMMENT`].
/// 5. Plan assembly — closure timestamp follows the `completed`
///    boundary in both directions; the assignment timestamp fires only
///    on the technician null→non-null edge; the update timestamp
///    always fires.
///
/// A history note is attached only for realized state changes — a
/// technician-only change is applied silently.
pub fn authorize(
    role: Role,
    current: &Snapshot,
    request: &TransitionRequest,
    now: DateTime<Utc>,
) -> Result<Decision, TransitionError> {
    let requested = match request.state.as_deref() {
        Some(token) => Some(
            RequestState::parse(token)
                .ok_or_else(|| TransitionError::UnsupportedState(token.to_string()))?,
        ),
        None => None,
    };

    let next_state = requested.filter(|s| *s != current.state);
    let next_technician: Option<Option<TechnicianId>> = match request.technician {
        Assignment::Keep => None,
        Assignment::Clear => current.technician.is_some().then_some(None),
        Assignment::Set(id) => (current.technician != Some(id)).then_some(Some(id)),
    };

    if next_state.is_none() && next_technician.is_none() {
        return Ok(Decision::NoChange);
    }

    if current.state == RequestState::Completed {
        if next_state.is_some() && role != Role::Administrator {
            return Err(TransitionError::ReopenRequiresAdministrator);
        }
        if role == Role::Technician {
            return Err(TransitionError::CompletedFrozen);
        }
    }

    let mut comment = clean_comment(request.comment.as_deref());
    if next_state == Some(RequestState::Cancelled) && comment.is_none() {
        comment = Some(CANCELLED_DEFAULT_COMMENT.to_string());
    }

    let mut plan = WritePlan::stamped(now);
    if let Some(next) = next_state {
        plan.state = Some(next);
        if next == RequestState::Completed {
            plan.closed_at = Some(Some(now));
        } else if current.state == RequestState::Completed {
            plan.closed_at = Some(None);
        }
        plan.note = Some(HistoryNote {
            state: next,
            comment,
        });
    }
    if let Some(technician) = next_technician {
        plan.technician = Some(technician);
        if technician.is_some() && current.technician.is_none() {
            plan.assigned_at = Some(now);
        }
    }

    Ok(Decision::Apply(plan))
}

/// Build the plan for the dedicated assign-to-technician operation.
///
/// Unconditionally links the technician and stamps the assignment
/// timestamp. The state is promoted to `assigned` only from `pending`
/// or `in_review`; otherwise it is left untouched even though the
/// technician changed. The history note fires on this path even when
/// the state did not change — a deliberate difference from the
/// generic rule set.
pub fn plan_assignment(
    current: &Snapshot,
    technician: TechnicianId,
    now: DateTime<Utc>,
) -> WritePlan {
    let promote = matches!(
        current.state,
        RequestState::Pending | RequestState::InReview
    );

    let mut plan = WritePlan::stamped(now);
    plan.state = promote.then_some(RequestState::Assigned);
    plan.technician = Some(Some(technician));
    plan.assigned_at = Some(now);
    plan.note = Some(HistoryNote {
        // The note always carries `assigned`, even when the row's
        // state was left untouched.
        state: RequestState::Assigned,
        comment: Some(ASSIGNED_COMMENT.to_string()),
    });
    plan
}

/// Build the plan for the dedicated reopen operation.
///
/// The destination token is validated before the current state is
/// examined, so a malformed destination is a validation failure even
/// on a request that could not be reopened anyway. The role gate is
/// enforced by the caller's access check, not here.
pub fn plan_reopen(
    current: &Snapshot,
    destination: &str,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<WritePlan, TransitionError> {
    let dest = RequestState::parse(destination)
        .ok_or_else(|| TransitionError::UnsupportedState(destination.to_string()))?;
    if !matches!(dest, RequestState::Pending | RequestState::InProgress) {
        return Err(TransitionError::UnsupportedReopenTarget(dest));
    }
    if current.state != RequestState::Completed {
        return Err(TransitionError::NotCompleted {
            state: current.state,
        });
    }

    let mut plan = WritePlan::stamped(now);
    plan.state = Some(dest);
    plan.closed_at = Some(None);
    plan.note = Some(HistoryNote {
        state: dest,
        comment: clean_comment(comment)
            .or_else(|| Some(REOPENED_DEFAULT_COMMENT.to_string())),
    });
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::normalize;
    use fieldops_core::TechnicianId;

    fn tech(id: i64) -> TechnicianId {
        TechnicianId::new(id).unwrap()
    }

    fn snapshot(state: RequestState, technician: Option<i64>) -> Snapshot {
        Snapshot {
            state,
            technician: technician.map(tech),
        }
    }

    fn request(
        state: Option<&str>,
        technician: Assignment,
        comment: Option<&str>,
    ) -> TransitionRequest {
        TransitionRequest {
            state: normalize(state),
            technician,
            comment: comment.map(String::from),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // ── No-op short circuit ───────────────────────────────────────

    #[test]
    fn both_fields_absent_is_no_change() {
        let current = snapshot(RequestState::Assigned, Some(5));
        let decision = authorize(
            Role::Administrator,
            &current,
            &request(None, Assignment::Keep, None),
            now(),
        )
        .unwrap();
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn equal_state_and_technician_is_no_change() {
        // State and technician both equal current values.
        let current = snapshot(RequestState::Assigned, Some(5));
        let decision = authorize(
            Role::Administrator,
            &current,
            &request(Some("assigned"), Assignment::Set(tech(5)), None),
            now(),
        )
        .unwrap();
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn clear_on_already_null_technician_is_no_change() {
        let current = snapshot(RequestState::Pending, None);
        let decision = authorize(
            Role::Administrator,
            &current,
            &request(None, Assignment::Clear, None),
            now(),
        )
        .unwrap();
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn alias_spelling_still_short_circuits() {
        // "in_process" normalizes to the current state, so nothing changes.
        let current = snapshot(RequestState::InProgress, Some(5));
        let decision = authorize(
            Role::Technician,
            &current,
            &request(Some("In Process"), Assignment::Keep, None),
            now(),
        )
        .unwrap();
        assert_eq!(decision, Decision::NoChange);
    }

    // ── Unsupported target state ──────────────────────────────────

    #[test]
    fn unknown_state_token_is_rejected() {
        let current = snapshot(RequestState::Pending, None);
        let err = authorize(
            Role::Administrator,
            &current,
            &request(Some("archived"), Assignment::Keep, None),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::UnsupportedState("archived".into()));
    }

    // ── Reopening gate ────────────────────────────────────────────

    #[test]
    fn technician_cannot_leave_completed() {
        // Completed request, technician requests cancelled.
        let current = snapshot(RequestState::Completed, Some(5));
        let err = authorize(
            Role::Technician,
            &current,
            &request(Some("cancelled"), Assignment::Keep, None),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::ReopenRequiresAdministrator);
    }

    #[test]
    fn customer_cannot_leave_completed() {
        let current = snapshot(RequestState::Completed, None);
        let err = authorize(
            Role::Customer,
            &current,
            &request(Some("pending"), Assignment::Keep, None),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::ReopenRequiresAdministrator);
    }

    #[test]
    fn administrator_may_leave_completed_and_closure_clears() {
        let current = snapshot(RequestState::Completed, Some(5));
        let at = now();
        let Decision::Apply(plan) = authorize(
            Role::Administrator,
            &current,
            &request(Some("in_progress"), Assignment::Keep, None),
            at,
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        assert_eq!(plan.state, Some(RequestState::InProgress));
        assert_eq!(plan.closed_at, Some(None), "leaving completed clears closure");
        assert_eq!(plan.updated_at, at);
        assert!(plan.note.is_some());
    }

    // ── Frozen-completed gate ─────────────────────────────────────

    #[test]
    fn technician_cannot_touch_technician_field_on_completed() {
        // Uniform rule family: any mutating attempt by a technician
        // against a completed request is rejected.
        let current = snapshot(RequestState::Completed, Some(5));
        let err = authorize(
            Role::Technician,
            &current,
            &request(None, Assignment::Set(tech(9)), None),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::CompletedFrozen);
    }

    #[test]
    fn administrator_may_relink_technician_on_completed() {
        let current = snapshot(RequestState::Completed, Some(5));
        let Decision::Apply(plan) = authorize(
            Role::Administrator,
            &current,
            &request(None, Assignment::Set(tech(9)), None),
            now(),
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        assert_eq!(plan.technician, Some(Some(tech(9))));
        assert_eq!(plan.state, None);
        assert!(plan.note.is_none(), "technician-only change is silent");
    }

    // ── Cancellation auto-comment ─────────────────────────────────

    #[test]
    fn cancellation_without_comment_synthesizes_default() {
        let current = snapshot(RequestState::Assigned, Some(5));
        let Decision::Apply(plan) = authorize(
            Role::Administrator,
            &current,
            &request(Some("cancelled"), Assignment::Set(tech(5)), None),
            now(),
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        let note = plan.note.unwrap();
        assert_eq!(note.state, RequestState::Cancelled);
        assert_eq!(note.comment.as_deref(), Some(CANCELLED_DEFAULT_COMMENT));
    }

    #[test]
    fn cancellation_keeps_explicit_comment() {
        let current = snapshot(RequestState::InProgress, Some(5));
        let Decision::Apply(plan) = authorize(
            Role::Administrator,
            &current,
            &request(Some("cancelled"), Assignment::Keep, Some("  customer withdrew  ")),
            now(),
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        assert_eq!(
            plan.note.unwrap().comment.as_deref(),
            Some("customer withdrew")
        );
    }

    #[test]
    fn cancellation_default_applies_without_technician_linked() {
        // The default comment applies to every cancellation, linked
        // technician or not.
        let current = snapshot(RequestState::Pending, None);
        let Decision::Apply(plan) = authorize(
            Role::Administrator,
            &current,
            &request(Some("cancelled"), Assignment::Keep, None),
            now(),
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        assert_eq!(
            plan.note.unwrap().comment.as_deref(),
            Some(CANCELLED_DEFAULT_COMMENT)
        );
    }

    // ── Plan assembly ─────────────────────────────────────────────

    #[test]
    fn entering_completed_sets_closure_timestamp() {
        let current = snapshot(RequestState::InProgress, Some(5));
        let at = now();
        let Decision::Apply(plan) = authorize(
            Role::Technician,
            &current,
            &request(Some("completed"), Assignment::Keep, None),
            at,
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        assert_eq!(plan.closed_at, Some(Some(at)));
        assert_eq!(plan.note.unwrap().state, RequestState::Completed);
    }

    #[test]
    fn linking_from_null_sets_assignment_timestamp() {
        let current = snapshot(RequestState::Pending, None);
        let at = now();
        let Decision::Apply(plan) = authorize(
            Role::Administrator,
            &current,
            &request(None, Assignment::Set(tech(7)), None),
            at,
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        assert_eq!(plan.assigned_at, Some(at));
    }

    #[test]
    fn reassignment_between_technicians_keeps_assignment_timestamp() {
        let current = snapshot(RequestState::Assigned, Some(5));
        let Decision::Apply(plan) = authorize(
            Role::Administrator,
            &current,
            &request(None, Assignment::Set(tech(9)), None),
            now(),
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        assert_eq!(plan.assigned_at, None, "non-null to non-null edge");
        assert_eq!(plan.technician, Some(Some(tech(9))));
    }

    #[test]
    fn explicit_unlink_clears_technician_without_history() {
        let current = snapshot(RequestState::Assigned, Some(5));
        let Decision::Apply(plan) = authorize(
            Role::Administrator,
            &current,
            &request(None, Assignment::Clear, None),
            now(),
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        assert_eq!(plan.technician, Some(None));
        assert!(plan.note.is_none());
    }

    #[test]
    fn technician_may_advance_active_request() {
        let current = snapshot(RequestState::Assigned, Some(5));
        let Decision::Apply(plan) = authorize(
            Role::Technician,
            &current,
            &request(Some("in_process"), Assignment::Keep, None),
            now(),
        )
        .unwrap() else {
            panic!("expected a write-plan");
        };
        // The alias resolves to the canonical spelling before comparison.
        assert_eq!(plan.state, Some(RequestState::InProgress));
    }

    // ── Dedicated assign operation ────────────────────────────────

    #[test]
    fn assign_promotes_from_pending() {
        let current = snapshot(RequestState::Pending, None);
        let at = now();
        let plan = plan_assignment(&current, tech(5), at);
        assert_eq!(plan.state, Some(RequestState::Assigned));
        assert_eq!(plan.technician, Some(Some(tech(5))));
        assert_eq!(plan.assigned_at, Some(at));
        let note = plan.note.unwrap();
        assert_eq!(note.state, RequestState::Assigned);
        assert_eq!(note.comment.as_deref(), Some(ASSIGNED_COMMENT));
    }

    #[test]
    fn assign_promotes_from_in_review() {
        let current = snapshot(RequestState::InReview, None);
        let plan = plan_assignment(&current, tech(5), now());
        assert_eq!(plan.state, Some(RequestState::Assigned));
    }

    #[test]
    fn assign_leaves_state_alone_when_in_progress() {
        let current = snapshot(RequestState::InProgress, Some(3));
        let at = now();
        let plan = plan_assignment(&current, tech(5), at);
        assert_eq!(plan.state, None, "state untouched outside pending/in_review");
        assert_eq!(plan.technician, Some(Some(tech(5))));
        // History still fires even though the state did not change,
        // and it always carries `assigned` on this path.
        assert_eq!(plan.note.unwrap().state, RequestState::Assigned);
        // The dedicated path stamps assignment unconditionally.
        assert_eq!(plan.assigned_at, Some(at));
    }

    // ── Dedicated reopen operation ────────────────────────────────

    #[test]
    fn reopen_into_in_process_alias() {
        // Alias spelling resolved by normalize() before planning.
        let current = snapshot(RequestState::Completed, Some(5));
        let at = now();
        let token = normalize(Some("in_process")).unwrap();
        let plan = plan_reopen(&current, &token, None, at).unwrap();
        assert_eq!(plan.state, Some(RequestState::InProgress));
        assert_eq!(plan.closed_at, Some(None));
        let note = plan.note.unwrap();
        assert_eq!(note.state, RequestState::InProgress);
        assert_eq!(note.comment.as_deref(), Some(REOPENED_DEFAULT_COMMENT));
    }

    #[test]
    fn reopen_into_pending_with_comment() {
        let current = snapshot(RequestState::Completed, None);
        let plan = plan_reopen(&current, "pending", Some("parts arrived"), now()).unwrap();
        assert_eq!(plan.state, Some(RequestState::Pending));
        assert_eq!(plan.note.unwrap().comment.as_deref(), Some("parts arrived"));
    }

    #[test]
    fn reopen_rejects_non_completed_with_conflict() {
        for state in [
            RequestState::Pending,
            RequestState::InReview,
            RequestState::Assigned,
            RequestState::InProgress,
            RequestState::Cancelled,
        ] {
            let err = plan_reopen(&snapshot(state, None), "pending", None, now()).unwrap_err();
            assert_eq!(err, TransitionError::NotCompleted { state });
        }
    }

    #[test]
    fn reopen_rejects_disallowed_destination() {
        let current = snapshot(RequestState::Completed, None);
        let err = plan_reopen(&current, "cancelled", None, now()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::UnsupportedReopenTarget(RequestState::Cancelled)
        );
    }

    #[test]
    fn reopen_validates_destination_before_state() {
        // A malformed destination is a validation failure even when the
        // request is not completed.
        let current = snapshot(RequestState::Pending, None);
        let err = plan_reopen(&current, "bogus", None, now()).unwrap_err();
        assert_eq!(err, TransitionError::UnsupportedState("bogus".into()));
    }
}
