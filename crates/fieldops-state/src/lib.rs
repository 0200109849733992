//! # fieldops-state — Request Lifecycle Engine
//!
//! The rules governing which actor may move a service request between
//! which states, and the side effects each transition produces. This
//! crate is pure: it takes value types in and returns value types out,
//! performs no I/O, and holds no shared mutable tables. The HTTP and
//! persistence layers live in `fieldops-api`.
//!
//! ## Components
//!
//! - **Status vocabulary** ([`status`]): the six canonical states plus
//!   the single `in_process` display alias, and the pure
//!   [`normalize`](status::normalize) function that folds case,
//!   whitespace, and hyphen variants into one internal spelling.
//!
//! - **Write-plans** ([`plan`]): the column-assignment set the
//!   authorizer decides to persist for a given call, built before any
//!   I/O occurs. A plan with a [`HistoryNote`](plan::HistoryNote)
//!   produces exactly one audit entry when applied.
//!
//! - **Transition authorizer** ([`authorize`]): the decision procedure
//!   itself — no-op short circuit, reopening gate, frozen-completed
//!   gate, cancellation auto-comment, plan assembly — plus the two
//!   dedicated specializations (assign-to-technician, reopen).
//!
//! ## Design Principle
//!
//! The rule set has one source of truth. The dedicated assign and
//! reopen operations are thin specializations that share the same
//! [`WritePlan`](plan::WritePlan) output type, so the store applies
//! every path identically.

pub mod authorize;
pub mod plan;
pub mod status;

pub use authorize::{
    authorize, plan_assignment, plan_reopen, Decision, TransitionError, TransitionRequest,
};
pub use plan::{Assignment, HistoryNote, Snapshot, WritePlan};
pub use status::{normalize, RequestState};
