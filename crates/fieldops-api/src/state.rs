//! # Application State
//!
//! Shared state for the API: configuration, the in-memory request
//! store, and the optional Postgres pool for write-through
//! persistence.
//!
//! The in-memory store is authoritative at runtime and hydrated from
//! the database on startup. Every mutating call goes through
//! [`RequestStore::apply`], which checks the optimistic version
//! counter and appends the audit entry under the same write lock —
//! read-decide-write-append is one atomic unit, so a concurrent writer
//! surfaces as a version conflict instead of silently overwriting.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use utoipa::ToSchema;

use fieldops_core::{CustomerId, RequestId, TechnicianId};
use fieldops_state::{RequestState, WritePlan};

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the server binds.
    pub port: u16,
}

impl AppConfig {
    /// Read configuration from `FIELDOPS_PORT` (default 8080).
    pub fn from_env() -> Self {
        let port = std::env::var("FIELDOPS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        Self { port }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// A service request (ticket) row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Immutable identifier.
    pub id: RequestId,
    /// Owning customer; set at creation, never changed by the engine.
    pub customer_id: Option<CustomerId>,
    /// Linked technician; mutated only through write-plans.
    pub technician_id: Option<TechnicianId>,
    /// Short summary supplied at creation.
    pub title: String,
    /// Free-text problem description.
    pub description: Option<String>,
    /// Opaque to the lifecycle engine; carried for the caller.
    pub priority: Option<String>,
    /// Canonical lifecycle state.
    pub state: RequestState,
    /// Optimistic version counter; bumped on every mutating write.
    pub version: i64,
    /// Immutable creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Stamped on every mutating write.
    pub updated_at: DateTime<Utc>,
    /// Stamped when the technician reference crosses null→non-null.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Non-null iff the state is `completed`.
    pub closed_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    /// Render for the API boundary, substituting the display alias.
    pub fn to_view(&self) -> ServiceRequestView {
        ServiceRequestView {
            id: self.id.get(),
            customer_id: self.customer_id.map(|c| c.get()),
            technician_id: self.technician_id.map(|t| t.get()),
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority.clone(),
            state: self.state.api_str().to_string(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            assigned_at: self.assigned_at,
            closed_at: self.closed_at,
        }
    }
}

/// External presentation of a service request.
///
/// The `state` field uses the API spelling: the store persists
/// `in_progress` but the view renders `in_process`, symmetric to the
/// normalizer at the write boundary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceRequestView {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub technician_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub state: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One realized state change in a request's audit trail. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The request this entry belongs to.
    pub request_id: RequestId,
    /// Resulting canonical state.
    pub state: RequestState,
    /// Free-text comment, possibly synthesized by the authorizer.
    pub comment: Option<String>,
    /// The acting actor, when known.
    pub actor_id: Option<i64>,
    /// Server-assigned timestamp.
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Materialize an authorizer note into an audit entry.
    pub fn from_note(
        note: &fieldops_state::HistoryNote,
        request_id: RequestId,
        actor_id: Option<i64>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            state: note.state,
            comment: note.comment.clone(),
            actor_id,
            created_at,
        }
    }

    /// Render for the API boundary, substituting the display alias.
    pub fn to_view(&self) -> HistoryEntryView {
        HistoryEntryView {
            request_id: self.request_id.get(),
            state: self.state.api_str().to_string(),
            comment: self.comment.clone(),
            actor_id: self.actor_id,
            created_at: self.created_at,
        }
    }
}

/// External presentation of a history entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryView {
    pub request_id: i64,
    pub state: String,
    pub comment: Option<String>,
    pub actor_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when opening a new request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub customer_id: Option<CustomerId>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
}

/// Failures applying a write-plan to the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No request row with that id.
    #[error("request {0} not found")]
    NotFound(i64),

    /// A concurrent writer bumped the version between read and write.
    #[error("request {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        /// The request id.
        id: i64,
        /// The version the caller read.
        expected: i64,
        /// The version actually in the store.
        found: i64,
    },
}

#[derive(Default)]
struct StoreInner {
    requests: HashMap<i64, ServiceRequest>,
    history: Vec<HistoryEntry>,
    next_id: i64,
}

/// Thread-safe in-memory request store.
///
/// Cloning shares the underlying store; the store is part of
/// `AppState`, which Axum clones per request.
#[derive(Clone, Default)]
pub struct RequestStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl RequestStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace store contents with database rows on startup.
    pub fn hydrate(&self, requests: Vec<ServiceRequest>, history: Vec<HistoryEntry>) {
        let mut inner = self.inner.write();
        inner.next_id = requests.iter().map(|r| r.id.get()).max().unwrap_or(0);
        inner.requests = requests.into_iter().map(|r| (r.id.get(), r)).collect();
        inner.history = history;
    }

    /// Open a new request in state `pending` with no technician.
    pub fn create(&self, new: NewRequest, now: DateTime<Utc>) -> ServiceRequest {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = RequestId::new(inner.next_id).expect("store counter is positive");
        let record = ServiceRequest {
            id,
            customer_id: new.customer_id,
            technician_id: None,
            title: new.title,
            description: new.description,
            priority: new.priority,
            state: RequestState::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            closed_at: None,
        };
        inner.requests.insert(id.get(), record.clone());
        record
    }

    /// Point read. Every operation re-reads; the engine never caches
    /// a row across calls.
    pub fn get(&self, id: i64) -> Option<ServiceRequest> {
        self.inner.read().requests.get(&id).cloned()
    }

    /// All requests, newest-first.
    pub fn list(&self) -> Vec<ServiceRequest> {
        let inner = self.inner.read();
        let mut all: Vec<_> = inner.requests.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }

    /// Requests belonging to one customer, newest-first.
    pub fn list_by_customer(&self, customer_id: i64) -> Vec<ServiceRequest> {
        let inner = self.inner.read();
        let mut mine: Vec<_> = inner
            .requests
            .values()
            .filter(|r| r.customer_id.map(|c| c.get()) == Some(customer_id))
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        mine
    }

    /// Audit trail for one request, newest-first.
    pub fn history_for(&self, id: i64) -> Vec<HistoryEntry> {
        let inner = self.inner.read();
        let mut entries: Vec<_> = inner
            .history
            .iter()
            .filter(|h| h.request_id.get() == id)
            .cloned()
            .collect();
        entries.reverse(); // appended in temporal order
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    /// Number of requests held.
    pub fn len(&self) -> usize {
        self.inner.read().requests.len()
    }

    /// Whether the store holds no requests.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of audit entries held, across all requests.
    pub fn history_len(&self) -> usize {
        self.inner.read().history.len()
    }

    /// Apply a write-plan atomically.
    ///
    /// The version check, the column assignments, and the history
    /// append all happen under one write lock. On version mismatch
    /// nothing is written and the caller surfaces a conflict.
    pub fn apply(
        &self,
        id: i64,
        expected_version: i64,
        plan: &WritePlan,
        actor_id: Option<i64>,
    ) -> Result<ServiceRequest, ApplyError> {
        let mut inner = self.inner.write();
        let row = match inner.requests.get_mut(&id) {
            Some(row) => row,
            None => return Err(ApplyError::NotFound(id)),
        };
        if row.version != expected_version {
            return Err(ApplyError::VersionConflict {
                id,
                expected: expected_version,
                found: row.version,
            });
        }

        if let Some(next) = plan.state {
            row.state = next;
        }
        if let Some(technician) = plan.technician {
            row.technician_id = technician;
        }
        if let Some(at) = plan.assigned_at {
            row.assigned_at = Some(at);
        }
        if let Some(closed) = plan.closed_at {
            row.closed_at = closed;
        }
        row.updated_at = plan.updated_at;
        row.version += 1;
        let updated = row.clone();

        if let Some(note) = &plan.note {
            inner
                .history
                .push(HistoryEntry::from_note(note, updated.id, actor_id, plan.updated_at));
        }

        Ok(updated)
    }
}

/// Shared application state, cloned per request by Axum.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative in-memory store.
    pub requests: RequestStore,
    /// Optional Postgres pool for write-through persistence.
    pub db_pool: Option<PgPool>,
    /// Server configuration.
    pub config: AppConfig,
}

impl AppState {
    /// In-memory-only state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State with explicit configuration and an optional pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            requests: RequestStore::new(),
            db_pool,
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldops_state::{HistoryNote, WritePlan};

    fn new_request(title: &str) -> NewRequest {
        NewRequest {
            customer_id: CustomerId::new(1).ok(),
            title: title.to_string(),
            description: None,
            priority: None,
        }
    }

    fn plan_with_state(state: RequestState, now: DateTime<Utc>) -> WritePlan {
        WritePlan {
            state: Some(state),
            technician: None,
            assigned_at: None,
            closed_at: None,
            updated_at: now,
            note: Some(HistoryNote {
                state,
                comment: None,
            }),
        }
    }

    #[test]
    fn create_assigns_sequential_ids_and_pending_state() {
        let store = RequestStore::new();
        let now = Utc::now();
        let a = store.create(new_request("first"), now);
        let b = store.create(new_request("second"), now);
        assert_eq!(a.id.get(), 1);
        assert_eq!(b.id.get(), 2);
        assert_eq!(a.state, RequestState::Pending);
        assert_eq!(a.version, 1);
        assert!(a.technician_id.is_none());
    }

    #[test]
    fn apply_bumps_version_and_records_history() {
        let store = RequestStore::new();
        let now = Utc::now();
        let created = store.create(new_request("r"), now);
        let updated = store
            .apply(
                created.id.get(),
                created.version,
                &plan_with_state(RequestState::InReview, now),
                Some(1),
            )
            .unwrap();
        assert_eq!(updated.state, RequestState::InReview);
        assert_eq!(updated.version, 2);
        let trail = store.history_for(created.id.get());
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].state, RequestState::InReview);
        assert_eq!(trail[0].actor_id, Some(1));
    }

    #[test]
    fn apply_without_note_is_silent() {
        let store = RequestStore::new();
        let now = Utc::now();
        let created = store.create(new_request("r"), now);
        let plan = WritePlan {
            state: None,
            technician: Some(TechnicianId::new(5).ok()),
            assigned_at: Some(now),
            closed_at: None,
            updated_at: now,
            note: None,
        };
        store.apply(created.id.get(), created.version, &plan, Some(1)).unwrap();
        assert!(store.history_for(created.id.get()).is_empty());
    }

    #[test]
    fn stale_version_conflicts_and_writes_nothing() {
        let store = RequestStore::new();
        let now = Utc::now();
        let created = store.create(new_request("r"), now);

        // First writer succeeds with the version it read.
        store
            .apply(
                created.id.get(),
                created.version,
                &plan_with_state(RequestState::InReview, now),
                None,
            )
            .unwrap();

        // Second writer read the same version; it must conflict.
        let err = store
            .apply(
                created.id.get(),
                created.version,
                &plan_with_state(RequestState::Cancelled, now),
                None,
            )
            .unwrap_err();
        assert_eq!(
            err,
            ApplyError::VersionConflict {
                id: created.id.get(),
                expected: 1,
                found: 2
            }
        );
        // The losing write left no trace.
        assert_eq!(
            store.get(created.id.get()).unwrap().state,
            RequestState::InReview
        );
        assert_eq!(store.history_for(created.id.get()).len(), 1);
    }

    #[test]
    fn missing_row_is_not_found() {
        let store = RequestStore::new();
        let err = store
            .apply(99, 1, &plan_with_state(RequestState::InReview, Utc::now()), None)
            .unwrap_err();
        assert_eq!(err, ApplyError::NotFound(99));
    }

    #[test]
    fn hydrate_restores_counter_past_existing_ids() {
        let store = RequestStore::new();
        let now = Utc::now();
        let row = ServiceRequest {
            id: RequestId::new(41).unwrap(),
            customer_id: None,
            technician_id: None,
            title: "hydrated".to_string(),
            description: None,
            priority: None,
            state: RequestState::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            closed_at: None,
        };
        store.hydrate(vec![row], vec![]);
        let next = store.create(new_request("fresh"), now);
        assert_eq!(next.id.get(), 42);
    }

    #[test]
    fn view_renders_display_alias() {
        let store = RequestStore::new();
        let now = Utc::now();
        let created = store.create(new_request("r"), now);
        let updated = store
            .apply(
                created.id.get(),
                created.version,
                &plan_with_state(RequestState::InProgress, now),
                None,
            )
            .unwrap();
        assert_eq!(updated.to_view().state, "in_process");
        let trail = store.history_for(created.id.get());
        assert_eq!(trail[0].to_view().state, "in_process");
    }

    #[test]
    fn list_by_customer_filters() {
        let store = RequestStore::new();
        let now = Utc::now();
        store.create(new_request("mine"), now);
        store.create(
            NewRequest {
                customer_id: CustomerId::new(2).ok(),
                title: "theirs".to_string(),
                description: None,
                priority: None,
            },
            now,
        );
        assert_eq!(store.list().len(), 2);
        let mine = store.list_by_customer(1);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "mine");
    }
}
