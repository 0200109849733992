//! Service request persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `service_requests`
//! table. Mutations are version-guarded: the UPDATE matches on both the
//! primary key and the version counter the writer read, so a lost race
//! touches zero rows and the caller reports a conflict instead of
//! overwriting.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use fieldops_core::{CustomerId, RequestId, TechnicianId};
use fieldops_state::RequestState;

use crate::db::history;
use crate::state::{HistoryEntry, ServiceRequest};

/// Insert a newly opened request.
pub async fn insert(pool: &PgPool, record: &ServiceRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO service_requests (id, customer_id, technician_id, title, description,
         priority, state, version, created_at, updated_at, assigned_at, closed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(record.id.get())
    .bind(record.customer_id.map(|c| c.get()))
    .bind(record.technician_id.map(|t| t.get()))
    .bind(&record.title)
    .bind(&record.description)
    .bind(&record.priority)
    .bind(record.state.as_str())
    .bind(record.version)
    .bind(record.created_at)
    .bind(record.updated_at)
    .bind(record.assigned_at)
    .bind(record.closed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist an applied write-plan in one transaction.
///
/// `updated` is the post-apply record from the in-memory store; its
/// mutable columns are written wholesale, guarded by the version the
/// writer read. The audit entry, when present, goes into the same
/// transaction so the row update and its history line commit or roll
/// back together.
///
/// Returns `false` if the guard matched no row (concurrent writer or
/// deleted row); nothing is committed in that case.
pub async fn apply_plan(
    pool: &PgPool,
    updated: &ServiceRequest,
    expected_version: i64,
    note: Option<&HistoryEntry>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE service_requests
         SET state = $1, technician_id = $2, assigned_at = $3, closed_at = $4,
             updated_at = $5, version = $6
         WHERE id = $7 AND version = $8",
    )
    .bind(updated.state.as_str())
    .bind(updated.technician_id.map(|t| t.get()))
    .bind(updated.assigned_at)
    .bind(updated.closed_at)
    .bind(updated.updated_at)
    .bind(updated.version)
    .bind(updated.id.get())
    .bind(expected_version)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    if let Some(entry) = note {
        history::append_tx(&mut tx, entry).await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Load all service requests into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ServiceRequest>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ServiceRequestRow>(
        "SELECT id, customer_id, technician_id, title, description, priority,
         state, version, created_at, updated_at, assigned_at, closed_at
         FROM service_requests ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_record() {
            Some(record) => records.push(record),
            None => {
                tracing::error!("skipping service request row with invalid columns during load_all");
            }
        }
    }
    Ok(records)
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ServiceRequestRow {
    id: i64,
    customer_id: Option<i64>,
    technician_id: Option<i64>,
    title: String,
    description: Option<String>,
    priority: Option<String>,
    state: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    assigned_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

impl ServiceRequestRow {
    fn into_record(self) -> Option<ServiceRequest> {
        let id = match RequestId::new(self.id) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(id = self.id, "non-positive request id in database row");
                return None;
            }
        };
        let state = match RequestState::parse(&self.state) {
            Some(state) => state,
            None => {
                tracing::warn!(
                    id = self.id,
                    state = %self.state,
                    "unknown state in database row"
                );
                return None;
            }
        };
        Some(ServiceRequest {
            id,
            customer_id: self.customer_id.and_then(|c| CustomerId::new(c).ok()),
            technician_id: self.technician_id.and_then(|t| TechnicianId::new(t).ok()),
            title: self.title,
            description: self.description,
            priority: self.priority,
            state,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            assigned_at: self.assigned_at,
            closed_at: self.closed_at,
        })
    }
}
