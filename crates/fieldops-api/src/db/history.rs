//! Request history persistence operations.
//!
//! The `request_history` table is append-only; entries are written
//! inside the same transaction as the row update they describe (see
//! [`crate::db::requests::apply_plan`]) and never modified afterwards.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use fieldops_core::RequestId;
use fieldops_state::RequestState;

use crate::state::HistoryEntry;

/// Append one audit entry within an open transaction.
pub async fn append_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry: &HistoryEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO request_history (request_id, state, comment, actor_id, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(entry.request_id.get())
    .bind(entry.state.as_str())
    .bind(&entry.comment)
    .bind(entry.actor_id)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Load the full audit log into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT request_id, state, comment, actor_id, created_at
         FROM request_history ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_entry() {
            Some(entry) => entries.push(entry),
            None => {
                tracing::error!("skipping history row with invalid columns during load_all");
            }
        }
    }
    Ok(entries)
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct HistoryRow {
    request_id: i64,
    state: String,
    comment: Option<String>,
    actor_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl HistoryRow {
    fn into_entry(self) -> Option<HistoryEntry> {
        let request_id = match RequestId::new(self.request_id) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(
                    request_id = self.request_id,
                    "non-positive request id in history row"
                );
                return None;
            }
        };
        let state = match RequestState::parse(&self.state) {
            Some(state) => state,
            None => {
                tracing::warn!(
                    request_id = self.request_id,
                    state = %self.state,
                    "unknown state in history row"
                );
                return None;
            }
        };
        Some(HistoryEntry {
            request_id,
            state,
            comment: self.comment,
            actor_id: self.actor_id,
            created_at: self.created_at,
        })
    }
}
