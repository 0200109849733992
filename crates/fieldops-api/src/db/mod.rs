//! # Database Persistence Layer
//!
//! Provides Postgres persistence for service requests via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, the
//! API writes every request mutation and audit entry through to
//! PostgreSQL and hydrates the in-memory store from it on startup.
//! When absent, the API operates in in-memory-only mode (suitable for
//! development and testing).
//!
//! The in-memory store stays authoritative either way; handlers read
//! from memory and write through. A write-through failure after the
//! memory apply surfaces as an internal error to the caller.

pub mod history;
pub mod requests;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    // Run embedded migrations.
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
