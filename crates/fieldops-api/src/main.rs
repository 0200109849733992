//! FieldOps API server binary.
//!
//! Initializes tracing, connects to Postgres when `DATABASE_URL` is
//! set (hydrating the in-memory store from it), and serves the Axum
//! application.

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use fieldops_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    let db_pool = match fieldops_api::db::init_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("database initialization failed: {e}");
            std::process::exit(1);
        }
    };

    let state = AppState::with_config(config.clone(), db_pool);

    if let Some(pool) = &state.db_pool {
        let requests = match fieldops_api::db::requests::load_all(pool).await {
            Ok(requests) => requests,
            Err(e) => {
                tracing::error!("failed to load service requests from database: {e}");
                std::process::exit(1);
            }
        };
        let history = match fieldops_api::db::history::load_all(pool).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("failed to load request history from database: {e}");
                std::process::exit(1);
            }
        };
        tracing::info!(
            requests = requests.len(),
            history_entries = history.len(),
            "hydrated in-memory store from database"
        );
        state.requests.hydrate(requests, history);
    }

    let app = fieldops_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("fieldops-api listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
