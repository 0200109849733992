//! # fieldops-api — Axum API Services for the FieldOps Stack
//!
//! HTTP surface for the service request lifecycle engine. The engine
//! itself (state vocabulary, normalizer, transition authorizer) lives
//! in `fieldops-state`; this crate owns the storage, the identity
//! boundary, and the wire format.
//!
//! ## API Surface
//!
//! | Route                              | Module               | Gate          |
//! |------------------------------------|----------------------|---------------|
//! | `POST /v1/requests`                | [`routes::requests`] | any caller    |
//! | `GET /v1/requests`                 | [`routes::requests`] | administrator |
//! | `GET /v1/requests/customer/:id`    | [`routes::requests`] | staff or own  |
//! | `GET /v1/requests/:id`             | [`routes::requests`] | staff or own  |
//! | `PUT /v1/requests/:id`             | [`routes::requests`] | staff         |
//! | `POST /v1/requests/:id/assign`     | [`routes::requests`] | administrator |
//! | `POST /v1/requests/:id/reopen`     | [`routes::requests`] | administrator |
//! | `GET /v1/requests/:id/history`     | [`routes::requests`] | staff or own  |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```
//!
//! Caller identity is parsed from gateway-forwarded headers by the
//! [`auth::CallerIdentity`] extractor in each handler rather than a
//! middleware layer; role gates then live next to the operations they
//! protect.
//!
//! ## OpenAPI
//!
//! Auto-generated OpenAPI spec via utoipa derive macros at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Check if metrics are enabled via the `FIELDOPS_METRICS_ENABLED` env var.
/// Defaults to `true` when the variable is absent or set to anything other than `"false"`.
fn metrics_enabled() -> bool {
    std::env::var("FIELDOPS_METRICS_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true)
}

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) and `/metrics` are mounted outside the
/// API router so they stay reachable without identity headers.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();
    let metrics_on = metrics_enabled();

    // Body size limit: 1 MiB. Request payloads here are small JSON
    // documents; anything larger is malformed or abusive.
    let mut api = Router::new()
        .merge(routes::requests::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Unauthenticated health probes — readiness checks actual service health.
    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics — Prometheus metrics scrape endpoint.
///
/// Updates domain gauges from current `AppState` on each scrape (pull
/// model), then encodes all metrics in Prometheus text format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    // Requests by state.
    let mut by_state: HashMap<&'static str, usize> = HashMap::new();
    for record in state.requests.list() {
        *by_state.entry(record.state.as_str()).or_default() += 1;
    }
    metrics.service_requests_total().reset();
    for (st, count) in &by_state {
        metrics
            .service_requests_total()
            .with_label_values(&[st])
            .set(*count as f64);
    }

    metrics
        .history_entries_total()
        .set(state.requests.history_len() as f64);

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — verifies the application is ready to serve traffic.
///
/// Checks:
/// - In-memory store is accessible (read lock acquirable).
/// - Database connection is healthy (when configured).
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let _ = state.requests.len();

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
