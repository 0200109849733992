//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`metrics`]: Prometheus-compatible request metrics.
//!
//! Request/response tracing uses `tower_http::trace::TraceLayer`
//! directly at router assembly (see `lib.rs`).

pub mod metrics;
