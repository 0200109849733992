//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec.
//! Serves at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
///
/// Registers all utoipa-documented routes, schemas, and tags. Serves
/// as the single source of truth for integrators.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "FieldOps API — Service Request Lifecycle",
        version = "0.3.2",
        description = "Field service request lifecycle and authorization engine.\n\nProvides:\n- **Service request** creation and reads, scoped by caller role\n- **Generic lifecycle updates** (state and technician) gated by role/state rules\n- **Dedicated assign and reopen** operations for administrators\n- **Audit history** of realized state changes per request\n\nIdentity: the trusted gateway forwards the caller in `x-actor-id` and `x-actor-role` headers. All `/v1/*` endpoints require them. Health probes (`/health/*`) and `/metrics` are unauthenticated.",
        license(name = "Apache-2.0"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        crate::routes::requests::create_request,
        crate::routes::requests::list_requests,
        crate::routes::requests::list_customer_requests,
        crate::routes::requests::get_request,
        crate::routes::requests::update_request,
        crate::routes::requests::assign_request,
        crate::routes::requests::reopen_request,
        crate::routes::requests::get_history,
    ),
    components(
        schemas(
            crate::state::ServiceRequestView,
            crate::state::HistoryEntryView,
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::requests::CreateRequest,
            crate::routes::requests::UpdateRequest,
            crate::routes::requests::AssignRequest,
            crate::routes::requests::ReopenRequest,
        ),
    ),
    tags(
        (name = "requests", description = "Service request lifecycle — creation, reads, updates, assignment, reopening, audit history"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
///
/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
