//! # Service Request API
//!
//! Handles request creation, reads, the generic lifecycle update, the
//! dedicated assign and reopen operations, and the audit history.
//!
//! Every mutating handler follows the same shape: re-read the current
//! row, let the lifecycle engine produce a write-plan, apply the plan
//! to the in-memory store under the version the handler read, then
//! write through to Postgres when a pool is configured. The engine
//! itself never touches storage.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

use fieldops_core::{CustomerId, Role, TechnicianId};
use fieldops_state::{
    authorize, normalize, plan_assignment, plan_reopen, Assignment, Decision, RequestState,
    Snapshot, TransitionRequest, WritePlan,
};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AppState, HistoryEntry, NewRequest, ServiceRequest, ServiceRequestView};

/// Request to open a new service request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRequest {
    /// Owning customer. Ignored for customer callers, who always open
    /// requests under their own identity.
    pub customer_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl Validate for CreateRequest {
    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.title.len() > 255 {
            return Err("title must not exceed 255 characters".to_string());
        }
        if let Some(priority) = &self.priority {
            if priority.len() > 64 {
                return Err("priority must not exceed 64 characters".to_string());
            }
        }
        if let Some(description) = &self.description {
            if description.len() > 4000 {
                return Err("description must not exceed 4000 characters".to_string());
            }
        }
        Ok(())
    }
}

/// Generic lifecycle update. Both fields optional; a request carrying
/// neither (or values already in effect) is a read-only no-op.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRequest {
    /// Requested state, in canonical or display spelling; casing and
    /// separator variants are accepted.
    #[serde(default)]
    pub state: Option<String>,
    /// Tri-state: absent keeps the current technician, `null` clears
    /// it, an id links that technician.
    #[serde(default, deserialize_with = "tri_state")]
    #[schema(value_type = Option<i64>, nullable)]
    pub technician_id: Option<Option<i64>>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Distinguish an absent field from an explicit `null`.
///
/// Serde only calls this when the key is present, so `default` covers
/// absence and this covers `null` vs value.
fn tri_state<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

impl Validate for UpdateRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(comment) = &self.comment {
            if comment.len() > 1000 {
                return Err("comment must not exceed 1000 characters".to_string());
            }
        }
        Ok(())
    }
}

/// Request to link a technician via the dedicated assign operation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRequest {
    pub technician_id: i64,
}

impl Validate for AssignRequest {
    fn validate(&self) -> Result<(), String> {
        if self.technician_id <= 0 {
            return Err("technician_id must be a positive integer".to_string());
        }
        Ok(())
    }
}

/// Request to reopen a completed service request.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReopenRequest {
    /// Destination state; defaults to `pending` when absent.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Validate for ReopenRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(comment) = &self.comment {
            if comment.len() > 1000 {
                return Err("comment must not exceed 1000 characters".to_string());
            }
        }
        Ok(())
    }
}

/// Build the service requests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(create_request).get(list_requests))
        .route(
            "/v1/requests/customer/:customer_id",
            get(list_customer_requests),
        )
        .route("/v1/requests/:id", get(get_request))
        .route("/v1/requests/:id", put(update_request))
        .route("/v1/requests/:id/assign", post(assign_request))
        .route("/v1/requests/:id/reopen", post(reopen_request))
        .route("/v1/requests/:id/history", get(get_history))
}

fn snapshot_of(record: &ServiceRequest) -> Snapshot {
    Snapshot {
        state: record.state,
        technician: record.technician_id,
    }
}

/// Write an applied plan through to Postgres when a pool is configured.
///
/// The in-memory apply already succeeded; a write-through failure here
/// means memory and database have diverged, so it surfaces as an
/// internal error rather than being swallowed.
async fn write_through(
    state: &AppState,
    updated: &ServiceRequest,
    expected_version: i64,
    plan: &WritePlan,
    actor_id: i64,
) -> Result<(), AppError> {
    let Some(pool) = &state.db_pool else {
        return Ok(());
    };

    let note = plan
        .note
        .as_ref()
        .map(|n| HistoryEntry::from_note(n, updated.id, Some(actor_id), plan.updated_at));

    match crate::db::requests::apply_plan(pool, updated, expected_version, note.as_ref()).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::error!(
                request_id = updated.id.get(),
                "database version guard rejected a write the memory store accepted"
            );
            Err(AppError::Internal(
                "request updated in-memory but database persist failed".to_string(),
            ))
        }
        Err(e) => {
            tracing::error!(
                request_id = updated.id.get(),
                error = %e,
                "failed to persist request update to database"
            );
            Err(AppError::Internal(
                "request updated in-memory but database persist failed".to_string(),
            ))
        }
    }
}

/// POST /v1/requests — Open a new service request.
#[utoipa::path(
    post,
    path = "/v1/requests",
    request_body = CreateRequest,
    responses(
        (status = 201, description = "Request created", body = ServiceRequestView),
        (status = 422, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn create_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<(axum::http::StatusCode, Json<ServiceRequestView>), AppError> {
    let req = extract_validated_json(body)?;

    // Customers always open requests under their own identity; staff
    // may open on a customer's behalf.
    let customer_id = match caller.role {
        Role::Customer => Some(CustomerId::new(caller.id)?),
        _ => req.customer_id.map(CustomerId::new).transpose()?,
    };

    let record = state.requests.create(
        NewRequest {
            customer_id,
            title: req.title.trim().to_string(),
            description: req.description,
            priority: req.priority,
        },
        Utc::now(),
    );

    // Persist to database (write-through). Failure is surfaced to the
    // client because the in-memory record would be lost on restart.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::requests::insert(pool, &record).await {
            tracing::error!(
                request_id = record.id.get(),
                error = %e,
                "failed to persist service request to database"
            );
            return Err(AppError::Internal(
                "request recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((axum::http::StatusCode::CREATED, Json(record.to_view())))
}

/// GET /v1/requests — List all service requests.
#[utoipa::path(
    get,
    path = "/v1/requests",
    responses(
        (status = 200, description = "All requests", body = [ServiceRequestView]),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn list_requests(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<ServiceRequestView>>, AppError> {
    caller.require_administrator()?;
    let views = state.requests.list().iter().map(|r| r.to_view()).collect();
    Ok(Json(views))
}

/// GET /v1/requests/customer/:customer_id — List one customer's requests.
#[utoipa::path(
    get,
    path = "/v1/requests/customer/{customer_id}",
    params(("customer_id" = i64, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer's requests", body = [ServiceRequestView]),
        (status = 403, description = "Customers may only list their own requests", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn list_customer_requests(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(customer_id): Path<i64>,
) -> Result<Json<Vec<ServiceRequestView>>, AppError> {
    let customer_id = CustomerId::new(customer_id)?;
    if caller.role == Role::Customer && caller.id != customer_id.get() {
        return Err(AppError::Forbidden(
            "customers may only list their own requests".to_string(),
        ));
    }
    let views = state
        .requests
        .list_by_customer(customer_id.get())
        .iter()
        .map(|r| r.to_view())
        .collect();
    Ok(Json(views))
}

/// GET /v1/requests/:id — Get one service request.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}",
    params(("id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request found", body = ServiceRequestView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn get_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<Json<ServiceRequestView>, AppError> {
    let record = state
        .requests
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    if caller.role == Role::Customer
        && record.customer_id.map(|c| c.get()) != Some(caller.id)
    {
        // 404 instead of 403 to prevent id enumeration.
        return Err(AppError::NotFound(format!("request {id} not found")));
    }

    Ok(Json(record.to_view()))
}

/// PUT /v1/requests/:id — Generic state/technician update.
#[utoipa::path(
    put,
    path = "/v1/requests/{id}",
    params(("id" = i64, Path, description = "Request ID")),
    request_body = UpdateRequest,
    responses(
        (status = 200, description = "Request updated (or already in the requested shape)", body = ServiceRequestView),
        (status = 403, description = "Role/state rule violation", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Concurrent modification", body = crate::error::ErrorBody),
        (status = 422, description = "Unsupported state token", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn update_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<ServiceRequestView>, AppError> {
    caller.require_staff()?;
    let req = extract_validated_json(body)?;

    let current = state
        .requests
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    let technician = match req.technician_id {
        None => Assignment::Keep,
        Some(None) => Assignment::Clear,
        Some(Some(raw)) => Assignment::Set(TechnicianId::new(raw)?),
    };
    let transition = TransitionRequest {
        state: normalize(req.state.as_deref()),
        technician,
        comment: req.comment,
    };

    let decision = authorize(caller.role, &snapshot_of(&current), &transition, Utc::now())?;
    let plan = match decision {
        Decision::NoChange => return Ok(Json(current.to_view())),
        Decision::Apply(plan) => plan,
    };

    let updated = state
        .requests
        .apply(id, current.version, &plan, Some(caller.id))?;
    write_through(&state, &updated, current.version, &plan, caller.id).await?;

    Ok(Json(updated.to_view()))
}

/// POST /v1/requests/:id/assign — Link a technician.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/assign",
    params(("id" = i64, Path, description = "Request ID")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Technician assigned", body = ServiceRequestView),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn assign_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<Json<ServiceRequestView>, AppError> {
    caller.require_administrator()?;
    let req = extract_validated_json(body)?;
    let technician = TechnicianId::new(req.technician_id)?;

    let current = state
        .requests
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    let plan = plan_assignment(&snapshot_of(&current), technician, Utc::now());

    let updated = state
        .requests
        .apply(id, current.version, &plan, Some(caller.id))?;
    write_through(&state, &updated, current.version, &plan, caller.id).await?;

    Ok(Json(updated.to_view()))
}

/// POST /v1/requests/:id/reopen — Reopen a completed request.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/reopen",
    params(("id" = i64, Path, description = "Request ID")),
    request_body = ReopenRequest,
    responses(
        (status = 200, description = "Request reopened", body = ServiceRequestView),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Request is not completed", body = crate::error::ErrorBody),
        (status = 422, description = "Unsupported destination state", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn reopen_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
    body: Result<Json<ReopenRequest>, JsonRejection>,
) -> Result<Json<ServiceRequestView>, AppError> {
    caller.require_administrator()?;
    let req = extract_validated_json(body)?;

    let current = state
        .requests
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    let destination = normalize(req.state.as_deref())
        .unwrap_or_else(|| RequestState::Pending.as_str().to_string());
    let plan = plan_reopen(
        &snapshot_of(&current),
        &destination,
        req.comment.as_deref(),
        Utc::now(),
    )?;

    let updated = state
        .requests
        .apply(id, current.version, &plan, Some(caller.id))?;
    write_through(&state, &updated, current.version, &plan, caller.id).await?;

    Ok(Json(updated.to_view()))
}

/// GET /v1/requests/:id/history — Audit trail for one request.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}/history",
    params(("id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "History entries, newest first", body = [crate::state::HistoryEntryView]),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn get_history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<i64>,
) -> Result<Json<Vec<crate::state::HistoryEntryView>>, AppError> {
    let record = state
        .requests
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    if caller.role == Role::Customer
        && record.customer_id.map(|c| c.get()) != Some(caller.id)
    {
        return Err(AppError::NotFound(format!("request {id} not found")));
    }

    let views = state
        .requests
        .history_for(id)
        .iter()
        .map(|h| h.to_view())
        .collect();
    Ok(Json(views))
}
