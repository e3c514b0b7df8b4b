//! # Maintenance Request API Handlers

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedSubject;
use crate::error::{ApiError, CoreError};
use crate::handlers::limit_api;
use crate::models::MaintenanceStatus;
use crate::models::maintenance_request::MaintenanceRequestResponse;
use crate::repositories::{MaintenanceRequestRepository, MaintenanceUpdate};
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRequestsResponse {
    pub requests: Vec<MaintenanceRequestResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateMaintenanceRequest {
    pub property_id: Uuid,
    #[schema(example = "Leaking kitchen tap")]
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateMaintenanceRequest {
    pub status: Option<MaintenanceStatus>,
    pub estimated_cost_cents: Option<i64>,
    pub actual_cost_cents: Option<i64>,
}

impl From<UpdateMaintenanceRequest> for MaintenanceUpdate {
    fn from(request: UpdateMaintenanceRequest) -> Self {
        Self {
            status: request.status,
            estimated_cost_cents: request.estimated_cost_cents,
            actual_cost_cents: request.actual_cost_cents,
        }
    }
}

/// Lists maintenance requests visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/maintenance-requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Visible requests, newest first", body = MaintenanceRequestsResponse),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "maintenance"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
) -> Result<Json<MaintenanceRequestsResponse>, ApiError> {
    limit_api(&state, &subject).await?;

    let requests = MaintenanceRequestRepository::new(&state.db)
        .list_visible(&subject)
        .await?;

    Ok(Json(MaintenanceRequestsResponse {
        requests: requests.into_iter().map(Into::into).collect(),
    }))
}

/// Tenant files a maintenance request
#[utoipa::path(
    post,
    path = "/api/v1/maintenance-requests",
    security(("bearer_auth" = [])),
    request_body = CreateMaintenanceRequest,
    responses(
        (status = 201, description = "Request created", body = MaintenanceRequestResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 403, description = "Caller is not an actively linked tenant", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "maintenance"
)]
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    payload: Result<Json<CreateMaintenanceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MaintenanceRequestResponse>), ApiError> {
    limit_api(&state, &subject).await?;
    let Json(request) = payload?;

    let created = MaintenanceRequestRepository::new(&state.db)
        .create(&subject, request.property_id, &request.title, request.description)
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Fetches one maintenance request if visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/maintenance-requests/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Maintenance request ID")),
    responses(
        (status = 200, description = "Request", body = MaintenanceRequestResponse),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 404, description = "Not found or not visible", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "maintenance"
)]
pub async fn get_request(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path(request_id): Path<Uuid>,
) -> Result<Json<MaintenanceRequestResponse>, ApiError> {
    limit_api(&state, &subject).await?;

    let request = MaintenanceRequestRepository::new(&state.db)
        .get_visible(&subject, request_id)
        .await?
        .ok_or(CoreError::NotFound("maintenance request"))?;

    Ok(Json(request.into()))
}

/// Owning landlord updates status or costs
#[utoipa::path(
    patch,
    path = "/api/v1/maintenance-requests/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Maintenance request ID")),
    request_body = UpdateMaintenanceRequest,
    responses(
        (status = 200, description = "Updated request", body = MaintenanceRequestResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 403, description = "Caller does not own the property", body = ApiError),
        (status = 404, description = "No such request", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "maintenance"
)]
pub async fn update_request(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path(request_id): Path<Uuid>,
    payload: Result<Json<UpdateMaintenanceRequest>, JsonRejection>,
) -> Result<Json<MaintenanceRequestResponse>, ApiError> {
    limit_api(&state, &subject).await?;
    let Json(changes) = payload?;

    let updated = MaintenanceRequestRepository::new(&state.db)
        .update(&subject, request_id, changes.into())
        .await?;

    Ok(Json(updated.into()))
}
