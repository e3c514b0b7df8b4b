//! # Property API Handlers
//!
//! Reads return only rows the caller may see; a property that exists but
//! is not visible answers 404, same as one that does not exist.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedSubject;
use crate::error::{ApiError, CoreError};
use crate::handlers::limit_api;
use crate::models::property::PropertyResponse;
use crate::models::tenant_property_link::TenantLinkResponse;
use crate::repositories::{PropertyRepository, TenantLinkRepository};
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PropertiesResponse {
    pub properties: Vec<PropertyResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatePropertySettingsRequest {
    /// Whether tenants may join using the property's join code
    pub allow_code_signup: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantLinksResponse {
    pub tenants: Vec<TenantLinkResponse>,
}

/// Lists properties visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/properties",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Owned or actively linked properties", body = PropertiesResponse),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "properties"
)]
pub async fn list_properties(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
) -> Result<Json<PropertiesResponse>, ApiError> {
    limit_api(&state, &subject).await?;

    let properties = PropertyRepository::new(&state.db)
        .list_visible(&subject)
        .await?;

    Ok(Json(PropertiesResponse { properties }))
}

/// Fetches one property if visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/properties/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Property ID")),
    responses(
        (status = 200, description = "Property", body = PropertyResponse),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 404, description = "Not found or not visible", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "properties"
)]
pub async fn get_property(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path(property_id): Path<Uuid>,
) -> Result<Json<PropertyResponse>, ApiError> {
    limit_api(&state, &subject).await?;

    let property = PropertyRepository::new(&state.db)
        .get_visible(&subject, property_id)
        .await?
        .ok_or(CoreError::NotFound("property"))?;

    Ok(Json(property))
}

/// Owner updates property settings
#[utoipa::path(
    patch,
    path = "/api/v1/properties/{id}/settings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Property ID")),
    request_body = UpdatePropertySettingsRequest,
    responses(
        (status = 200, description = "Updated property", body = PropertyResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 403, description = "Caller does not own the property", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "properties"
)]
pub async fn update_property_settings(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path(property_id): Path<Uuid>,
    payload: Result<Json<UpdatePropertySettingsRequest>, JsonRejection>,
) -> Result<Json<PropertyResponse>, ApiError> {
    limit_api(&state, &subject).await?;
    let Json(request) = payload?;

    let property = PropertyRepository::new(&state.db)
        .update_settings(&subject, property_id, request.allow_code_signup)
        .await?;

    Ok(Json(property))
}

/// Lists tenant links on a property visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/properties/{id}/tenants",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Property ID")),
    responses(
        (status = 200, description = "Visible tenant links", body = TenantLinksResponse),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "properties"
)]
pub async fn list_tenants(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path(property_id): Path<Uuid>,
) -> Result<Json<TenantLinksResponse>, ApiError> {
    limit_api(&state, &subject).await?;

    let links = TenantLinkRepository::new(&state.db)
        .list_for_property(&subject, property_id)
        .await?;

    Ok(Json(TenantLinksResponse {
        tenants: links.into_iter().map(Into::into).collect(),
    }))
}

/// Owner deactivates a tenant link
#[utoipa::path(
    post,
    path = "/api/v1/properties/{id}/tenants/{link_id}/deactivate",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Property ID"),
        ("link_id" = Uuid, Path, description = "Tenant link ID")
    ),
    responses(
        (status = 200, description = "Link is inactive", body = TenantLinkResponse),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 403, description = "Caller does not own the property", body = ApiError),
        (status = 404, description = "No such link on this property", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "properties"
)]
pub async fn deactivate_tenant(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path((property_id, link_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TenantLinkResponse>, ApiError> {
    limit_api(&state, &subject).await?;

    let link = TenantLinkRepository::new(&state.db)
        .deactivate(&subject, property_id, link_id)
        .await?;

    Ok(Json(link.into()))
}
