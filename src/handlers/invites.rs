//! # Invite API Handlers
//!
//! Issuance, listing and revocation are owner operations under a property.
//! Validation is public and keyed by client address; acceptance runs the
//! redemption transaction.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthenticatedSubject, ClientKey};
use crate::error::ApiError;
use crate::handlers::limit_api;
use crate::invites::{
    self, InviteSummary, InviteValidation, IssueInviteRequest, IssuedInvite,
};
use crate::rate_limit::RateLimitedEndpoint;
use crate::server::AppState;
use crate::transactions::{AcceptInviteRequest, AcceptedInvite, accept_invite};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvitesResponse {
    pub invites: Vec<InviteSummary>,
}

/// Owner issues an invite for a property
#[utoipa::path(
    post,
    path = "/api/v1/properties/{id}/invites",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Property ID")),
    request_body = IssueInviteRequest,
    responses(
        (status = 201, description = "Invite issued; the token is shown only once", body = IssuedInvite),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 403, description = "Caller does not own the property", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "invites"
)]
pub async fn issue_invite(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path(property_id): Path<Uuid>,
    payload: Result<Json<IssueInviteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedInvite>), ApiError> {
    limit_api(&state, &subject).await?;
    let Json(request) = payload?;

    let issued =
        invites::issue_invite(&state.db, &state.invites, &subject, property_id, request).await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// Owner lists invites for a property
#[utoipa::path(
    get,
    path = "/api/v1/properties/{id}/invites",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Property ID")),
    responses(
        (status = 200, description = "Invites, newest first; empty when not the owner", body = InvitesResponse),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "invites"
)]
pub async fn list_invites(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path(property_id): Path<Uuid>,
) -> Result<Json<InvitesResponse>, ApiError> {
    limit_api(&state, &subject).await?;

    let invites = invites::list_invites(&state.db, &subject, property_id).await?;
    Ok(Json(InvitesResponse { invites }))
}

/// Owner revokes an unused invite
#[utoipa::path(
    post,
    path = "/api/v1/properties/{id}/invites/{invite_id}/revoke",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Property ID"),
        ("invite_id" = Uuid, Path, description = "Invite ID")
    ),
    responses(
        (status = 200, description = "Invite expired", body = InviteSummary),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 403, description = "Caller does not own the property", body = ApiError),
        (status = 404, description = "No such invite on this property", body = ApiError),
        (status = 409, description = "Invite was already redeemed", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "invites"
)]
pub async fn revoke_invite(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    Path((property_id, invite_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<InviteSummary>, ApiError> {
    limit_api(&state, &subject).await?;

    let summary = invites::revoke_invite(&state.db, &subject, property_id, invite_id).await?;
    Ok(Json(summary))
}

/// Checks an invite code without consuming it
#[utoipa::path(
    get,
    path = "/api/v1/invites/{secret}",
    params(("secret" = String, Path, description = "Invite code")),
    responses(
        (status = 200, description = "Validation result; invalid codes carry a generic reason", body = InviteValidation),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "invites"
)]
pub async fn validate_invite(
    State(state): State<AppState>,
    client: ClientKey,
    Path(secret): Path<String>,
) -> Result<Json<InviteValidation>, ApiError> {
    state
        .rate_limiter
        .enforce(RateLimitedEndpoint::InviteValidation, &client.0)
        .await?;

    let validation = invites::validate_invite(&state.db, &state.invites, &secret, Utc::now()).await?;
    Ok(Json(validation))
}

/// Redeems an invite for the caller
#[utoipa::path(
    post,
    path = "/api/v1/invites/accept",
    security(("bearer_auth" = [])),
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Caller is now linked to the property", body = AcceptedInvite),
        (status = 400, description = "Invite invalid or request malformed", body = ApiError),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError),
        (status = 503, description = "Transaction failed, safe to retry", body = ApiError)
    ),
    tag = "invites"
)]
pub async fn accept(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    payload: Result<Json<AcceptInviteRequest>, JsonRejection>,
) -> Result<Json<AcceptedInvite>, ApiError> {
    state
        .rate_limiter
        .enforce(RateLimitedEndpoint::InviteAccept, &subject.caller_key())
        .await?;
    let Json(request) = payload?;

    let accepted = accept_invite(
        &state.db,
        &state.transactions,
        &state.invites,
        Some(&subject),
        &request.token,
        request.display_name,
    )
    .await
    .into_result()?;

    Ok(Json(accepted))
}
