//! # Onboarding API Handler
//!
//! Landlord onboarding is rate limited with the `auth` rule, which is
//! stricter than the general API limit.

use axum::{
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::Json,
};

use crate::auth::AuthenticatedSubject;
use crate::error::ApiError;
use crate::rate_limit::RateLimitedEndpoint;
use crate::server::AppState;
use crate::transactions::{OnboardLandlordRequest, OnboardedProperty, onboard_landlord};

/// Header carrying the client-chosen onboarding idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Onboards the caller as a landlord with their first property
#[utoipa::path(
    post,
    path = "/api/v1/onboarding/landlord",
    security(("bearer_auth" = [])),
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Replays return the property created by the first call")
    ),
    request_body = OnboardLandlordRequest,
    responses(
        (status = 201, description = "Property created", body = OnboardedProperty),
        (status = 200, description = "Replay of an earlier onboarding", body = OnboardedProperty),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 409, description = "Conflicting data, nothing was written", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError),
        (status = 503, description = "Transaction failed, safe to retry", body = ApiError)
    ),
    tag = "onboarding"
)]
pub async fn onboard(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
    headers: HeaderMap,
    payload: Result<Json<OnboardLandlordRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OnboardedProperty>), ApiError> {
    state
        .rate_limiter
        .enforce(RateLimitedEndpoint::Auth, &subject.caller_key())
        .await?;

    let Json(request) = payload?;
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    let onboarded = onboard_landlord(
        &state.db,
        &state.transactions,
        Some(&subject),
        request,
        idempotency_key,
    )
    .await
    .into_result()?;

    let status = if onboarded.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(onboarded)))
}
