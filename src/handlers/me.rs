//! # Profile API Handler

use axum::{extract::State, response::Json};

use crate::auth::{AuthenticatedSubject, resolve_profile};
use crate::error::{ApiError, CoreError};
use crate::handlers::limit_api;
use crate::models::profile::ProfileResponse;
use crate::server::AppState;

/// Returns the caller's own profile
#[utoipa::path(
    get,
    path = "/api/v1/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller profile", body = ProfileResponse),
        (status = 401, description = "Unauthenticated", body = ApiError),
        (status = 404, description = "No profile yet; onboard or accept an invite first", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "profile"
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthenticatedSubject(subject): AuthenticatedSubject,
) -> Result<Json<ProfileResponse>, ApiError> {
    limit_api(&state, &subject).await?;

    let profile = resolve_profile(&state.db, &subject)
        .await?
        .ok_or(CoreError::NotFound("profile"))?;

    Ok(Json(profile.into()))
}
