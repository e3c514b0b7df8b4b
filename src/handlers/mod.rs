//! # API Handlers
//!
//! HTTP endpoint handlers. Each handler resolves its caller, applies the
//! endpoint's rate limit and delegates to the policy-gated core.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Subject;
use crate::db;
use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::rate_limit::RateLimitedEndpoint;
use crate::server::AppState;

pub mod invites;
pub mod maintenance;
pub mod me;
pub mod onboarding;
pub mod properties;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

/// Liveness plus database reachability
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service and database are healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = ApiError)
    ),
    tag = "root"
)]
pub async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    db::health_check(&state.db).await.map_err(|err| {
        tracing::warn!(error = ?err, "Health check failed");
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Database service unavailable",
        )
    })?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

/// Applies the general API limit keyed by subject.
pub(crate) async fn limit_api(state: &AppState, subject: &Subject) -> Result<(), ApiError> {
    state
        .rate_limiter
        .enforce(RateLimitedEndpoint::Api, &subject.caller_key())
        .await?;
    Ok(())
}
