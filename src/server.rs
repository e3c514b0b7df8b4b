//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{IdentityResolver, require_subject};
use crate::config::AppConfig;
use crate::handlers;
use crate::invites::InviteSettings;
use crate::rate_limit::RateLimiter;
use crate::repositories::SeaOrmBucketStore;
use crate::telemetry::trace_id_middleware;
use crate::transactions::TransactionSettings;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub identity: Arc<IdentityResolver>,
    pub invites: Arc<InviteSettings>,
    pub transactions: TransactionSettings,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Builds state from configuration. Rate-limit buckets live in the
    /// same database as everything else.
    pub fn new(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<Self> {
        let invites = InviteSettings::from_config(&config.invite)
            .context("Invalid invite configuration")?;
        let identity = IdentityResolver::from_config(&config.auth);
        let rate_limiter = RateLimiter::new(
            Arc::new(SeaOrmBucketStore::new(db.clone())),
            config.rate_limits.clone(),
        );

        Ok(Self {
            transactions: TransactionSettings::from_config(&config),
            config: Arc::new(config),
            db,
            identity: Arc::new(identity),
            invites: Arc::new(invites),
            rate_limiter,
        })
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/api/v1/invites/{secret}",
            get(handlers::invites::validate_invite),
        );

    let authenticated = Router::new()
        .route("/api/v1/me", get(handlers::me::get_me))
        .route(
            "/api/v1/onboarding/landlord",
            post(handlers::onboarding::onboard),
        )
        .route(
            "/api/v1/properties",
            get(handlers::properties::list_properties),
        )
        .route(
            "/api/v1/properties/{id}",
            get(handlers::properties::get_property),
        )
        .route(
            "/api/v1/properties/{id}/settings",
            patch(handlers::properties::update_property_settings),
        )
        .route(
            "/api/v1/properties/{id}/tenants",
            get(handlers::properties::list_tenants),
        )
        .route(
            "/api/v1/properties/{id}/tenants/{link_id}/deactivate",
            post(handlers::properties::deactivate_tenant),
        )
        .route(
            "/api/v1/properties/{id}/invites",
            post(handlers::invites::issue_invite).get(handlers::invites::list_invites),
        )
        .route(
            "/api/v1/properties/{id}/invites/{invite_id}/revoke",
            post(handlers::invites::revoke_invite),
        )
        .route("/api/v1/invites/accept", post(handlers::invites::accept))
        .route(
            "/api/v1/maintenance-requests",
            get(handlers::maintenance::list_requests).post(handlers::maintenance::create_request),
        )
        .route(
            "/api/v1/maintenance-requests/{id}",
            get(handlers::maintenance::get_request).patch(handlers::maintenance::update_request),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_subject));

    let cors = if state.config.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    public
        .merge(authenticated)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id_middleware))
        .layer(cors)
}

/// Starts the server and runs until `shutdown` is cancelled.
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;
    let profile = config.profile.clone();

    let state = AppState::new(config, db)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::me::get_me,
        crate::handlers::onboarding::onboard,
        crate::handlers::properties::list_properties,
        crate::handlers::properties::get_property,
        crate::handlers::properties::update_property_settings,
        crate::handlers::properties::list_tenants,
        crate::handlers::properties::deactivate_tenant,
        crate::handlers::invites::issue_invite,
        crate::handlers::invites::list_invites,
        crate::handlers::invites::revoke_invite,
        crate::handlers::invites::validate_invite,
        crate::handlers::invites::accept,
        crate::handlers::maintenance::list_requests,
        crate::handlers::maintenance::create_request,
        crate::handlers::maintenance::get_request,
        crate::handlers::maintenance::update_request,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::HealthResponse,
            crate::models::profile::ProfileResponse,
            crate::models::Role,
            crate::models::PropertyType,
            crate::models::property::PropertyResponse,
            crate::models::tenant_property_link::TenantLinkResponse,
            crate::models::DeliveryMethod,
            crate::models::MaintenanceStatus,
            crate::models::maintenance_request::MaintenanceRequestResponse,
            crate::transactions::OnboardLandlordRequest,
            crate::transactions::OnboardedProperty,
            crate::transactions::AcceptInviteRequest,
            crate::transactions::AcceptedInvite,
            crate::invites::IssueInviteRequest,
            crate::invites::IssuedInvite,
            crate::invites::InviteState,
            crate::invites::InviteSummary,
            crate::invites::InviteValidation,
            crate::invites::PropertyPublicInfo,
            crate::handlers::properties::PropertiesResponse,
            crate::handlers::properties::UpdatePropertySettingsRequest,
            crate::handlers::properties::TenantLinksResponse,
            crate::handlers::invites::InvitesResponse,
            crate::handlers::maintenance::MaintenanceRequestsResponse,
            crate::handlers::maintenance::CreateMaintenanceRequest,
            crate::handlers::maintenance::UpdateMaintenanceRequest,
        )
    ),
    modifiers(&BearerAuth),
    info(
        title = "Leasegate API",
        description = "Multi-tenant property management: onboarding, invites, tenant links and maintenance requests",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
