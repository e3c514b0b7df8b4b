//! Test utilities for database and HTTP testing.
//!
//! Sets up in-memory SQLite databases with migrations applied, mints bearer
//! credentials and drives the public operations to build fixtures.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use axum::Router;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use leasegate::auth::Subject;
use leasegate::config::{AppConfig, AuthConfig, InviteConfig};
use leasegate::invites::{self, InviteSettings, IssueInviteRequest, IssuedInvite};
use leasegate::models::PropertyType;
use leasegate::server::{AppState, create_app};
use leasegate::transactions::{
    AcceptedInvite, OnboardLandlordRequest, OnboardedProperty, TransactionSettings,
    accept_invite, onboard_landlord,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::json;

pub const TEST_JWT_SECRET: &str = "integration-test-jwt-secret";

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// Foreign keys stay enforced; fixtures are built through the real
/// operations so every row has its parents.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Configuration with every secret set, as a test deployment would have.
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        auth: AuthConfig {
            jwt_secret: Some(TEST_JWT_SECRET.to_string()),
            ..Default::default()
        },
        invite: InviteConfig {
            pepper: Some(vec![7u8; 32]),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn invite_settings() -> InviteSettings {
    InviteSettings::from_config(&test_config().invite).expect("test pepper is valid")
}

pub fn tx_settings() -> TransactionSettings {
    TransactionSettings::from_config(&test_config())
}

pub fn subject(raw: &str) -> Subject {
    Subject::new(raw).expect("non-blank subject")
}

/// Signs an HS256 credential for `sub`, valid for one hour.
pub fn mint_token(sub: &str) -> String {
    let claims = json!({
        "sub": sub,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("token encodes")
}

pub fn bearer(sub: &str) -> String {
    format!("Bearer {}", mint_token(sub))
}

pub fn onboarding_request(name: &str, areas: &[&str]) -> OnboardLandlordRequest {
    OnboardLandlordRequest {
        property_name: name.to_string(),
        address: "12 Oak St".to_string(),
        property_type: PropertyType::House,
        bedrooms: 3,
        bathrooms: 2,
        area_names: areas.iter().map(|area| area.to_string()).collect(),
        display_name: None,
    }
}

/// Onboards `landlord` with one property and returns it.
pub async fn onboard(
    db: &DatabaseConnection,
    landlord: &Subject,
    property_name: &str,
) -> Result<OnboardedProperty> {
    onboard_landlord(
        db,
        &tx_settings(),
        Some(landlord),
        onboarding_request(property_name, &["Kitchen", "Bedroom"]),
        None,
    )
    .await
    .into_result()
    .map_err(|err| anyhow!("onboarding failed: {err}"))
}

/// Issues a code invite for `property_id` as `landlord`.
pub async fn issue(
    db: &DatabaseConnection,
    settings: &InviteSettings,
    landlord: &Subject,
    property_id: uuid::Uuid,
) -> Result<IssuedInvite> {
    invites::issue_invite(
        db,
        settings,
        landlord,
        property_id,
        IssueInviteRequest {
            delivery_method: Default::default(),
            intended_email: None,
            unit_label: Some("Unit A".to_string()),
        },
    )
    .await
    .map_err(|err| anyhow!("issuing invite failed: {err}"))
}

/// Redeems `secret` as `tenant`.
pub async fn redeem(
    db: &DatabaseConnection,
    settings: &InviteSettings,
    tenant: &Subject,
    secret: &str,
) -> Result<AcceptedInvite> {
    accept_invite(db, &tx_settings(), settings, Some(tenant), secret, None)
        .await
        .into_result()
        .map_err(|err| anyhow!("accepting invite failed: {err}"))
}

/// Landlord with a property and a tenant actively linked to it.
pub struct LinkedFixture {
    pub landlord: Subject,
    pub tenant: Subject,
    pub property: OnboardedProperty,
    pub link: AcceptedInvite,
}

pub async fn linked_fixture(
    db: &DatabaseConnection,
    settings: &InviteSettings,
    landlord: &str,
    tenant: &str,
) -> Result<LinkedFixture> {
    let landlord = subject(landlord);
    let tenant = subject(tenant);
    let property = onboard(db, &landlord, &format!("{} property", landlord)).await?;
    let invite = issue(db, settings, &landlord, property.property_id).await?;
    let link = redeem(db, settings, &tenant, &invite.token).await?;

    Ok(LinkedFixture {
        landlord,
        tenant,
        property,
        link,
    })
}

/// Router over a fresh in-memory database, with the given config.
pub async fn test_app_with(config: AppConfig) -> Result<(Router, AppState)> {
    let db = setup_test_db().await?;
    let state = AppState::new(config, db)?;
    Ok((create_app(state.clone()), state))
}

pub async fn test_app() -> Result<(Router, AppState)> {
    test_app_with(test_config()).await
}
