//! # Atomic Transactions
//!
//! Multi-row procedures that must commit or roll back as one unit:
//! landlord onboarding and invite redemption. Both report a
//! [`TransactionOutcome`] instead of returning early with an error, and both
//! run under a deadline after which the transaction is rolled back.

use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use tokio::time::{error::Elapsed, timeout};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Subject;
use crate::config::AppConfig;
use crate::error::{CoreError, InviteFailure, is_unique_violation};
use crate::invites::{self, InviteSecret, InviteSettings, InviteState, generate_join_code};
use crate::models::property::{Model as PropertyModel, PropertyType};
use crate::models::Role;
use crate::repositories::{
    EnsuredProfile, InviteTokenRepository, ProfileRepository, PropertyRepository,
    TenantLinkRepository,
};

const MAX_NAME_LEN: usize = 255;
const MAX_ADDRESS_LEN: usize = 500;
const MAX_AREA_NAME_LEN: usize = 100;
const MAX_DISPLAY_NAME_LEN: usize = 100;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;
const JOIN_CODE_ATTEMPTS: usize = 5;

/// Result of a transactional procedure.
#[derive(Debug)]
pub enum TransactionOutcome<T> {
    Success(T),
    Failure(CoreError),
}

impl<T> TransactionOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TransactionOutcome::Success(_))
    }

    /// Caller-safe description of the failure, if any.
    pub fn error_message(&self) -> Option<String> {
        match self {
            TransactionOutcome::Success(_) => None,
            TransactionOutcome::Failure(error) => Some(error.public_message()),
        }
    }

    pub fn into_result(self) -> Result<T, CoreError> {
        match self {
            TransactionOutcome::Success(value) => Ok(value),
            TransactionOutcome::Failure(error) => Err(error),
        }
    }
}

impl<T> From<Result<T, CoreError>> for TransactionOutcome<T> {
    fn from(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(value) => TransactionOutcome::Success(value),
            Err(error) => TransactionOutcome::Failure(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionSettings {
    pub timeout: Duration,
    pub require_areas: bool,
}

impl TransactionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.transaction_timeout_ms),
            require_areas: config.onboarding.require_areas,
        }
    }
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Commits on success, rolls back on failure or timeout.
async fn settle<T>(
    txn: DatabaseTransaction,
    result: Result<Result<T, CoreError>, Elapsed>,
    procedure: &'static str,
) -> Result<T, CoreError> {
    match result {
        Ok(Ok(value)) => {
            txn.commit().await.map_err(|err| CoreError::TransactionFailure {
                retryable: true,
                reason: format!("{procedure} commit failed: {err}"),
            })?;
            Ok(value)
        }
        Ok(Err(error)) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(procedure, error = %rollback_err, "Rollback failed");
            }
            Err(error)
        }
        Err(_) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(procedure, error = %rollback_err, "Rollback after timeout failed");
            }
            Err(CoreError::TransactionFailure {
                retryable: true,
                reason: format!("{procedure} timed out"),
            })
        }
    }
}

async fn begin(db: &DatabaseConnection, procedure: &'static str) -> Result<DatabaseTransaction, CoreError> {
    db.begin().await.map_err(|err| CoreError::TransactionFailure {
        retryable: true,
        reason: format!("{procedure} could not start: {err}"),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnboardLandlordRequest {
    #[schema(example = "Oak St Duplex")]
    pub property_name: String,
    #[schema(example = "12 Oak St")]
    pub address: String,
    pub property_type: PropertyType,
    #[schema(example = 2)]
    pub bedrooms: i32,
    #[schema(example = 1)]
    pub bathrooms: i32,
    #[serde(default)]
    #[schema(example = json!(["Kitchen", "Bathroom"]))]
    pub area_names: Vec<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnboardedProperty {
    pub property_id: Uuid,
    pub join_code: String,
    /// False when an earlier call with the same idempotency key created it
    pub created: bool,
}

struct ValidatedOnboarding {
    name: String,
    address: String,
    property_type: PropertyType,
    bedrooms: i32,
    bathrooms: i32,
    area_names: Vec<String>,
    display_name: Option<String>,
    idempotency_key: Option<String>,
}

fn validate_onboarding(
    settings: &TransactionSettings,
    request: OnboardLandlordRequest,
    idempotency_key: Option<&str>,
) -> Result<ValidatedOnboarding, CoreError> {
    let name = request.property_name.trim().to_string();
    if name.is_empty() {
        return Err(CoreError::validation("property_name", "Property name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::validation(
            "property_name",
            format!("Property name cannot exceed {MAX_NAME_LEN} characters"),
        ));
    }

    let address = request.address.trim().to_string();
    if address.is_empty() {
        return Err(CoreError::validation("address", "Address is required"));
    }
    if address.chars().count() > MAX_ADDRESS_LEN {
        return Err(CoreError::validation(
            "address",
            format!("Address cannot exceed {MAX_ADDRESS_LEN} characters"),
        ));
    }

    if request.bedrooms < 0 {
        return Err(CoreError::validation("bedrooms", "Bedrooms cannot be negative"));
    }
    if request.bathrooms < 0 {
        return Err(CoreError::validation("bathrooms", "Bathrooms cannot be negative"));
    }

    if settings.require_areas && request.area_names.is_empty() {
        return Err(CoreError::validation("area_names", "At least one area is required"));
    }
    let mut area_names = Vec::with_capacity(request.area_names.len());
    for area in request.area_names {
        let area = area.trim().to_string();
        if area.is_empty() {
            return Err(CoreError::validation("area_names", "Area names cannot be blank"));
        }
        if area.chars().count() > MAX_AREA_NAME_LEN {
            return Err(CoreError::validation(
                "area_names",
                format!("Area names cannot exceed {MAX_AREA_NAME_LEN} characters"),
            ));
        }
        area_names.push(area);
    }

    let display_name = normalize_display_name(request.display_name)?;

    let idempotency_key = idempotency_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string);
    if idempotency_key
        .as_ref()
        .is_some_and(|key| key.len() > MAX_IDEMPOTENCY_KEY_LEN)
    {
        return Err(CoreError::validation(
            "idempotency_key",
            format!("Idempotency key cannot exceed {MAX_IDEMPOTENCY_KEY_LEN} characters"),
        ));
    }

    Ok(ValidatedOnboarding {
        name,
        address,
        property_type: request.property_type,
        bedrooms: request.bedrooms,
        bathrooms: request.bathrooms,
        area_names,
        display_name,
        idempotency_key,
    })
}

fn normalize_display_name(display_name: Option<String>) -> Result<Option<String>, CoreError> {
    let display_name = display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    if display_name
        .as_ref()
        .is_some_and(|name| name.chars().count() > MAX_DISPLAY_NAME_LEN)
    {
        return Err(CoreError::validation(
            "display_name",
            format!("Display name cannot exceed {MAX_DISPLAY_NAME_LEN} characters"),
        ));
    }
    Ok(display_name)
}

/// Creates (or completes) the caller's landlord profile, their first
/// property and its areas in one transaction.
pub async fn onboard_landlord(
    db: &DatabaseConnection,
    settings: &TransactionSettings,
    subject: Option<&Subject>,
    request: OnboardLandlordRequest,
    idempotency_key: Option<&str>,
) -> TransactionOutcome<OnboardedProperty> {
    let result = run_onboarding(db, settings, subject, request, idempotency_key).await;

    let outcome = match &result {
        Ok(property) if property.created => "created",
        Ok(_) => "replayed",
        Err(CoreError::Validation { .. }) => "invalid",
        Err(_) => "failed",
    };
    counter!("onboarding_total", "outcome" => outcome).increment(1);

    match &result {
        Ok(property) => tracing::info!(
            property_id = %property.property_id,
            created = property.created,
            "Landlord onboarding committed"
        ),
        Err(error) => tracing::info!(%error, "Landlord onboarding rejected"),
    }

    result.into()
}

async fn run_onboarding(
    db: &DatabaseConnection,
    settings: &TransactionSettings,
    subject: Option<&Subject>,
    request: OnboardLandlordRequest,
    idempotency_key: Option<&str>,
) -> Result<OnboardedProperty, CoreError> {
    let subject = subject.ok_or(CoreError::Unauthenticated)?;
    let input = validate_onboarding(settings, request, idempotency_key)?;

    let txn = begin(db, "onboard_landlord").await?;
    let result = timeout(settings.timeout, onboarding_steps(&txn, subject, input)).await;
    settle(txn, result, "onboard_landlord").await
}

async fn onboarding_steps(
    txn: &DatabaseTransaction,
    subject: &Subject,
    input: ValidatedOnboarding,
) -> Result<OnboardedProperty, CoreError> {
    let owner = match ProfileRepository::new(txn)
        .ensure_with_role(subject, Role::Landlord, input.display_name)
        .await?
    {
        EnsuredProfile::Created(profile) | EnsuredProfile::Existing(profile) => profile,
        EnsuredProfile::RoleConflict(_) => {
            return Err(CoreError::validation(
                "role",
                "This account is registered as a tenant and cannot own properties",
            ));
        }
    };

    let properties = PropertyRepository::new(txn);

    if let Some(ref key) = input.idempotency_key
        && let Some(existing) = properties.find_by_idempotency_key(owner.id, key).await?
    {
        return Ok(OnboardedProperty {
            property_id: existing.id,
            join_code: existing.join_code,
            created: false,
        });
    }

    let mut join_code = None;
    for _ in 0..JOIN_CODE_ATTEMPTS {
        let candidate = generate_join_code();
        if !properties.join_code_taken(&candidate).await? {
            join_code = Some(candidate);
            break;
        }
    }
    let join_code = join_code.ok_or_else(|| CoreError::TransactionFailure {
        retryable: true,
        reason: "could not allocate a unique join code".to_string(),
    })?;

    let now = Utc::now();
    let property = PropertyModel {
        id: Uuid::new_v4(),
        owner_profile_id: owner.id,
        name: input.name,
        address: input.address,
        property_type: input.property_type,
        bedrooms: input.bedrooms,
        bathrooms: input.bathrooms,
        join_code,
        allow_code_signup: false,
        onboarding_idempotency_key: input.idempotency_key,
        created_at: now.into(),
        updated_at: now.into(),
    };

    properties
        .insert_with_areas(&property, &input.area_names)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                CoreError::Conflict("Area names must be unique within a property".to_string())
            } else {
                CoreError::Database(err)
            }
        })?;

    Ok(OnboardedProperty {
        property_id: property.id,
        join_code: property.join_code,
        created: true,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcceptInviteRequest {
    #[schema(example = "K7QM2XPA9RTB")]
    pub token: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcceptedInvite {
    pub property_id: Uuid,
    pub property_name: String,
    pub link_id: Uuid,
}

/// Redeems an invite: creates the tenant profile if needed, consumes the
/// token and links the tenant to the property, all or nothing.
pub async fn accept_invite(
    db: &DatabaseConnection,
    settings: &TransactionSettings,
    invite_settings: &InviteSettings,
    subject: Option<&Subject>,
    token_secret: &str,
    display_name: Option<String>,
) -> TransactionOutcome<AcceptedInvite> {
    let result = run_accept(db, settings, invite_settings, subject, token_secret, display_name).await;

    let outcome = match &result {
        Ok(_) => "accepted",
        Err(CoreError::Invite(failure)) => failure.kind(),
        Err(CoreError::Validation { .. }) => "invalid",
        Err(_) => "failed",
    };
    counter!("invite_redemption_total", "outcome" => outcome).increment(1);

    match &result {
        Ok(accepted) => tracing::info!(
            property_id = %accepted.property_id,
            link_id = %accepted.link_id,
            "Invite redeemed"
        ),
        Err(CoreError::Invite(failure)) => {
            tracing::info!(invite_failure = failure.kind(), "Invite redemption rejected")
        }
        Err(error) => tracing::info!(%error, "Invite redemption failed"),
    }

    result.into()
}

async fn run_accept(
    db: &DatabaseConnection,
    settings: &TransactionSettings,
    invite_settings: &InviteSettings,
    subject: Option<&Subject>,
    token_secret: &str,
    display_name: Option<String>,
) -> Result<AcceptedInvite, CoreError> {
    let subject = subject.ok_or(CoreError::Unauthenticated)?;
    let secret = InviteSecret::parse(token_secret).ok_or_else(|| {
        CoreError::validation("token", "Invite codes are 12 letters and digits")
    })?;
    let display_name = normalize_display_name(display_name)?;

    let txn = begin(db, "accept_invite").await?;
    let result = timeout(
        settings.timeout,
        accept_steps(&txn, invite_settings, subject, &secret, display_name),
    )
    .await;
    settle(txn, result, "accept_invite").await
}

async fn accept_steps(
    txn: &DatabaseTransaction,
    invite_settings: &InviteSettings,
    subject: &Subject,
    secret: &InviteSecret,
    display_name: Option<String>,
) -> Result<AcceptedInvite, CoreError> {
    let token = invites::locate(txn, invite_settings.pepper(), secret)
        .await?
        .ok_or(InviteFailure::NotFound)?;

    match InviteState::of(&token, Utc::now()) {
        InviteState::Issued => {}
        InviteState::Redeemed => return Err(InviteFailure::AlreadyUsed.into()),
        InviteState::Expired => return Err(InviteFailure::Expired.into()),
    }

    let tenant = match ProfileRepository::new(txn)
        .ensure_with_role(subject, Role::Tenant, display_name)
        .await?
    {
        EnsuredProfile::Created(profile) | EnsuredProfile::Existing(profile) => profile,
        EnsuredProfile::RoleConflict(_) => return Err(InviteFailure::RoleMismatch.into()),
    };

    let links = TenantLinkRepository::new(txn);
    if links.active_link_exists(tenant.id, token.property_id).await? {
        return Err(InviteFailure::AlreadyLinked.into());
    }

    let claimed = InviteTokenRepository::new(txn)
        .mark_redeemed(token.id, tenant.id, Utc::now().into())
        .await?;
    if !claimed {
        return Err(InviteFailure::AlreadyUsed.into());
    }

    let property = PropertyRepository::new(txn)
        .find_by_id(token.property_id)
        .await?
        .ok_or(InviteFailure::NotFound)?;

    let link = links
        .insert_active(tenant.id, property.id, token.unit_label.clone())
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                CoreError::Invite(InviteFailure::AlreadyLinked)
            } else {
                CoreError::Database(err)
            }
        })?;

    Ok(AcceptedInvite {
        property_id: property.id,
        property_name: property.name,
        link_id: link.id,
    })
}
