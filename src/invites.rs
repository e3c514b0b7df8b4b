//! # Invite Lifecycle
//!
//! Issuance, read-only validation, listing and revocation of tenant invites.
//! Redemption lives in [`crate::transactions::accept_invite`].
//!
//! A secret is 12 characters from an alphabet without look-alike glyphs.
//! The row stores an HMAC of the secret under a server pepper (to find the
//! row) and a per-row salted SHA-256 (to verify it in constant time); the
//! plaintext is returned once, at issuance, and never persisted.

use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use metrics::counter;
use rand::{Rng, RngCore, rngs::OsRng};
use regex::Regex;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::auth::Subject;
use crate::config::{ConfigError, InviteConfig, MIN_INVITE_PEPPER_LEN};
use crate::error::{CoreError, INVITE_INVALID_MESSAGE, is_unique_violation};
use crate::models::invite_token::{DeliveryMethod, Model as InviteTokenModel};
use crate::models::property::PropertyType;
use crate::policy::{self, Operation, Resource};
use crate::repositories::{InviteTokenRepository, ProfileRepository, PropertyRepository};

/// Characters used for invite secrets and property join codes.
pub const INVITE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const INVITE_SECRET_LEN: usize = 12;
pub const JOIN_CODE_LEN: usize = 8;

const SALT_LEN: usize = 16;
const MAX_UNIT_LABEL_LEN: usize = 64;
const MAX_ISSUE_ATTEMPTS: usize = 3;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .unwrap()
});

type HmacSha256 = Hmac<Sha256>;

/// Plaintext invite secret. Zeroized on drop and redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct InviteSecret(String);

impl InviteSecret {
    /// Fresh secret from the OS CSPRNG.
    pub fn generate() -> Self {
        Self(random_code(INVITE_SECRET_LEN))
    }

    /// Accepts user input case-insensitively; `None` unless it is exactly
    /// 12 characters from [`INVITE_ALPHABET`].
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        let well_formed = normalized.len() == INVITE_SECRET_LEN
            && normalized.bytes().all(|b| INVITE_ALPHABET.contains(&b));
        well_formed.then_some(Self(normalized))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for InviteSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InviteSecret([REDACTED])")
    }
}

/// Short public code printed on property materials.
pub fn generate_join_code() -> String {
    random_code(JOIN_CODE_LEN)
}

fn random_code(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

/// `SHA-256(salt ‖ secret)`
pub fn hash_secret(salt: &[u8], secret: &InviteSecret) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.expose().as_bytes());
    hasher.finalize().into()
}

/// Constant-time check of `secret` against the stored salted hash.
pub fn verify_secret(token: &InviteTokenModel, secret: &InviteSecret) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(&token.secret_salt), hex::decode(&token.secret_hash))
    else {
        tracing::warn!(invite_id = %token.id, "Invite row holds undecodable digests");
        return false;
    };
    let actual = hash_secret(&salt, secret);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

/// Server-side key for the invite lookup digest.
#[derive(Clone)]
pub struct InvitePepper {
    mac: HmacSha256,
}

impl InvitePepper {
    pub fn new(key: &[u8]) -> Result<Self, ConfigError> {
        if key.len() < MIN_INVITE_PEPPER_LEN {
            return Err(ConfigError::InvalidInvitePepperLength { length: key.len() });
        }
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|_| ConfigError::InvalidInvitePepperLength { length: key.len() })?;
        Ok(Self { mac })
    }

    /// Hex `HMAC-SHA-256(pepper, secret)`
    pub fn lookup_digest(&self, secret: &InviteSecret) -> String {
        let mut mac = self.mac.clone();
        mac.update(secret.expose().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Issuance settings shared by every request.
#[derive(Clone)]
pub struct InviteSettings {
    pepper: InvitePepper,
    ttl: TimeDelta,
    pending_ttl_minutes: u64,
}

impl InviteSettings {
    /// Without a configured pepper a random one is generated; invites then
    /// stop validating after a restart, which only the development profiles allow.
    pub fn from_config(config: &InviteConfig) -> Result<Self, ConfigError> {
        let pepper = match config.pepper {
            Some(ref bytes) => InvitePepper::new(bytes)?,
            None => {
                tracing::warn!("No invite pepper configured; using an ephemeral one");
                let mut bytes = [0u8; MIN_INVITE_PEPPER_LEN];
                OsRng.fill_bytes(&mut bytes);
                let pepper = InvitePepper::new(&bytes);
                bytes.zeroize();
                pepper?
            }
        };

        let ttl = i64::try_from(config.ttl_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or(ConfigError::InvalidInviteTtl {
                value: config.ttl_hours,
            })?;

        Ok(Self {
            pepper,
            ttl,
            pending_ttl_minutes: config.pending_ttl_minutes,
        })
    }

    pub fn pepper(&self) -> &InvitePepper {
        &self.pepper
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn pending_ttl_minutes(&self) -> u64 {
        self.pending_ttl_minutes
    }
}

/// Lifecycle state of an invite at a given instant. Expiry is evaluated lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    Issued,
    Redeemed,
    Expired,
}

impl InviteState {
    pub fn of(token: &InviteTokenModel, now: DateTime<Utc>) -> Self {
        if token.used_at.is_some() {
            InviteState::Redeemed
        } else if now >= token.expires_at {
            InviteState::Expired
        } else {
            InviteState::Issued
        }
    }
}

/// Finds the invite for `secret` and verifies its salted hash. Read-only.
pub async fn locate<C: ConnectionTrait>(
    db: &C,
    pepper: &InvitePepper,
    secret: &InviteSecret,
) -> Result<Option<InviteTokenModel>, DbErr> {
    let digest = pepper.lookup_digest(secret);
    let token = InviteTokenRepository::new(db)
        .find_by_lookup_digest(&digest)
        .await?;
    Ok(token.filter(|token| verify_secret(token, secret)))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueInviteRequest {
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    pub intended_email: Option<String>,
    pub unit_label: Option<String>,
}

/// Returned exactly once, at issuance.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedInvite {
    pub id: Uuid,
    /// Plaintext secret; not retrievable later
    #[schema(example = "K7QM2XPA9RTB")]
    pub token: String,
    pub delivery_method: DeliveryMethod,
    #[schema(value_type = String, example = "2026-01-12T12:00:00Z")]
    pub expires_at: DateTimeWithTimeZone,
    /// How long clients should keep this invite as pending state
    pub pending_ttl_minutes: u64,
}

/// Owner issues an invite for `property_id`.
pub async fn issue_invite<C: ConnectionTrait>(
    db: &C,
    settings: &InviteSettings,
    subject: &Subject,
    property_id: Uuid,
    request: IssueInviteRequest,
) -> Result<IssuedInvite, CoreError> {
    if !policy::is_allowed(db, Some(subject), Operation::Insert, Resource::Invite { property_id }).await {
        return Err(CoreError::AuthorizationDenied);
    }

    let intended_email = request
        .intended_email
        .map(|email| email.trim().to_ascii_lowercase())
        .filter(|email| !email.is_empty());
    match (&request.delivery_method, &intended_email) {
        (DeliveryMethod::Email, None) => {
            return Err(CoreError::validation(
                "intended_email",
                "An email address is required for email delivery",
            ));
        }
        (_, Some(email)) if !EMAIL_RE.is_match(email) => {
            return Err(CoreError::validation("intended_email", "Email address is invalid"));
        }
        _ => {}
    }

    let unit_label = request
        .unit_label
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty());
    if unit_label
        .as_ref()
        .is_some_and(|label| label.chars().count() > MAX_UNIT_LABEL_LEN)
    {
        return Err(CoreError::validation(
            "unit_label",
            format!("Unit label cannot exceed {MAX_UNIT_LABEL_LEN} characters"),
        ));
    }

    let owner = ProfileRepository::new(db)
        .find_by_subject(subject)
        .await?
        .ok_or(CoreError::AuthorizationDenied)?;

    let repo = InviteTokenRepository::new(db);
    for _ in 0..MAX_ISSUE_ATTEMPTS {
        let secret = InviteSecret::generate();
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let issued_at = Utc::now();
        let expires_at = issued_at + settings.ttl;
        let model = InviteTokenModel {
            id: Uuid::new_v4(),
            property_id,
            created_by: owner.id,
            lookup_digest: settings.pepper.lookup_digest(&secret),
            secret_salt: hex::encode(salt),
            secret_hash: hex::encode(hash_secret(&salt, &secret)),
            delivery_method: request.delivery_method,
            intended_email: intended_email.clone(),
            unit_label: unit_label.clone(),
            issued_at: issued_at.into(),
            expires_at: expires_at.into(),
            used_at: None,
            used_by: None,
        };

        match repo.insert(&model).await {
            Ok(()) => {
                counter!("invite_issued_total").increment(1);
                tracing::info!(
                    invite_id = %model.id,
                    property_id = %property_id,
                    delivery_method = ?model.delivery_method,
                    "Invite issued"
                );
                return Ok(IssuedInvite {
                    id: model.id,
                    token: secret.expose().to_string(),
                    delivery_method: model.delivery_method,
                    expires_at: model.expires_at,
                    pending_ttl_minutes: settings.pending_ttl_minutes,
                });
            }
            // Digest collision; draw a new secret.
            Err(err) if is_unique_violation(&err) => continue,
            Err(err) => return Err(CoreError::Database(err)),
        }
    }

    Err(CoreError::TransactionFailure {
        retryable: true,
        reason: "could not allocate a unique invite secret".to_string(),
    })
}

/// Property details disclosed to anyone holding a valid invite.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PropertyPublicInfo {
    pub name: String,
    pub address: String,
    pub property_type: PropertyType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertyPublicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl InviteValidation {
    fn invalid() -> Self {
        Self {
            valid: false,
            property: None,
            reason: Some(INVITE_INVALID_MESSAGE.to_string()),
        }
    }
}

/// Read-only check of a presented secret. Malformed, unknown, expired and
/// used secrets all produce the same answer.
pub async fn validate_invite<C: ConnectionTrait>(
    db: &C,
    settings: &InviteSettings,
    raw_secret: &str,
    now: DateTime<Utc>,
) -> Result<InviteValidation, CoreError> {
    let Some(secret) = InviteSecret::parse(raw_secret) else {
        counter!("invite_validation_total", "outcome" => "malformed").increment(1);
        return Ok(InviteValidation::invalid());
    };

    let Some(token) = locate(db, &settings.pepper, &secret).await? else {
        counter!("invite_validation_total", "outcome" => "not_found").increment(1);
        return Ok(InviteValidation::invalid());
    };

    match InviteState::of(&token, now) {
        InviteState::Issued => {}
        state => {
            let outcome = if state == InviteState::Expired { "expired" } else { "already_used" };
            counter!("invite_validation_total", "outcome" => outcome).increment(1);
            tracing::debug!(invite_id = %token.id, outcome, "Invite validation failed");
            return Ok(InviteValidation::invalid());
        }
    }

    let Some(property) = PropertyRepository::new(db).find_by_id(token.property_id).await? else {
        counter!("invite_validation_total", "outcome" => "not_found").increment(1);
        return Ok(InviteValidation::invalid());
    };

    counter!("invite_validation_total", "outcome" => "valid").increment(1);
    Ok(InviteValidation {
        valid: true,
        property: Some(PropertyPublicInfo {
            name: property.name,
            address: property.address,
            property_type: property.property_type,
        }),
        reason: None,
    })
}

/// Invite metadata shown to the owning landlord. Never includes secrets.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteSummary {
    pub id: Uuid,
    pub property_id: Uuid,
    pub delivery_method: DeliveryMethod,
    pub intended_email: Option<String>,
    pub unit_label: Option<String>,
    pub state: InviteState,
    #[schema(value_type = String)]
    pub issued_at: DateTimeWithTimeZone,
    #[schema(value_type = String)]
    pub expires_at: DateTimeWithTimeZone,
    #[schema(value_type = Option<String>)]
    pub used_at: Option<DateTimeWithTimeZone>,
}

impl InviteSummary {
    pub fn from_model(model: InviteTokenModel, now: DateTime<Utc>) -> Self {
        Self {
            state: InviteState::of(&model, now),
            id: model.id,
            property_id: model.property_id,
            delivery_method: model.delivery_method,
            intended_email: model.intended_email,
            unit_label: model.unit_label,
            issued_at: model.issued_at,
            expires_at: model.expires_at,
            used_at: model.used_at,
        }
    }
}

/// Owner lists the invites of a property. Empty when access is denied.
pub async fn list_invites<C: ConnectionTrait>(
    db: &C,
    subject: &Subject,
    property_id: Uuid,
) -> Result<Vec<InviteSummary>, CoreError> {
    if !policy::is_allowed(db, Some(subject), Operation::Select, Resource::Invite { property_id }).await {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    let invites = InviteTokenRepository::new(db)
        .list_for_property(property_id)
        .await?;
    Ok(invites
        .into_iter()
        .map(|model| InviteSummary::from_model(model, now))
        .collect())
}

/// Owner expires an unused invite immediately.
pub async fn revoke_invite<C: ConnectionTrait>(
    db: &C,
    subject: &Subject,
    property_id: Uuid,
    invite_id: Uuid,
) -> Result<InviteSummary, CoreError> {
    if !policy::is_allowed(db, Some(subject), Operation::Update, Resource::Invite { property_id }).await {
        return Err(CoreError::AuthorizationDenied);
    }

    let repo = InviteTokenRepository::new(db);
    let now = Utc::now();

    if !repo.revoke(invite_id, property_id, now.into()).await? {
        return match repo.find_by_id(invite_id).await? {
            Some(token) if token.property_id == property_id => {
                Err(CoreError::Conflict("Invite has already been redeemed".to_string()))
            }
            _ => Err(CoreError::NotFound("invite")),
        };
    }

    tracing::info!(invite_id = %invite_id, property_id = %property_id, "Invite revoked");

    let token = repo
        .find_by_id(invite_id)
        .await?
        .ok_or(CoreError::NotFound("invite"))?;
    Ok(InviteSummary::from_model(token, now))
}
