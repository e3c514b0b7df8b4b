//! # Row-level Policy
//!
//! Three fixed predicates over (subject, target row) and the compositions
//! that gate each operation on each resource. Predicates only read, never
//! cache across calls, and fail closed: a missing subject, a missing
//! profile or any storage error evaluates to `false`.

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::auth::Subject;
use crate::models::{Property, Role, TenantPropertyLink, profile, property, tenant_property_link};
use crate::repositories::ProfileRepository;

/// Kind of row access a composed check gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Row being accessed, described by the foreign keys the predicates need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Property {
        property_id: Uuid,
    },
    TenantLink {
        tenant_profile_id: Uuid,
        property_id: Uuid,
    },
    MaintenanceRequest {
        tenant_profile_id: Uuid,
        property_id: Uuid,
    },
    Invite {
        property_id: Uuid,
    },
}

impl Resource {
    fn kind(&self) -> &'static str {
        match self {
            Resource::Property { .. } => "property",
            Resource::TenantLink { .. } => "tenant_link",
            Resource::MaintenanceRequest { .. } => "maintenance_request",
            Resource::Invite { .. } => "invite",
        }
    }
}

/// True when the subject's profile is the tenant profile `profile_id`.
pub async fn is_self<C: ConnectionTrait>(
    db: &C,
    subject: Option<&Subject>,
    profile_id: Uuid,
) -> bool {
    match profile_for(db, subject).await {
        Some(profile) => profile.id == profile_id && profile.role == Role::Tenant,
        None => false,
    }
}

/// True when the subject is a landlord owning `property_id`.
pub async fn owns_property<C: ConnectionTrait>(
    db: &C,
    subject: Option<&Subject>,
    property_id: Uuid,
) -> bool {
    let Some(profile) = profile_for(db, subject).await else {
        return false;
    };
    if profile.role != Role::Landlord {
        return false;
    }

    let owned = Property::find_by_id(property_id)
        .filter(property::Column::OwnerProfileId.eq(profile.id))
        .count(db)
        .await;

    fail_closed("owns_property", owned.map(|count| count > 0))
}

/// True when the subject is a tenant with an active link to `property_id`.
pub async fn has_active_link<C: ConnectionTrait>(
    db: &C,
    subject: Option<&Subject>,
    property_id: Uuid,
) -> bool {
    let Some(profile) = profile_for(db, subject).await else {
        return false;
    };
    if profile.role != Role::Tenant {
        return false;
    }

    let linked = TenantPropertyLink::find()
        .filter(tenant_property_link::Column::TenantProfileId.eq(profile.id))
        .filter(tenant_property_link::Column::PropertyId.eq(property_id))
        .filter(tenant_property_link::Column::Active.eq(true))
        .count(db)
        .await;

    fail_closed("has_active_link", linked.map(|count| count > 0))
}

/// Evaluates the composition gating `operation` on `resource`.
pub async fn is_allowed<C: ConnectionTrait>(
    db: &C,
    subject: Option<&Subject>,
    operation: Operation,
    resource: Resource,
) -> bool {
    if subject.is_none() {
        return false;
    }

    let allowed = match (resource, operation) {
        (Resource::Property { property_id }, Operation::Select) => {
            owns_property(db, subject, property_id).await
                || has_active_link(db, subject, property_id).await
        }
        (Resource::Property { property_id }, Operation::Update) => {
            owns_property(db, subject, property_id).await
        }
        // Properties are created only by onboarding and never deleted.
        (Resource::Property { .. }, Operation::Insert | Operation::Delete) => false,

        (
            Resource::TenantLink {
                tenant_profile_id,
                property_id,
            },
            Operation::Select,
        ) => {
            owns_property(db, subject, property_id).await
                || (is_self(db, subject, tenant_profile_id).await
                    && has_active_link(db, subject, property_id).await)
        }
        (Resource::TenantLink { property_id, .. }, Operation::Update) => {
            owns_property(db, subject, property_id).await
        }
        // Links are created by invite redemption and only ever deactivated.
        (Resource::TenantLink { .. }, Operation::Insert | Operation::Delete) => false,

        (
            Resource::MaintenanceRequest {
                tenant_profile_id,
                property_id,
            },
            Operation::Select,
        ) => {
            (is_self(db, subject, tenant_profile_id).await
                && has_active_link(db, subject, property_id).await)
                || owns_property(db, subject, property_id).await
        }
        (
            Resource::MaintenanceRequest {
                tenant_profile_id,
                property_id,
            },
            Operation::Insert,
        ) => {
            is_self(db, subject, tenant_profile_id).await
                && has_active_link(db, subject, property_id).await
        }
        (Resource::MaintenanceRequest { property_id, .. }, Operation::Update) => {
            owns_property(db, subject, property_id).await
        }
        (Resource::MaintenanceRequest { .. }, Operation::Delete) => false,

        (Resource::Invite { property_id }, Operation::Select | Operation::Insert | Operation::Update) => {
            owns_property(db, subject, property_id).await
        }
        (Resource::Invite { .. }, Operation::Delete) => false,
    };

    if !allowed {
        tracing::debug!(
            operation = operation.as_str(),
            resource = resource.kind(),
            "Policy denied access"
        );
    }

    allowed
}

/// Properties the subject may read: owned ones for a landlord, actively
/// linked ones for a tenant. Empty on any failure.
pub async fn readable_property_ids<C: ConnectionTrait>(
    db: &C,
    subject: Option<&Subject>,
) -> Vec<Uuid> {
    let Some(profile) = profile_for(db, subject).await else {
        return Vec::new();
    };

    let ids: Result<Vec<Uuid>, DbErr> = match profile.role {
        Role::Landlord => {
            Property::find()
                .select_only()
                .column(property::Column::Id)
                .filter(property::Column::OwnerProfileId.eq(profile.id))
                .into_tuple()
                .all(db)
                .await
        }
        Role::Tenant => {
            TenantPropertyLink::find()
                .select_only()
                .column(tenant_property_link::Column::PropertyId)
                .filter(tenant_property_link::Column::TenantProfileId.eq(profile.id))
                .filter(tenant_property_link::Column::Active.eq(true))
                .into_tuple()
                .all(db)
                .await
        }
    };

    match ids {
        Ok(ids) => ids,
        Err(error) => {
            tracing::warn!(%error, predicate = "readable_property_ids", "Policy lookup failed, denying");
            Vec::new()
        }
    }
}

async fn profile_for<C: ConnectionTrait>(
    db: &C,
    subject: Option<&Subject>,
) -> Option<profile::Model> {
    let subject = subject?;
    match ProfileRepository::new(db).find_by_subject(subject).await {
        Ok(profile) => profile,
        Err(error) => {
            tracing::warn!(%error, "Profile lookup failed during policy evaluation, denying");
            None
        }
    }
}

fn fail_closed(predicate: &'static str, result: Result<bool, DbErr>) -> bool {
    match result {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%error, predicate, "Policy predicate failed, denying");
            false
        }
    }
}
