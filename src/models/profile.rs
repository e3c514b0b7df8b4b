//! Profile entity model
//!
//! One row per authenticated user. The role is chosen exactly once, at
//! profile creation, and is guarded against later updates by a trigger.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role of a profile in the system
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Role {
    #[sea_orm(string_value = "landlord")]
    #[serde(rename = "landlord")]
    Landlord,

    #[sea_orm(string_value = "tenant")]
    #[serde(rename = "tenant")]
    Tenant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Landlord => "landlord",
            Role::Tenant => "tenant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Subject identifier issued by the external auth provider
    #[sea_orm(unique)]
    pub external_subject: String,

    pub role: Role,

    pub display_name: Option<String>,

    pub onboarding_completed: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::property::Entity")]
    Property,
    #[sea_orm(has_many = "super::tenant_property_link::Entity")]
    TenantPropertyLink,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::tenant_property_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TenantPropertyLink.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Public representation of the caller's own profile
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub role: Role,
    pub display_name: Option<String>,
    pub onboarding_completed: bool,
    #[schema(value_type = String, example = "2026-01-05T12:00:00Z")]
    pub created_at: DateTimeWithTimeZone,
}

impl From<Model> for ProfileResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            role: model.role,
            display_name: model.display_name,
            onboarding_completed: model.onboarding_completed,
            created_at: model.created_at,
        }
    }
}
