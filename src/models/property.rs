//! Property entity model
//!
//! Properties are owned by exactly one landlord profile. Ownership is fixed
//! at creation.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PropertyType {
    #[sea_orm(string_value = "house")]
    #[serde(rename = "house")]
    House,

    #[sea_orm(string_value = "apartment")]
    #[serde(rename = "apartment")]
    Apartment,

    #[sea_orm(string_value = "condo")]
    #[serde(rename = "condo")]
    Condo,

    #[sea_orm(string_value = "townhouse")]
    #[serde(rename = "townhouse")]
    Townhouse,

    #[sea_orm(string_value = "other")]
    #[serde(rename = "other")]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "properties")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_profile_id: Uuid,

    pub name: String,

    pub address: String,

    pub property_type: PropertyType,

    pub bedrooms: i32,

    pub bathrooms: i32,

    /// Human-shareable code printed on property materials
    #[sea_orm(unique)]
    pub join_code: String,

    /// Whether tenants may join with the property code instead of a personal
    /// invite. Stored and reported here; the join-by-code flow that honors it
    /// lives outside this service.
    pub allow_code_signup: bool,

    /// Client-supplied key that made the onboarding request retry-safe
    pub onboarding_idempotency_key: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::OwnerProfileId",
        to = "super::profile::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::property_area::Entity")]
    PropertyArea,
    #[sea_orm(has_many = "super::tenant_property_link::Entity")]
    TenantPropertyLink,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::property_area::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PropertyArea.def()
    }
}

impl Related<super::tenant_property_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TenantPropertyLink.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Property as returned to authorized callers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PropertyResponse {
    pub id: Uuid,
    pub owner_profile_id: Uuid,
    pub name: String,
    pub address: String,
    pub property_type: PropertyType,
    pub bedrooms: i32,
    pub bathrooms: i32,
    /// Present only when the caller owns the property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_code: Option<String>,
    pub allow_code_signup: bool,
    pub areas: Vec<String>,
    #[schema(value_type = String, example = "2026-01-05T12:00:00Z")]
    pub created_at: DateTimeWithTimeZone,
}

impl PropertyResponse {
    pub fn from_model(model: Model, areas: Vec<String>, include_join_code: bool) -> Self {
        Self {
            id: model.id,
            owner_profile_id: model.owner_profile_id,
            name: model.name,
            address: model.address,
            property_type: model.property_type,
            bedrooms: model.bedrooms,
            bathrooms: model.bathrooms,
            join_code: include_join_code.then_some(model.join_code),
            allow_code_signup: model.allow_code_signup,
            areas,
            created_at: model.created_at,
        }
    }
}
