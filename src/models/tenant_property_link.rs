//! Tenant-property link entity model
//!
//! Links are never deleted; deactivation flips `active` and stamps
//! `deactivated_at`. At most one active link exists per (tenant, property).

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenant_property_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_profile_id: Uuid,

    pub property_id: Uuid,

    pub active: bool,

    pub unit_label: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub deactivated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::TenantProfileId",
        to = "super::profile::Column::Id"
    )]
    Tenant,
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantLinkResponse {
    pub id: Uuid,
    pub tenant_profile_id: Uuid,
    pub property_id: Uuid,
    pub active: bool,
    pub unit_label: Option<String>,
    #[schema(value_type = String, example = "2026-01-05T12:00:00Z")]
    pub created_at: DateTimeWithTimeZone,
    #[schema(value_type = Option<String>)]
    pub deactivated_at: Option<DateTimeWithTimeZone>,
}

impl From<Model> for TenantLinkResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            tenant_profile_id: model.tenant_profile_id,
            property_id: model.property_id,
            active: model.active,
            unit_label: model.unit_label,
            created_at: model.created_at,
            deactivated_at: model.deactivated_at,
        }
    }
}
