//! Maintenance request entity model

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
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum MaintenanceStatus {
    #[sea_orm(string_value = "pending")]
    #[serde(rename = "pending")]
    #[default]
    Pending,

    #[sea_orm(string_value = "in_progress")]
    #[serde(rename = "in_progress")]
    InProgress,

    #[sea_orm(string_value = "completed")]
    #[serde(rename = "completed")]
    Completed,

    #[sea_orm(string_value = "cancelled")]
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl MaintenanceStatus {
    /// Completed and cancelled requests never change status again
    pub fn is_terminal(&self) -> bool {
        matches!(self, MaintenanceStatus::Completed | MaintenanceStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "maintenance_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub property_id: Uuid,

    /// Tenant who filed the request
    pub tenant_profile_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub status: MaintenanceStatus,

    pub estimated_cost_cents: Option<i64>,

    pub actual_cost_cents: Option<i64>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::TenantProfileId",
        to = "super::profile::Column::Id"
    )]
    Tenant,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRequestResponse {
    pub id: Uuid,
    pub property_id: Uuid,
    pub tenant_profile_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: MaintenanceStatus,
    pub estimated_cost_cents: Option<i64>,
    pub actual_cost_cents: Option<i64>,
    #[schema(value_type = String, example = "2026-01-05T12:00:00Z")]
    pub created_at: DateTimeWithTimeZone,
    #[schema(value_type = String, example = "2026-01-05T12:00:00Z")]
    pub updated_at: DateTimeWithTimeZone,
}

impl From<Model> for MaintenanceRequestResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            property_id: model.property_id,
            tenant_profile_id: model.tenant_profile_id,
            title: model.title,
            description: model.description,
            status: model.status,
            estimated_cost_cents: model.estimated_cost_cents,
            actual_cost_cents: model.actual_cost_cents,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
