//! Invite token entity model
//!
//! The plaintext invite secret is never stored. `lookup_digest` is a keyed
//! digest used to find the row; `secret_salt`/`secret_hash` verify it.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How the invite secret reaches the tenant
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
pub enum DeliveryMethod {
    /// Landlord shares the code out of band
    #[sea_orm(string_value = "code")]
    #[serde(rename = "code")]
    #[default]
    Code,

    /// Code is addressed to a specific email
    #[sea_orm(string_value = "email")]
    #[serde(rename = "email")]
    Email,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "invite_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub property_id: Uuid,

    /// Landlord profile that issued the invite
    pub created_by: Uuid,

    #[sea_orm(unique)]
    pub lookup_digest: String,

    pub secret_salt: String,

    pub secret_hash: String,

    pub delivery_method: DeliveryMethod,

    pub intended_email: Option<String>,

    /// Copied onto the tenant link at redemption
    pub unit_label: Option<String>,

    pub issued_at: DateTimeWithTimeZone,

    pub expires_at: DateTimeWithTimeZone,

    /// Set exactly once, by the redeeming transaction
    pub used_at: Option<DateTimeWithTimeZone>,

    pub used_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
