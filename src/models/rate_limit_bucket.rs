//! Rate limit bucket entity model
//!
//! One row per (endpoint, caller key). Shared by every server instance.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rate_limit_buckets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub endpoint: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub caller_key: String,

    pub tokens_remaining: i32,

    /// Epoch milliseconds at which the bucket refills
    pub window_resets_at_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
