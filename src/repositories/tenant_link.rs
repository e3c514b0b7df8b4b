//! # Tenant Link Repository
//!
//! Reads and owner-driven deactivation of tenant-property links. Links are
//! created only by invite redemption and never deleted.

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::auth::Subject;
use crate::error::CoreError;
use crate::models::TenantPropertyLink;
use crate::models::tenant_property_link::{
    self, ActiveModel as TenantLinkActiveModel, Model as TenantLinkModel,
};
use crate::policy::{self, Operation, Resource};

pub struct TenantLinkRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TenantLinkRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Inserts an active link. The partial unique index rejects a second
    /// active link for the same pair.
    pub(crate) async fn insert_active(
        &self,
        tenant_profile_id: Uuid,
        property_id: Uuid,
        unit_label: Option<String>,
    ) -> Result<TenantLinkModel, DbErr> {
        let model = TenantLinkModel {
            id: Uuid::new_v4(),
            tenant_profile_id,
            property_id,
            active: true,
            unit_label,
            created_at: Utc::now().into(),
            deactivated_at: None,
        };

        let active = TenantLinkActiveModel {
            id: Set(model.id),
            tenant_profile_id: Set(model.tenant_profile_id),
            property_id: Set(model.property_id),
            active: Set(model.active),
            unit_label: Set(model.unit_label.clone()),
            created_at: Set(model.created_at),
            deactivated_at: Set(None),
        };
        TenantPropertyLink::insert(active)
            .exec_without_returning(self.db)
            .await?;

        Ok(model)
    }

    pub(crate) async fn active_link_exists(
        &self,
        tenant_profile_id: Uuid,
        property_id: Uuid,
    ) -> Result<bool, DbErr> {
        let link = TenantPropertyLink::find()
            .filter(tenant_property_link::Column::TenantProfileId.eq(tenant_profile_id))
            .filter(tenant_property_link::Column::PropertyId.eq(property_id))
            .filter(tenant_property_link::Column::Active.eq(true))
            .one(self.db)
            .await?;
        Ok(link.is_some())
    }

    /// Links on `property_id` visible to the subject: every link for the
    /// owner, the caller's own links for an actively linked tenant.
    pub async fn list_for_property(
        &self,
        subject: &Subject,
        property_id: Uuid,
    ) -> Result<Vec<TenantLinkModel>, CoreError> {
        let links = TenantPropertyLink::find()
            .filter(tenant_property_link::Column::PropertyId.eq(property_id))
            .order_by_asc(tenant_property_link::Column::CreatedAt)
            .all(self.db)
            .await?;

        let mut visible = Vec::new();
        for link in links {
            let resource = Resource::TenantLink {
                tenant_profile_id: link.tenant_profile_id,
                property_id: link.property_id,
            };
            if policy::is_allowed(self.db, Some(subject), Operation::Select, resource).await {
                visible.push(link);
            }
        }
        Ok(visible)
    }

    /// Owner deactivates a link. Idempotent: deactivating an inactive link
    /// returns it unchanged.
    pub async fn deactivate(
        &self,
        subject: &Subject,
        property_id: Uuid,
        link_id: Uuid,
    ) -> Result<TenantLinkModel, CoreError> {
        let link = TenantPropertyLink::find_by_id(link_id)
            .filter(tenant_property_link::Column::PropertyId.eq(property_id))
            .one(self.db)
            .await?;

        let Some(link) = link else {
            if policy::owns_property(self.db, Some(subject), property_id).await {
                return Err(CoreError::NotFound("tenant link"));
            }
            return Err(CoreError::AuthorizationDenied);
        };

        let resource = Resource::TenantLink {
            tenant_profile_id: link.tenant_profile_id,
            property_id,
        };
        if !policy::is_allowed(self.db, Some(subject), Operation::Update, resource).await {
            return Err(CoreError::AuthorizationDenied);
        }

        if !link.active {
            return Ok(link);
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = TenantPropertyLink::update_many()
            .col_expr(tenant_property_link::Column::Active, Expr::value(false))
            .col_expr(tenant_property_link::Column::DeactivatedAt, Expr::value(Some(now)))
            .filter(tenant_property_link::Column::Id.eq(link_id))
            .filter(tenant_property_link::Column::Active.eq(true))
            .exec(self.db)
            .await?;

        tracing::info!(
            link_id = %link_id,
            property_id = %property_id,
            changed = result.rows_affected > 0,
            "Tenant link deactivated"
        );

        let updated = TenantPropertyLink::find_by_id(link_id)
            .one(self.db)
            .await?
            .ok_or(CoreError::NotFound("tenant link"))?;
        Ok(updated)
    }
}
