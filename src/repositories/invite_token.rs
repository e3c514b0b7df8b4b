//! # Invite Token Repository
//!
//! Storage for invite digests. `mark_redeemed` is the single conditional
//! write that decides which concurrent redemption wins.

use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::models::InviteToken;
use crate::models::invite_token::{self, ActiveModel as InviteTokenActiveModel, Model as InviteTokenModel};

pub struct InviteTokenRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> InviteTokenRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn insert(&self, model: &InviteTokenModel) -> Result<(), DbErr> {
        let active = InviteTokenActiveModel {
            id: Set(model.id),
            property_id: Set(model.property_id),
            created_by: Set(model.created_by),
            lookup_digest: Set(model.lookup_digest.clone()),
            secret_salt: Set(model.secret_salt.clone()),
            secret_hash: Set(model.secret_hash.clone()),
            delivery_method: Set(model.delivery_method),
            intended_email: Set(model.intended_email.clone()),
            unit_label: Set(model.unit_label.clone()),
            issued_at: Set(model.issued_at),
            expires_at: Set(model.expires_at),
            used_at: Set(model.used_at),
            used_by: Set(model.used_by),
        };
        InviteToken::insert(active)
            .exec_without_returning(self.db)
            .await?;
        Ok(())
    }

    pub async fn find_by_lookup_digest(
        &self,
        lookup_digest: &str,
    ) -> Result<Option<InviteTokenModel>, DbErr> {
        InviteToken::find()
            .filter(invite_token::Column::LookupDigest.eq(lookup_digest))
            .one(self.db)
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<InviteTokenModel>, DbErr> {
        InviteToken::find_by_id(id).one(self.db).await
    }

    pub async fn list_for_property(&self, property_id: Uuid) -> Result<Vec<InviteTokenModel>, DbErr> {
        InviteToken::find()
            .filter(invite_token::Column::PropertyId.eq(property_id))
            .order_by_desc(invite_token::Column::IssuedAt)
            .all(self.db)
            .await
    }

    /// Marks the token used by `profile_id`. Returns `false` when another
    /// redemption already claimed it.
    pub async fn mark_redeemed(
        &self,
        id: Uuid,
        profile_id: Uuid,
        now: DateTimeWithTimeZone,
    ) -> Result<bool, DbErr> {
        let result = InviteToken::update_many()
            .col_expr(invite_token::Column::UsedAt, Expr::value(Some(now)))
            .col_expr(invite_token::Column::UsedBy, Expr::value(Some(profile_id)))
            .filter(invite_token::Column::Id.eq(id))
            .filter(invite_token::Column::UsedAt.is_null())
            .exec(self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Expires an unused token immediately. Returns `false` when the token is
    /// missing, belongs to another property, or was already used.
    pub async fn revoke(
        &self,
        id: Uuid,
        property_id: Uuid,
        now: DateTimeWithTimeZone,
    ) -> Result<bool, DbErr> {
        let result = InviteToken::update_many()
            .col_expr(invite_token::Column::ExpiresAt, Expr::value(now))
            .filter(invite_token::Column::Id.eq(id))
            .filter(invite_token::Column::PropertyId.eq(property_id))
            .filter(invite_token::Column::UsedAt.is_null())
            .exec(self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
