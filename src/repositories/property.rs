//! # Property Repository
//!
//! Policy-gated property reads and owner-only settings updates, plus the
//! unchecked row helpers used inside the onboarding transaction.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::auth::Subject;
use crate::error::CoreError;
use crate::models::property::{self, ActiveModel as PropertyActiveModel, Model as PropertyModel, PropertyResponse};
use crate::models::property_area::{self, ActiveModel as PropertyAreaActiveModel};
use crate::models::{Property, PropertyArea};
use crate::policy::{self, Operation, Resource};

pub struct PropertyRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> PropertyRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Unchecked lookup; callers gate the result through the policy.
    pub(crate) async fn find_by_id(&self, id: Uuid) -> Result<Option<PropertyModel>, DbErr> {
        Property::find_by_id(id).one(self.db).await
    }

    pub(crate) async fn find_by_idempotency_key(
        &self,
        owner_profile_id: Uuid,
        key: &str,
    ) -> Result<Option<PropertyModel>, DbErr> {
        Property::find()
            .filter(property::Column::OwnerProfileId.eq(owner_profile_id))
            .filter(property::Column::OnboardingIdempotencyKey.eq(key))
            .one(self.db)
            .await
    }

    pub(crate) async fn join_code_taken(&self, code: &str) -> Result<bool, DbErr> {
        let count = Property::find()
            .filter(property::Column::JoinCode.eq(code))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }

    /// Inserts the property and one area row per name. Must run inside a
    /// transaction; a duplicate area name fails the whole call.
    pub(crate) async fn insert_with_areas(
        &self,
        model: &PropertyModel,
        area_names: &[String],
    ) -> Result<(), DbErr> {
        let active = PropertyActiveModel {
            id: Set(model.id),
            owner_profile_id: Set(model.owner_profile_id),
            name: Set(model.name.clone()),
            address: Set(model.address.clone()),
            property_type: Set(model.property_type),
            bedrooms: Set(model.bedrooms),
            bathrooms: Set(model.bathrooms),
            join_code: Set(model.join_code.clone()),
            allow_code_signup: Set(model.allow_code_signup),
            onboarding_idempotency_key: Set(model.onboarding_idempotency_key.clone()),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        };
        Property::insert(active)
            .exec_without_returning(self.db)
            .await?;

        for name in area_names {
            let area = PropertyAreaActiveModel {
                id: Set(Uuid::new_v4()),
                property_id: Set(model.id),
                name: Set(name.clone()),
                created_at: Set(model.created_at),
            };
            PropertyArea::insert(area)
                .exec_without_returning(self.db)
                .await?;
        }

        Ok(())
    }

    pub async fn area_names(&self, property_id: Uuid) -> Result<Vec<String>, DbErr> {
        let areas = PropertyArea::find()
            .filter(property_area::Column::PropertyId.eq(property_id))
            .order_by_asc(property_area::Column::CreatedAt)
            .order_by_asc(property_area::Column::Name)
            .all(self.db)
            .await?;
        Ok(areas.into_iter().map(|area| area.name).collect())
    }

    /// Properties the subject may see. Empty when there are none or access is denied.
    pub async fn list_visible(&self, subject: &Subject) -> Result<Vec<PropertyResponse>, CoreError> {
        let ids = policy::readable_property_ids(self.db, Some(subject)).await;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let properties = Property::find()
            .filter(property::Column::Id.is_in(ids))
            .order_by_asc(property::Column::CreatedAt)
            .all(self.db)
            .await?;

        let mut visible = Vec::with_capacity(properties.len());
        for model in properties {
            visible.push(self.render(subject, model).await?);
        }
        Ok(visible)
    }

    /// The property if the subject may see it, `None` otherwise (absent or denied).
    pub async fn get_visible(
        &self,
        subject: &Subject,
        property_id: Uuid,
    ) -> Result<Option<PropertyResponse>, CoreError> {
        if !policy::is_allowed(
            self.db,
            Some(subject),
            Operation::Select,
            Resource::Property { property_id },
        )
        .await
        {
            return Ok(None);
        }

        match self.find_by_id(property_id).await? {
            Some(model) => Ok(Some(self.render(subject, model).await?)),
            None => Ok(None),
        }
    }

    /// Owner toggles whether tenants may join with the property code. Only the
    /// flag is persisted; redemption here always goes through invites.
    pub async fn update_settings(
        &self,
        subject: &Subject,
        property_id: Uuid,
        allow_code_signup: bool,
    ) -> Result<PropertyResponse, CoreError> {
        if !policy::is_allowed(
            self.db,
            Some(subject),
            Operation::Update,
            Resource::Property { property_id },
        )
        .await
        {
            return Err(CoreError::AuthorizationDenied);
        }

        let now = Utc::now();
        let result = Property::update_many()
            .col_expr(property::Column::AllowCodeSignup, Expr::value(allow_code_signup))
            .col_expr(
                property::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(now)),
            )
            .filter(property::Column::Id.eq(property_id))
            .exec(self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(CoreError::NotFound("property"));
        }

        let model = self
            .find_by_id(property_id)
            .await?
            .ok_or(CoreError::NotFound("property"))?;
        let areas = self.area_names(model.id).await?;
        Ok(PropertyResponse::from_model(model, areas, true))
    }

    async fn render(&self, subject: &Subject, model: PropertyModel) -> Result<PropertyResponse, CoreError> {
        let is_owner = policy::owns_property(self.db, Some(subject), model.id).await;
        let areas = self.area_names(model.id).await?;
        Ok(PropertyResponse::from_model(model, areas, is_owner))
    }
}
