//! # Profile Repository
//!
//! Lookups by external subject and the role-preserving upsert used by the
//! onboarding and invite-redemption transactions.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::auth::Subject;
use crate::error::is_unique_violation;
use crate::models::profile::{self, ActiveModel as ProfileActiveModel, Model as ProfileModel};
use crate::models::{Profile, Role};

/// Result of [`ProfileRepository::ensure_with_role`].
#[derive(Debug, Clone)]
pub enum EnsuredProfile {
    /// A new profile was created with the requested role
    Created(ProfileModel),
    /// The profile already existed with the requested role
    Existing(ProfileModel),
    /// The profile exists with a different role; nothing was changed
    RoleConflict(ProfileModel),
}

/// Repository for profile rows; works on a pool or inside a transaction
pub struct ProfileRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> ProfileRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find_by_subject(&self, subject: &Subject) -> Result<Option<ProfileModel>, DbErr> {
        Profile::find()
            .filter(profile::Column::ExternalSubject.eq(subject.as_str()))
            .one(self.db)
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ProfileModel>, DbErr> {
        Profile::find_by_id(id).one(self.db).await
    }

    /// Returns the caller's profile with `role`, creating it if needed and
    /// marking onboarding complete. An existing profile never changes role;
    /// `display_name` only fills a name that was never set.
    pub async fn ensure_with_role(
        &self,
        subject: &Subject,
        role: Role,
        display_name: Option<String>,
    ) -> Result<EnsuredProfile, DbErr> {
        if let Some(existing) = self.find_by_subject(subject).await? {
            return self.complete_existing(existing, role, display_name).await;
        }

        let now = Utc::now();
        let model = ProfileModel {
            id: Uuid::new_v4(),
            external_subject: subject.as_str().to_string(),
            role,
            display_name: display_name.clone(),
            onboarding_completed: true,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let active = ProfileActiveModel {
            id: Set(model.id),
            external_subject: Set(model.external_subject.clone()),
            role: Set(model.role),
            display_name: Set(model.display_name.clone()),
            onboarding_completed: Set(model.onboarding_completed),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        };

        match Profile::insert(active).exec_without_returning(self.db).await {
            Ok(_) => Ok(EnsuredProfile::Created(model)),
            // Lost a race with another first request from the same subject.
            Err(err) if is_unique_violation(&err) => match self.find_by_subject(subject).await? {
                Some(existing) => self.complete_existing(existing, role, display_name).await,
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    async fn complete_existing(
        &self,
        existing: ProfileModel,
        role: Role,
        display_name: Option<String>,
    ) -> Result<EnsuredProfile, DbErr> {
        if existing.role != role {
            return Ok(EnsuredProfile::RoleConflict(existing));
        }

        let fill_name = display_name.filter(|_| existing.display_name.is_none());
        if existing.onboarding_completed && fill_name.is_none() {
            return Ok(EnsuredProfile::Existing(existing));
        }

        let now = Utc::now();
        let mut update = Profile::update_many()
            .col_expr(profile::Column::OnboardingCompleted, Expr::value(true))
            .col_expr(
                profile::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(now)),
            )
            .filter(profile::Column::Id.eq(existing.id));
        if let Some(name) = &fill_name {
            update = update
                .col_expr(profile::Column::DisplayName, Expr::value(name.clone()))
                .filter(profile::Column::DisplayName.is_null());
        }
        update.exec(self.db).await?;

        Ok(EnsuredProfile::Existing(ProfileModel {
            onboarding_completed: true,
            display_name: existing.display_name.or(fill_name),
            updated_at: now.into(),
            ..existing
        }))
    }
}
