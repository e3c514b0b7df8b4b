//! # Maintenance Request Repository
//!
//! Tenants file requests against properties they are actively linked to;
//! owning landlords move them through their lifecycle and record costs.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::auth::Subject;
use crate::error::CoreError;
use crate::models::maintenance_request::{
    self, ActiveModel as MaintenanceActiveModel, Model as MaintenanceModel,
};
use crate::models::{MaintenanceRequest, MaintenanceStatus, Role};
use crate::policy::{self, Operation, Resource};
use crate::repositories::ProfileRepository;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 5000;

/// Fields a landlord may change on a request
#[derive(Debug, Clone, Default)]
pub struct MaintenanceUpdate {
    pub status: Option<MaintenanceStatus>,
    pub estimated_cost_cents: Option<i64>,
    pub actual_cost_cents: Option<i64>,
}

pub struct MaintenanceRequestRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> MaintenanceRequestRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Requests the subject may read: the tenant's own requests on actively
    /// linked properties, or every request on a landlord's properties.
    pub async fn list_visible(&self, subject: &Subject) -> Result<Vec<MaintenanceModel>, CoreError> {
        let Some(profile) = ProfileRepository::new(self.db).find_by_subject(subject).await? else {
            return Ok(Vec::new());
        };

        let property_ids = policy::readable_property_ids(self.db, Some(subject)).await;
        if property_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = MaintenanceRequest::find()
            .filter(maintenance_request::Column::PropertyId.is_in(property_ids));
        if profile.role == Role::Tenant {
            query = query.filter(maintenance_request::Column::TenantProfileId.eq(profile.id));
        }

        let requests = query
            .order_by_desc(maintenance_request::Column::CreatedAt)
            .all(self.db)
            .await?;
        Ok(requests)
    }

    /// The request if the subject may read it, `None` otherwise.
    pub async fn get_visible(
        &self,
        subject: &Subject,
        request_id: Uuid,
    ) -> Result<Option<MaintenanceModel>, CoreError> {
        let Some(request) = MaintenanceRequest::find_by_id(request_id).one(self.db).await? else {
            return Ok(None);
        };

        let resource = Resource::MaintenanceRequest {
            tenant_profile_id: request.tenant_profile_id,
            property_id: request.property_id,
        };
        if policy::is_allowed(self.db, Some(subject), Operation::Select, resource).await {
            Ok(Some(request))
        } else {
            Ok(None)
        }
    }

    /// Tenant files a new request against a property they are linked to.
    pub async fn create(
        &self,
        subject: &Subject,
        property_id: Uuid,
        title: &str,
        description: Option<String>,
    ) -> Result<MaintenanceModel, CoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("title", "Title is required"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(CoreError::validation(
                "title",
                format!("Title cannot exceed {MAX_TITLE_LEN} characters"),
            ));
        }
        let description = description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if description
            .as_ref()
            .is_some_and(|text| text.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(CoreError::validation(
                "description",
                format!("Description cannot exceed {MAX_DESCRIPTION_LEN} characters"),
            ));
        }

        let Some(profile) = ProfileRepository::new(self.db).find_by_subject(subject).await? else {
            return Err(CoreError::AuthorizationDenied);
        };

        let resource = Resource::MaintenanceRequest {
            tenant_profile_id: profile.id,
            property_id,
        };
        if !policy::is_allowed(self.db, Some(subject), Operation::Insert, resource).await {
            return Err(CoreError::AuthorizationDenied);
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let active = MaintenanceActiveModel {
            id: Set(id),
            property_id: Set(property_id),
            tenant_profile_id: Set(profile.id),
            title: Set(title.to_string()),
            description: Set(description),
            status: Set(MaintenanceStatus::Pending),
            estimated_cost_cents: Set(None),
            actual_cost_cents: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        MaintenanceRequest::insert(active)
            .exec_without_returning(self.db)
            .await?;

        MaintenanceRequest::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or(CoreError::NotFound("maintenance request"))
    }

    /// Owning landlord updates status and cost fields.
    pub async fn update(
        &self,
        subject: &Subject,
        request_id: Uuid,
        changes: MaintenanceUpdate,
    ) -> Result<MaintenanceModel, CoreError> {
        for (field, value) in [
            ("estimated_cost_cents", changes.estimated_cost_cents),
            ("actual_cost_cents", changes.actual_cost_cents),
        ] {
            if value.is_some_and(|cents| cents < 0) {
                return Err(CoreError::validation(field, "Cost cannot be negative"));
            }
        }

        // A missing row has no property to own; it is denied like a foreign one.
        let Some(request) = MaintenanceRequest::find_by_id(request_id).one(self.db).await? else {
            return Err(CoreError::AuthorizationDenied);
        };

        let resource = Resource::MaintenanceRequest {
            tenant_profile_id: request.tenant_profile_id,
            property_id: request.property_id,
        };
        if !policy::is_allowed(self.db, Some(subject), Operation::Update, resource).await {
            return Err(CoreError::AuthorizationDenied);
        }

        if let Some(next) = changes.status
            && next != request.status
            && request.status.is_terminal()
        {
            return Err(CoreError::validation(
                "status",
                "Completed or cancelled requests cannot change status",
            ));
        }

        let mut active = request.into_active_model();
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if let Some(cents) = changes.estimated_cost_cents {
            active.estimated_cost_cents = Set(Some(cents));
        }
        if let Some(cents) = changes.actual_cost_cents {
            active.actual_cost_cents = Set(Some(cents));
        }
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(self.db).await?)
    }
}
