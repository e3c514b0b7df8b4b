//! # Data Models
//!
//! SeaORM entities for every table leasegate owns, plus the public
//! response shapes derived from them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod invite_token;
pub mod maintenance_request;
pub mod profile;
pub mod property;
pub mod property_area;
pub mod rate_limit_bucket;
pub mod tenant_property_link;

pub use invite_token::{DeliveryMethod, Entity as InviteToken};
pub use maintenance_request::{Entity as MaintenanceRequest, MaintenanceStatus};
pub use profile::{Entity as Profile, Role};
pub use property::{Entity as Property, PropertyType};
pub use property_area::Entity as PropertyArea;
pub use rate_limit_bucket::Entity as RateLimitBucket;
pub use tenant_property_link::Entity as TenantPropertyLink;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "leasegate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
