//! # Repository Layer
//!
//! Data access for every table. Reads a caller may not see come back empty;
//! writes the policy rejects fail with `AuthorizationDenied`.

pub mod invite_token;
pub mod maintenance_request;
pub mod profile;
pub mod property;
pub mod rate_limit_bucket;
pub mod tenant_link;

pub use invite_token::InviteTokenRepository;
pub use maintenance_request::{MaintenanceRequestRepository, MaintenanceUpdate};
pub use profile::{EnsuredProfile, ProfileRepository};
pub use property::PropertyRepository;
pub use rate_limit_bucket::SeaOrmBucketStore;
pub use tenant_link::TenantLinkRepository;
