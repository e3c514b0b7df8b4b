//! Database migrations for leasegate.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_05_000001_create_profiles;
mod m2026_01_05_000002_create_properties;
mod m2026_01_05_000003_create_tenant_property_links;
mod m2026_01_05_000004_create_invite_tokens;
mod m2026_01_05_000005_create_maintenance_requests;
mod m2026_01_05_000006_create_rate_limit_buckets;
mod m2026_01_12_000001_add_immutability_guards;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_05_000001_create_profiles::Migration),
            Box::new(m2026_01_05_000002_create_properties::Migration),
            Box::new(m2026_01_05_000003_create_tenant_property_links::Migration),
            Box::new(m2026_01_05_000004_create_invite_tokens::Migration),
            Box::new(m2026_01_05_000005_create_maintenance_requests::Migration),
            Box::new(m2026_01_05_000006_create_rate_limit_buckets::Migration),
            Box::new(m2026_01_12_000001_add_immutability_guards::Migration),
        ]
    }
}
