//! Adds database-level guards for columns that must never change once written:
//! `profiles.role`, `profiles.external_subject` and `properties.owner_profile_id`.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{DatabaseBackend, Statement};

#[derive(DeriveMigrationName)]
pub struct Migration;

const POSTGRES_UP: &[&str] = &[
    "CREATE OR REPLACE FUNCTION leasegate_profiles_immutable() RETURNS trigger AS $$
BEGIN
    IF NEW.role IS DISTINCT FROM OLD.role THEN
        RAISE EXCEPTION 'profile role is immutable' USING ERRCODE = 'check_violation';
    END IF;
    IF NEW.external_subject IS DISTINCT FROM OLD.external_subject THEN
        RAISE EXCEPTION 'profile subject is immutable' USING ERRCODE = 'check_violation';
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql",
    "DROP TRIGGER IF EXISTS trg_profiles_immutable ON profiles",
    "CREATE TRIGGER trg_profiles_immutable BEFORE UPDATE ON profiles \
     FOR EACH ROW EXECUTE FUNCTION leasegate_profiles_immutable()",
    "CREATE OR REPLACE FUNCTION leasegate_properties_owner_immutable() RETURNS trigger AS $$
BEGIN
    IF NEW.owner_profile_id IS DISTINCT FROM OLD.owner_profile_id THEN
        RAISE EXCEPTION 'property owner is immutable' USING ERRCODE = 'check_violation';
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql",
    "DROP TRIGGER IF EXISTS trg_properties_owner_immutable ON properties",
    "CREATE TRIGGER trg_properties_owner_immutable BEFORE UPDATE ON properties \
     FOR EACH ROW EXECUTE FUNCTION leasegate_properties_owner_immutable()",
];

const POSTGRES_DOWN: &[&str] = &[
    "DROP TRIGGER IF EXISTS trg_profiles_immutable ON profiles",
    "DROP FUNCTION IF EXISTS leasegate_profiles_immutable()",
    "DROP TRIGGER IF EXISTS trg_properties_owner_immutable ON properties",
    "DROP FUNCTION IF EXISTS leasegate_properties_owner_immutable()",
];

const SQLITE_UP: &[&str] = &[
    "CREATE TRIGGER IF NOT EXISTS trg_profiles_immutable \
     BEFORE UPDATE OF role, external_subject ON profiles \
     FOR EACH ROW WHEN NEW.role IS NOT OLD.role OR NEW.external_subject IS NOT OLD.external_subject \
     BEGIN SELECT RAISE(ABORT, 'profile role is immutable'); END",
    "CREATE TRIGGER IF NOT EXISTS trg_properties_owner_immutable \
     BEFORE UPDATE OF owner_profile_id ON properties \
     FOR EACH ROW WHEN NEW.owner_profile_id IS NOT OLD.owner_profile_id \
     BEGIN SELECT RAISE(ABORT, 'property owner is immutable'); END",
];

const SQLITE_DOWN: &[&str] = &[
    "DROP TRIGGER IF EXISTS trg_profiles_immutable",
    "DROP TRIGGER IF EXISTS trg_properties_owner_immutable",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let statements = match manager.get_database_backend() {
            DatabaseBackend::Postgres => POSTGRES_UP,
            DatabaseBackend::Sqlite => SQLITE_UP,
            _ => {
                return Err(DbErr::Migration(
                    "MySQL is not a supported backend".to_string(),
                ));
            }
        };
        run_all(manager, statements).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let statements = match manager.get_database_backend() {
            DatabaseBackend::Postgres => POSTGRES_DOWN,
            _ => SQLITE_DOWN,
        };
        run_all(manager, statements).await
    }
}

async fn run_all(manager: &SchemaManager<'_>, statements: &[&str]) -> Result<(), DbErr> {
    let backend = manager.get_database_backend();
    for sql in statements {
        manager
            .get_connection()
            .execute(Statement::from_string(backend, ToString::to_string(*sql)))
            .await?;
    }
    Ok(())
}
