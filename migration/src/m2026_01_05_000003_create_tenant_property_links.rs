//! Migration to create the tenant_property_links join table.
//!
//! Links are deactivated rather than deleted; a partial unique index keeps at
//! most one active link per (tenant, property) pair.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TenantPropertyLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TenantPropertyLinks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TenantPropertyLinks::TenantProfileId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantPropertyLinks::PropertyId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantPropertyLinks::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(TenantPropertyLinks::UnitLabel).text().null())
                    .col(
                        ColumnDef::new(TenantPropertyLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(TenantPropertyLinks::DeactivatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_property_links_tenant_profile_id")
                            .from(
                                TenantPropertyLinks::Table,
                                TenantPropertyLinks::TenantProfileId,
                            )
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_property_links_property_id")
                            .from(TenantPropertyLinks::Table, TenantPropertyLinks::PropertyId)
                            .to(Properties::Table, Properties::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tenant_property_links_property_id")
                    .table(TenantPropertyLinks::Table)
                    .col(TenantPropertyLinks::PropertyId)
                    .to_owned(),
            )
            .await?;

        // Same statement works on Postgres and SQLite (both support partial indexes).
        let backend = manager.get_database_backend();
        manager
            .get_connection()
            .execute(Statement::from_string(
                backend,
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_tenant_property_links_active_pair \
                 ON tenant_property_links (tenant_profile_id, property_id) \
                 WHERE active"
                    .to_string(),
            ))
            .await
            .map(|_| ())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "DROP INDEX IF EXISTS idx_tenant_property_links_active_pair",
            ))
            .await?;

        manager
            .drop_table(Table::drop().table(TenantPropertyLinks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TenantPropertyLinks {
    Table,
    Id,
    TenantProfileId,
    PropertyId,
    Active,
    UnitLabel,
    CreatedAt,
    DeactivatedAt,
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Properties {
    Table,
    Id,
}
