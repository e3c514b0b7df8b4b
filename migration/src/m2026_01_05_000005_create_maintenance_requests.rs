//! Migration to create the maintenance_requests table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MaintenanceRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MaintenanceRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MaintenanceRequests::PropertyId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MaintenanceRequests::TenantProfileId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MaintenanceRequests::Title).text().not_null())
                    .col(
                        ColumnDef::new(MaintenanceRequests::Description)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MaintenanceRequests::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(MaintenanceRequests::EstimatedCostCents)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MaintenanceRequests::ActualCostCents)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MaintenanceRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MaintenanceRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(MaintenanceRequests::Status).is_in([
                        "pending",
                        "in_progress",
                        "completed",
                        "cancelled",
                    ]))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_maintenance_requests_property_id")
                            .from(MaintenanceRequests::Table, MaintenanceRequests::PropertyId)
                            .to(Properties::Table, Properties::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_maintenance_requests_tenant_profile_id")
                            .from(
                                MaintenanceRequests::Table,
                                MaintenanceRequests::TenantProfileId,
                            )
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_maintenance_requests_property_id")
                    .table(MaintenanceRequests::Table)
                    .col(MaintenanceRequests::PropertyId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MaintenanceRequests::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MaintenanceRequests {
    Table,
    Id,
    PropertyId,
    TenantProfileId,
    Title,
    Description,
    Status,
    EstimatedCostCents,
    ActualCostCents,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Properties {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    Id,
}
