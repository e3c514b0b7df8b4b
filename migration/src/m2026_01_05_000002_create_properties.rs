//! Migration to create the properties and property_areas tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Properties::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Properties::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Properties::OwnerProfileId).uuid().not_null())
                    .col(ColumnDef::new(Properties::Name).text().not_null())
                    .col(ColumnDef::new(Properties::Address).text().not_null())
                    .col(ColumnDef::new(Properties::PropertyType).text().not_null())
                    .col(ColumnDef::new(Properties::Bedrooms).integer().not_null())
                    .col(ColumnDef::new(Properties::Bathrooms).integer().not_null())
                    .col(ColumnDef::new(Properties::JoinCode).text().not_null())
                    .col(
                        ColumnDef::new(Properties::AllowCodeSignup)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Properties::OnboardingIdempotencyKey)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Properties::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Properties::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Properties::Bedrooms).gte(0))
                    .check(Expr::col(Properties::Bathrooms).gte(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_properties_owner_profile_id")
                            .from(Properties::Table, Properties::OwnerProfileId)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_properties_join_code")
                    .table(Properties::Table)
                    .col(Properties::JoinCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // NULL keys never collide, so only keyed onboarding calls are deduplicated.
        manager
            .create_index(
                Index::create()
                    .name("idx_properties_owner_idempotency_key")
                    .table(Properties::Table)
                    .col(Properties::OwnerProfileId)
                    .col(Properties::OnboardingIdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PropertyAreas::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PropertyAreas::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PropertyAreas::PropertyId).uuid().not_null())
                    .col(ColumnDef::new(PropertyAreas::Name).text().not_null())
                    .col(
                        ColumnDef::new(PropertyAreas::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_property_areas_property_id")
                            .from(PropertyAreas::Table, PropertyAreas::PropertyId)
                            .to(Properties::Table, Properties::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_property_areas_property_name")
                    .table(PropertyAreas::Table)
                    .col(PropertyAreas::PropertyId)
                    .col(PropertyAreas::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PropertyAreas::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Properties::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Properties {
    Table,
    Id,
    OwnerProfileId,
    Name,
    Address,
    PropertyType,
    Bedrooms,
    Bathrooms,
    JoinCode,
    AllowCodeSignup,
    OnboardingIdempotencyKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PropertyAreas {
    Table,
    Id,
    PropertyId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    Id,
}
