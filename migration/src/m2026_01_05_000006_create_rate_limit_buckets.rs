//! Migration to create the shared rate-limit bucket store.
//!
//! The window reset instant is stored as epoch milliseconds so conditional
//! updates compare integers on every backend.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RateLimitBuckets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RateLimitBuckets::Endpoint).text().not_null())
                    .col(ColumnDef::new(RateLimitBuckets::CallerKey).text().not_null())
                    .col(
                        ColumnDef::new(RateLimitBuckets::TokensRemaining)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RateLimitBuckets::WindowResetsAtMs)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(RateLimitBuckets::Endpoint)
                            .col(RateLimitBuckets::CallerKey),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RateLimitBuckets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RateLimitBuckets {
    Table,
    Endpoint,
    CallerKey,
    TokensRemaining,
    WindowResetsAtMs,
}
