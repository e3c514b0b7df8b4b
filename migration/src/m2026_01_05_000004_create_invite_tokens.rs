//! Migration to create the invite_tokens table.
//!
//! Only digests of the invite secret are stored: a keyed lookup digest used to
//! locate the row and a salted hash used to verify it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InviteTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InviteTokens::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InviteTokens::PropertyId).uuid().not_null())
                    .col(ColumnDef::new(InviteTokens::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(InviteTokens::LookupDigest).text().not_null())
                    .col(ColumnDef::new(InviteTokens::SecretSalt).text().not_null())
                    .col(ColumnDef::new(InviteTokens::SecretHash).text().not_null())
                    .col(ColumnDef::new(InviteTokens::DeliveryMethod).text().not_null())
                    .col(ColumnDef::new(InviteTokens::IntendedEmail).text().null())
                    .col(ColumnDef::new(InviteTokens::UnitLabel).text().null())
                    .col(
                        ColumnDef::new(InviteTokens::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteTokens::UsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(InviteTokens::UsedBy).uuid().null())
                    .check(Expr::col(InviteTokens::DeliveryMethod).is_in(["code", "email"]))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invite_tokens_property_id")
                            .from(InviteTokens::Table, InviteTokens::PropertyId)
                            .to(Properties::Table, Properties::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invite_tokens_used_by")
                            .from(InviteTokens::Table, InviteTokens::UsedBy)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invite_tokens_lookup_digest")
                    .table(InviteTokens::Table)
                    .col(InviteTokens::LookupDigest)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invite_tokens_property_id")
                    .table(InviteTokens::Table)
                    .col(InviteTokens::PropertyId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InviteTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum InviteTokens {
    Table,
    Id,
    PropertyId,
    CreatedBy,
    LookupDigest,
    SecretSalt,
    SecretHash,
    DeliveryMethod,
    IntendedEmail,
    UnitLabel,
    IssuedAt,
    ExpiresAt,
    UsedAt,
    UsedBy,
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
