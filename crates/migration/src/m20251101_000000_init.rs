//! Initial schema migration - creates all tables from scratch.
//!
//! - `users`: member accounts and their point balance
//! - `transfers`: point transfers, one row per idempotency key
//! - `point_ledger`: append-only balance changes, referencing the transfer
//!   that caused them

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Id,
    MemberCode,
    MembershipLevel,
    Name,
    Surname,
    Phone,
    Email,
    RegistrationDate,
    RemainingPoints,
}

#[derive(Iden)]
enum Transfers {
    Table,
    Id,
    IdempotencyKey,
    FromUserId,
    ToUserId,
    Amount,
    Status,
    Note,
    FailReason,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}

#[derive(Iden)]
enum PointLedger {
    Table,
    Id,
    UserId,
    Change,
    BalanceAfter,
    EventType,
    TransferId,
    Reference,
    Metadata,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::MemberCode).string().not_null())
                    .col(
                        ColumnDef::new(Users::MembershipLevel)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Users::Name).string().not_null().default(""))
                    .col(
                        ColumnDef::new(Users::Surname)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Users::Phone).string().not_null().default(""))
                    .col(ColumnDef::new(Users::Email).string().not_null().default(""))
                    .col(
                        ColumnDef::new(Users::RegistrationDate)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::RemainingPoints)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-member_code-unique")
                    .table(Users::Table)
                    .col(Users::MemberCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Transfers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transfers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transfers::IdempotencyKey).string().not_null())
                    .col(ColumnDef::new(Transfers::FromUserId).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::ToUserId).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::Status).string().not_null())
                    .col(ColumnDef::new(Transfers::Note).string())
                    .col(ColumnDef::new(Transfers::FailReason).string())
                    .col(ColumnDef::new(Transfers::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Transfers::UpdatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Transfers::CompletedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-from_user_id")
                            .from(Transfers::Table, Transfers::FromUserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-to_user_id")
                            .from(Transfers::Table, Transfers::ToUserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-idempotency_key-unique")
                    .table(Transfers::Table)
                    .col(Transfers::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-from_user_id")
                    .table(Transfers::Table)
                    .col(Transfers::FromUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-to_user_id")
                    .table(Transfers::Table)
                    .col(Transfers::ToUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-created_at")
                    .table(Transfers::Table)
                    .col(Transfers::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Point ledger
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PointLedger::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PointLedger::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PointLedger::UserId).big_integer().not_null())
                    .col(ColumnDef::new(PointLedger::Change).big_integer().not_null())
                    .col(
                        ColumnDef::new(PointLedger::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PointLedger::EventType).string().not_null())
                    .col(ColumnDef::new(PointLedger::TransferId).big_integer())
                    .col(ColumnDef::new(PointLedger::Reference).string())
                    .col(ColumnDef::new(PointLedger::Metadata).string())
                    .col(
                        ColumnDef::new(PointLedger::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-point_ledger-user_id")
                            .from(PointLedger::Table, PointLedger::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-point_ledger-transfer_id")
                            .from(PointLedger::Table, PointLedger::TransferId)
                            .to(Transfers::Table, Transfers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-point_ledger-user_id")
                    .table(PointLedger::Table)
                    .col(PointLedger::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-point_ledger-transfer_id")
                    .table(PointLedger::Table)
                    .col(PointLedger::TransferId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(PointLedger::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
