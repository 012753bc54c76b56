use sea_orm_migration::prelude::*;

use crate::m20260901_000001_identity::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Leaves {
    Table,
    Id,
    UserId,
    LeaveType,
    FromDate,
    ToDate,
    CreditedDays,
    Reason,
    Status,
    ApproverRole,
    DecidedBy,
    DecidedAt,
    Remarks,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LeaveEntitlements {
    Table,
    Id,
    UserId,
    Year,
    EntitledDays,
    AccumulatedDays,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Leaves::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Leaves::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Leaves::UserId).uuid().not_null())
                    .col(ColumnDef::new(Leaves::LeaveType).string_len(32).not_null())
                    .col(ColumnDef::new(Leaves::FromDate).date().not_null())
                    .col(ColumnDef::new(Leaves::ToDate).date().not_null())
                    .col(ColumnDef::new(Leaves::CreditedDays).integer().not_null())
                    .col(ColumnDef::new(Leaves::Reason).text().not_null())
                    .col(
                        ColumnDef::new(Leaves::Status)
                            .string_len(32)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(Leaves::ApproverRole).string_len(32).not_null())
                    .col(ColumnDef::new(Leaves::DecidedBy).uuid())
                    .col(ColumnDef::new(Leaves::DecidedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Leaves::Remarks).text())
                    .col(
                        ColumnDef::new(Leaves::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Leaves::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .check(Expr::col(Leaves::FromDate).lte(Expr::col(Leaves::ToDate)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leaves_user")
                            .from(Leaves::Table, Leaves::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leaves_decided_by")
                            .from(Leaves::Table, Leaves::DecidedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_leaves_user_from")
                    .table(Leaves::Table)
                    .col(Leaves::UserId)
                    .col(Leaves::FromDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LeaveEntitlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeaveEntitlements::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LeaveEntitlements::UserId).uuid().not_null())
                    .col(ColumnDef::new(LeaveEntitlements::Year).integer().not_null())
                    .col(
                        ColumnDef::new(LeaveEntitlements::EntitledDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaveEntitlements::AccumulatedDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LeaveEntitlements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaveEntitlements::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_entitlements_user")
                            .from(LeaveEntitlements::Table, LeaveEntitlements::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_leave_entitlements_user_year")
                    .table(LeaveEntitlements::Table)
                    .col(LeaveEntitlements::UserId)
                    .col(LeaveEntitlements::Year)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LeaveEntitlements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Leaves::Table).to_owned())
            .await
    }
}
