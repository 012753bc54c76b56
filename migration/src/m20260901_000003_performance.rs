use sea_orm_migration::prelude::*;

use crate::m20260901_000001_identity::Users;
use crate::m20260901_000002_organisation::Departments;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Kmis {
    Table,
    Id,
    Title,
    Description,
    Year,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Kpis {
    Table,
    Id,
    KmiId,
    Title,
    Description,
    DepartmentId,
    Target,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Kais {
    Table,
    Id,
    KpiId,
    Title,
    Description,
    AssignedTo,
    Target,
    Achieved,
    Status,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Goals {
    Table,
    Id,
    UserId,
    KpiId,
    Title,
    Description,
    StartDate,
    TargetDate,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Milestones {
    Table,
    Id,
    GoalId,
    Title,
    DueDate,
    CompletedAt,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Kmis::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Kmis::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Kmis::Title).string().not_null())
                    .col(ColumnDef::new(Kmis::Description).text())
                    .col(ColumnDef::new(Kmis::Year).integer().not_null())
                    .col(ColumnDef::new(Kmis::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Kmis::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Kmis::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_kmis_created_by")
                            .from(Kmis::Table, Kmis::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Kpis::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Kpis::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Kpis::KmiId).uuid().not_null())
                    .col(ColumnDef::new(Kpis::Title).string().not_null())
                    .col(ColumnDef::new(Kpis::Description).text())
                    .col(ColumnDef::new(Kpis::DepartmentId).uuid())
                    .col(ColumnDef::new(Kpis::Target).double())
                    .col(ColumnDef::new(Kpis::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Kpis::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Kpis::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_kpis_kmi")
                            .from(Kpis::Table, Kpis::KmiId)
                            .to(Kmis::Table, Kmis::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_kpis_department")
                            .from(Kpis::Table, Kpis::DepartmentId)
                            .to(Departments::Table, Departments::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_kpis_kmi")
                    .table(Kpis::Table)
                    .col(Kpis::KmiId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Kais::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Kais::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Kais::KpiId).uuid().not_null())
                    .col(ColumnDef::new(Kais::Title).string().not_null())
                    .col(ColumnDef::new(Kais::Description).text())
                    .col(ColumnDef::new(Kais::AssignedTo).uuid())
                    .col(ColumnDef::new(Kais::Target).double())
                    .col(ColumnDef::new(Kais::Achieved).double())
                    .col(
                        ColumnDef::new(Kais::Status)
                            .string_len(32)
                            .not_null()
                            .default("NOT_STARTED"),
                    )
                    .col(ColumnDef::new(Kais::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Kais::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Kais::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_kais_kpi")
                            .from(Kais::Table, Kais::KpiId)
                            .to(Kpis::Table, Kpis::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_kais_assigned_to")
                            .from(Kais::Table, Kais::AssignedTo)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_kais_kpi")
                    .table(Kais::Table)
                    .col(Kais::KpiId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Goals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Goals::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Goals::UserId).uuid().not_null())
                    .col(ColumnDef::new(Goals::KpiId).uuid())
                    .col(ColumnDef::new(Goals::Title).string().not_null())
                    .col(ColumnDef::new(Goals::Description).text())
                    .col(ColumnDef::new(Goals::StartDate).date().not_null())
                    .col(ColumnDef::new(Goals::TargetDate).date().not_null())
                    .col(
                        ColumnDef::new(Goals::Status)
                            .string_len(32)
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Goals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Goals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_goals_user")
                            .from(Goals::Table, Goals::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_goals_kpi")
                            .from(Goals::Table, Goals::KpiId)
                            .to(Kpis::Table, Kpis::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Milestones::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Milestones::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Milestones::GoalId).uuid().not_null())
                    .col(ColumnDef::new(Milestones::Title).string().not_null())
                    .col(ColumnDef::new(Milestones::DueDate).date())
                    .col(ColumnDef::new(Milestones::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Milestones::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_milestones_goal")
                            .from(Milestones::Table, Milestones::GoalId)
                            .to(Goals::Table, Goals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Milestones::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Goals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Kais::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Kpis::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Kmis::Table).to_owned())
            .await
    }
}
