use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "kais")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub kpi_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sea_orm(indexed)]
    pub assigned_to: Option<Uuid>,
    pub target: Option<f64>,
    pub achieved: Option<f64>,
    pub status: Status,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::kpis::Entity",
        from = "Column::KpiId",
        to = "super::kpis::Column::Id",
        on_delete = "Cascade"
    )]
    Kpi,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AssignedTo",
        to = "super::users::Column::Id",
        on_delete = "SetNull"
    )]
    Assignee,
}

impl Related<super::kpis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Kpi.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(string_value = "NOT_STARTED")]
    NotStarted,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "ACHIEVED")]
    Achieved,
}

impl ActiveModelBehavior for ActiveModel {}
