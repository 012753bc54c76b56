use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "kpis")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub kmi_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub department_id: Option<Uuid>,
    pub target: Option<f64>,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::kmis::Entity",
        from = "Column::KmiId",
        to = "super::kmis::Column::Id",
        on_delete = "Cascade"
    )]
    Kmi,
    #[sea_orm(
        belongs_to = "super::departments::Entity",
        from = "Column::DepartmentId",
        to = "super::departments::Column::Id",
        on_delete = "SetNull"
    )]
    Department,
    #[sea_orm(has_many = "super::kais::Entity")]
    Kais,
}

impl Related<super::kmis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Kmi.def()
    }
}

impl Related<super::kais::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Kais.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
