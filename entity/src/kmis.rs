use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Key Management Indicator, the top of the KMI -> KPI -> KAI cascade.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "kmis")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub year: i32,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::kpis::Entity")]
    Kpis,
}

impl Related<super::kpis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Kpis.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
