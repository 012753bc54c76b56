use async_graphql::SimpleObject;
use entity::{departments, staff};
use platform_api::ApiResult;
use platform_db::DbPool;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::routes::db_error;

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub full_name: Option<String>,
    /// Names of the departments the user is placed in.
    pub departments: Vec<String>,
}

impl MePayload {
    pub async fn load(pool: &DbPool, viewer: &AuthUser) -> ApiResult<Self> {
        let profile = staff::Entity::find()
            .filter(staff::Column::UserId.eq(viewer.id))
            .one(pool)
            .await
            .map_err(db_error)?;
        let departments = if viewer.departments.is_empty() {
            Vec::new()
        } else {
            departments::Entity::find()
                .filter(departments::Column::Id.is_in(viewer.departments.iter().copied()))
                .order_by_asc(departments::Column::Name)
                .all(pool)
                .await
                .map_err(db_error)?
                .into_iter()
                .map(|dept| dept.name)
                .collect()
        };
        Ok(Self {
            id: viewer.id,
            email: viewer.email.clone(),
            role: viewer.role.to_string(),
            full_name: profile.map(|p| format!("{} {}", p.first_name, p.last_name)),
            departments,
        })
    }
}
