use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use entity::{associations, designations, users};
use platform_api::{ApiError, ApiResult};
use platform_authz::groups;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::departments::find_department;
use super::{db_error, now};
use crate::auth::AuthUser;
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_associations).post(create_association))
        .route("/{id}", delete(delete_association))
}

#[derive(Debug, Default, Deserialize)]
struct AssociationFilter {
    user_id: Option<Uuid>,
    department_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct NewAssociation {
    user_id: Uuid,
    department_id: Uuid,
    designation_id: Option<Uuid>,
}

async fn list_associations(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Query(filter): Query<AssociationFilter>,
) -> ApiResult<Json<Vec<associations::Model>>> {
    let mut query = associations::Entity::find();
    if let Some(user_id) = filter.user_id {
        query = query.filter(associations::Column::UserId.eq(user_id));
    }
    if let Some(department_id) = filter.department_id {
        query = query.filter(associations::Column::DepartmentId.eq(department_id));
    }
    let rows = query.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

#[instrument(name = "associations.create", skip_all, fields(actor = %viewer.id))]
async fn create_association(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<NewAssociation>,
) -> ApiResult<(StatusCode, Json<associations::Model>)> {
    viewer.require(groups::ADMINISTRATION, "place users in departments")?;
    users::Entity::find_by_id(body.user_id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("user"))?;
    find_department(&state, body.department_id).await?;
    if let Some(designation_id) = body.designation_id {
        let designation = designations::Entity::find_by_id(designation_id)
            .one(&state.pool)
            .await
            .map_err(db_error)?
            .ok_or(ApiError::NotFound("designation"))?;
        if designation
            .department_id
            .is_some_and(|dept| dept != body.department_id)
        {
            return Err(ApiError::invalid(
                "designation_id",
                "belongs to a different department",
            ));
        }
    }
    let model = associations::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(body.user_id),
        department_id: Set(body.department_id),
        designation_id: Set(body.designation_id),
        created_at: Set(now()),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(
        user_id = %model.user_id,
        department_id = %model.department_id,
        "user placed in department"
    );
    Ok((StatusCode::CREATED, Json(model)))
}

async fn delete_association(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    viewer.require(groups::ADMINISTRATION, "remove department placements")?;
    associations::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("association"))?
        .delete(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}
