use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use entity::{staff, users};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authz::{Role, groups};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{db_error, now, today};
use crate::auth::{AuthUser, members_of};
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_staff).post(create_staff))
        .route("/me", get(my_profile))
        .route("/{id}", get(get_staff).put(update_staff))
}

#[derive(Deserialize)]
struct StaffInput {
    user_id: Option<Uuid>,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
    date_of_joining: NaiveDate,
    address: Option<String>,
}

struct ValidStaff {
    first_name: String,
    last_name: String,
    phone: Option<String>,
    address: Option<String>,
}

async fn list_staff(
    State(state): State<AppState>,
    viewer: AuthUser,
) -> ApiResult<Json<Vec<staff::Model>>> {
    viewer.require(groups::PEOPLE_LEADS, "list staff")?;
    let mut query = staff::Entity::find()
        .order_by_asc(staff::Column::LastName)
        .order_by_asc(staff::Column::FirstName);
    if viewer.role == Role::Manager {
        let members = members_of(&state.pool, &viewer.departments).await?;
        query = query.filter(staff::Column::UserId.is_in(members));
    }
    let rows = query.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

async fn my_profile(
    State(state): State<AppState>,
    viewer: AuthUser,
) -> ApiResult<Json<staff::Model>> {
    staff::Entity::find()
        .filter(staff::Column::UserId.eq(viewer.id))
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .map(Json)
        .ok_or(ApiError::NotFound("staff profile"))
}

async fn get_staff(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<staff::Model>> {
    let profile = find_staff(&state, id).await?;
    if !viewer.can_view_user(&state.pool, profile.user_id).await? {
        return Err(ApiError::forbidden("not allowed to view this profile"));
    }
    Ok(Json(profile))
}

#[instrument(name = "staff.create", skip_all, fields(actor = %viewer.id))]
async fn create_staff(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<StaffInput>,
) -> ApiResult<(StatusCode, Json<staff::Model>)> {
    viewer.require(&[Role::Hr], "create staff profiles")?;
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::invalid("user_id", "is required"))?;
    let valid = validate(&body)?;
    users::Entity::find_by_id(user_id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("user"))?;
    let stamp = now();
    let model = staff::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        first_name: Set(valid.first_name),
        last_name: Set(valid.last_name),
        phone: Set(valid.phone),
        date_of_birth: Set(body.date_of_birth),
        date_of_joining: Set(body.date_of_joining),
        address: Set(valid.address),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(staff_id = %model.id, %user_id, "staff profile created");
    Ok((StatusCode::CREATED, Json(model)))
}

async fn update_staff(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StaffInput>,
) -> ApiResult<Json<staff::Model>> {
    viewer.require(&[Role::Hr], "update staff profiles")?;
    let valid = validate(&body)?;
    let existing = find_staff(&state, id).await?;
    if body.user_id.is_some_and(|user_id| user_id != existing.user_id) {
        return Err(ApiError::invalid("user_id", "cannot be changed"));
    }
    let mut active: staff::ActiveModel = existing.into();
    active.first_name = Set(valid.first_name);
    active.last_name = Set(valid.last_name);
    active.phone = Set(valid.phone);
    active.date_of_birth = Set(body.date_of_birth);
    active.date_of_joining = Set(body.date_of_joining);
    active.address = Set(valid.address);
    active.updated_at = Set(now());
    let model = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(model))
}

fn validate(body: &StaffInput) -> ApiResult<ValidStaff> {
    let mut validator = Validator::new();
    let first_name = validator.required_text("first_name", &body.first_name, 100);
    let last_name = validator.required_text("last_name", &body.last_name, 100);
    let phone = validator.optional_text("phone", body.phone.as_deref(), 32);
    let address = validator.optional_text("address", body.address.as_deref(), 500);
    if let Some(dob) = body.date_of_birth {
        validator.check(dob < today(), "date_of_birth", "must be in the past");
        validator.check(
            dob < body.date_of_joining,
            "date_of_joining",
            "must be after the date of birth",
        );
    }
    validator.finish()?;
    Ok(ValidStaff {
        first_name,
        last_name,
        phone,
        address,
    })
}

async fn find_staff(state: &AppState, id: Uuid) -> ApiResult<staff::Model> {
    staff::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("staff profile"))
}
