use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use entity::{associations, departments, designations, staff, users};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authz::{Role, groups};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{db_error, now};
use crate::auth::{AuthUser, load_user_role};
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_departments).post(create_department))
        .route(
            "/{id}",
            get(get_department)
                .put(update_department)
                .delete(delete_department),
        )
        .route("/{id}/members", get(list_members))
}

pub fn designation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_designations).post(create_designation))
        .route(
            "/{id}",
            get(get_designation)
                .put(update_designation)
                .delete(delete_designation),
        )
}

#[derive(Deserialize)]
struct DepartmentInput {
    name: String,
    description: Option<String>,
}

#[derive(Deserialize)]
struct DesignationInput {
    title: String,
    department_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
struct DesignationFilter {
    department_id: Option<Uuid>,
}

#[derive(Serialize)]
struct Member {
    user_id: Uuid,
    email: String,
    role: Role,
    full_name: Option<String>,
    designation: Option<String>,
}

async fn list_departments(
    State(state): State<AppState>,
    _viewer: AuthUser,
) -> ApiResult<Json<Vec<departments::Model>>> {
    let rows = departments::Entity::find()
        .order_by_asc(departments::Column::Name)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(rows))
}

async fn get_department(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<departments::Model>> {
    find_department(&state, id).await.map(Json)
}

#[instrument(name = "departments.create", skip_all, fields(actor = %viewer.id))]
async fn create_department(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<DepartmentInput>,
) -> ApiResult<(StatusCode, Json<departments::Model>)> {
    viewer.require(groups::ADMINISTRATION, "create departments")?;
    let (name, description) = validate_department(&body)?;
    let stamp = now();
    let model = departments::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(description),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(department_id = %model.id, "department created");
    Ok((StatusCode::CREATED, Json(model)))
}

async fn update_department(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DepartmentInput>,
) -> ApiResult<Json<departments::Model>> {
    viewer.require(groups::ADMINISTRATION, "update departments")?;
    let (name, description) = validate_department(&body)?;
    let mut active: departments::ActiveModel = find_department(&state, id).await?.into();
    active.name = Set(name);
    active.description = Set(description);
    active.updated_at = Set(now());
    let model = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(model))
}

#[instrument(name = "departments.delete", skip_all, fields(actor = %viewer.id, department_id = %id))]
async fn delete_department(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    viewer.require(groups::ADMINISTRATION, "delete departments")?;
    let department = find_department(&state, id).await?;
    let members = associations::Entity::find()
        .filter(associations::Column::DepartmentId.eq(id))
        .count(&state.pool)
        .await
        .map_err(db_error)?;
    if members > 0 {
        return Err(ApiError::bad_request(format!(
            "department still has {members} member(s)"
        )));
    }
    department.delete(&state.pool).await.map_err(db_error)?;
    info!("department deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Member>>> {
    find_department(&state, id).await?;
    let placements = associations::Entity::find()
        .filter(associations::Column::DepartmentId.eq(id))
        .find_also_related(designations::Entity)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    let mut members = Vec::with_capacity(placements.len());
    for (placement, designation) in placements {
        let Some((user, role)) = load_user_role(&state.pool, placement.user_id).await? else {
            continue;
        };
        let profile = staff::Entity::find()
            .filter(staff::Column::UserId.eq(user.id))
            .one(&state.pool)
            .await
            .map_err(db_error)?;
        members.push(member(user, role, profile, designation));
    }
    members.sort_by(|a, b| a.email.cmp(&b.email));
    Ok(Json(members))
}

fn member(
    user: users::Model,
    role: Role,
    profile: Option<staff::Model>,
    designation: Option<designations::Model>,
) -> Member {
    Member {
        user_id: user.id,
        email: user.email,
        role,
        full_name: profile.map(|p| p.full_name()),
        designation: designation.map(|d| d.title),
    }
}

async fn list_designations(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Query(filter): Query<DesignationFilter>,
) -> ApiResult<Json<Vec<designations::Model>>> {
    let mut query = designations::Entity::find().order_by_asc(designations::Column::Title);
    if let Some(department_id) = filter.department_id {
        query = query.filter(designations::Column::DepartmentId.eq(department_id));
    }
    let rows = query.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

async fn get_designation(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<designations::Model>> {
    find_designation(&state, id).await.map(Json)
}

async fn create_designation(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<DesignationInput>,
) -> ApiResult<(StatusCode, Json<designations::Model>)> {
    viewer.require(groups::ADMINISTRATION, "create designations")?;
    let title = validate_designation(&state, &body).await?;
    let stamp = now();
    let model = designations::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        department_id: Set(body.department_id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(model)))
}

async fn update_designation(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DesignationInput>,
) -> ApiResult<Json<designations::Model>> {
    viewer.require(groups::ADMINISTRATION, "update designations")?;
    let title = validate_designation(&state, &body).await?;
    let mut active: designations::ActiveModel = find_designation(&state, id).await?.into();
    active.title = Set(title);
    active.department_id = Set(body.department_id);
    active.updated_at = Set(now());
    let model = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(model))
}

async fn delete_designation(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    viewer.require(groups::ADMINISTRATION, "delete designations")?;
    find_designation(&state, id)
        .await?
        .delete(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_department(body: &DepartmentInput) -> ApiResult<(String, Option<String>)> {
    let mut validator = Validator::new();
    let name = validator.required_text("name", &body.name, 120);
    let description = validator.optional_text("description", body.description.as_deref(), 1000);
    validator.finish()?;
    Ok((name, description))
}

async fn validate_designation(state: &AppState, body: &DesignationInput) -> ApiResult<String> {
    let mut validator = Validator::new();
    let title = validator.required_text("title", &body.title, 120);
    validator.finish()?;
    if let Some(department_id) = body.department_id {
        find_department(state, department_id).await?;
    }
    Ok(title)
}

pub(crate) async fn find_department(state: &AppState, id: Uuid) -> ApiResult<departments::Model> {
    departments::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("department"))
}

async fn find_designation(state: &AppState, id: Uuid) -> ApiResult<designations::Model> {
    designations::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("designation"))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::testing::TestApp;

    #[tokio::test]
    async fn departments_in_use_cannot_be_deleted() {
        let app = TestApp::new().await;
        let uri = format!("/api/departments/{}", app.seeded.engineering);
        let (status, body) = app.delete(&uri, &app.seeded.hr).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let (status, created) = app
            .post(
                "/api/departments",
                &app.seeded.management,
                json!({"name": "Finance", "description": "  "}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["description"].is_null());
        let uri = format!("/api/departments/{}", created["id"].as_str().unwrap());
        let (status, _) = app.delete(&uri, &app.seeded.hr).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.get(&uri, &app.seeded.hr).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_names_conflict_and_employees_are_read_only() {
        let app = TestApp::new().await;
        let (status, _) = app
            .post("/api/departments", &app.seeded.hr, json!({"name": "Engineering"}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = app
            .post("/api/departments", &app.seeded.employee, json!({"name": "Skunkworks"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, list) = app.get("/api/departments", &app.seeded.employee).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn members_include_designations() {
        let app = TestApp::new().await;
        let uri = format!("/api/departments/{}/members", app.seeded.engineering);
        let (status, members) = app.get(&uri, &app.seeded.employee).await;
        assert_eq!(status, StatusCode::OK);
        let members = members.as_array().unwrap();
        assert_eq!(members.len(), 2);
        let employee = members
            .iter()
            .find(|m| m["email"] == app.seeded.employee.email.as_str())
            .unwrap();
        assert_eq!(employee["designation"], "Software Engineer");
        assert_eq!(employee["full_name"], "Eli Engineer");
    }

    #[tokio::test]
    async fn designations_filter_by_department() {
        let app = TestApp::new().await;
        let (status, _) = app
            .post(
                "/api/designations",
                &app.seeded.hr,
                json!({"title": "Recruiter", "department_id": app.seeded.people_ops}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/designations?department_id={}", app.seeded.people_ops);
        let (_, list) = app.get(&uri, &app.seeded.employee).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["title"], "Recruiter");
    }
}
