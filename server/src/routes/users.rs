use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use entity::{roles, users};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authz::{Role, groups};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::auth::revoke_all;
use super::{Page, db_error, filter_text, now};
use crate::auth::{AuthUser, load_user_role, role_id};
use crate::http::AppState;

const MIN_PASSWORD_LEN: usize = 8;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{id}",
            get(get_user).patch(update_user).delete(deactivate_user),
        )
}

pub fn role_routes() -> Router<AppState> {
    Router::new().route("/", get(list_roles))
}

/// Public shape of a user account.
#[derive(Clone, Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl UserView {
    pub fn new(model: users::Model, role: Role) -> Self {
        Self {
            id: model.id,
            email: model.email,
            role,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct UserFilter {
    q: Option<String>,
    role: Option<String>,
    active: Option<bool>,
    limit: Option<u64>,
    offset: Option<u64>,
}

#[derive(Deserialize)]
struct NewUser {
    email: String,
    password: String,
    role: String,
}

#[derive(Deserialize)]
struct UserPatch {
    email: Option<String>,
    role: Option<String>,
    is_active: Option<bool>,
}

#[instrument(name = "users.list", skip_all)]
async fn list_users(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<Vec<UserView>>> {
    viewer.require(groups::ADMINISTRATION, "list users")?;
    let roles = roles::Entity::find()
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    let mut query = users::Entity::find().order_by_asc(users::Column::Email);
    if let Some(q) = filter_text(filter.q.as_deref()) {
        query = query.filter(users::Column::Email.contains(q.to_lowercase()));
    }
    if let Some(role) = filter_text(filter.role.as_deref()) {
        let role = Role::parse(&role)?;
        let id = lookup_role_id(&roles, role)?;
        query = query.filter(users::Column::RoleId.eq(id));
    }
    if let Some(active) = filter.active {
        query = query.filter(users::Column::IsActive.eq(active));
    }
    let page = Page {
        limit: filter.limit,
        offset: filter.offset,
    };
    let rows = query
        .limit(page.limit())
        .offset(page.offset())
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    rows.into_iter()
        .map(|user| {
            let role = lookup_role(&roles, user.role_id)?;
            Ok(UserView::new(user, role))
        })
        .collect::<ApiResult<Vec<_>>>()
        .map(Json)
}

async fn get_user(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserView>> {
    if id != viewer.id {
        viewer.require(groups::ADMINISTRATION, "view users")?;
    }
    let (user, role) = load_user_role(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(UserView::new(user, role)))
}

#[instrument(name = "users.create", skip_all, fields(actor = %viewer.id))]
async fn create_user(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    viewer.require(groups::ADMINISTRATION, "create users")?;
    let mut validator = Validator::new();
    let email = normalize_email(&mut validator, &body.email);
    validator.check(
        body.password.chars().count() >= MIN_PASSWORD_LEN,
        "password",
        "must be at least 8 characters",
    );
    let role = Role::parse(&body.role).ok();
    validator.check(role.is_some(), "role", "is not a known role");
    validator.finish()?;
    let role = role.ok_or_else(|| ApiError::invalid("role", "is not a known role"))?;
    ensure_may_grant(&viewer, role)?;

    let hash = platform_authn::hash_password(&body.password)
        .map_err(|err| ApiError::internal(err.into()))?;
    let stamp = now();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(hash),
        role_id: Set(role_id(&state.pool, role).await?),
        is_active: Set(true),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(user_id = %user.id, %role, "user created");
    Ok((StatusCode::CREATED, Json(UserView::new(user, role))))
}

#[instrument(name = "users.update", skip_all, fields(actor = %viewer.id, user_id = %id))]
async fn update_user(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UserPatch>,
) -> ApiResult<Json<UserView>> {
    viewer.require(groups::ADMINISTRATION, "update users")?;
    let (user, current_role) = load_user_role(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    // Only Management may touch Management accounts.
    ensure_may_grant(&viewer, current_role)?;

    let mut validator = Validator::new();
    let email = body
        .email
        .as_deref()
        .map(|email| normalize_email(&mut validator, email));
    let role = match body.role.as_deref() {
        Some(raw) => {
            let parsed = Role::parse(raw).ok();
            validator.check(parsed.is_some(), "role", "is not a known role");
            parsed
        }
        None => None,
    };
    if id == viewer.id {
        validator.check(body.is_active != Some(false), "is_active", "cannot deactivate yourself");
        validator.check(
            role.is_none_or(|r| r == current_role),
            "role",
            "cannot change your own role",
        );
    }
    validator.finish()?;

    let mut active: users::ActiveModel = user.into();
    if let Some(email) = email {
        active.email = Set(email);
    }
    let mut new_role = current_role;
    if let Some(role) = role {
        ensure_may_grant(&viewer, role)?;
        active.role_id = Set(role_id(&state.pool, role).await?);
        new_role = role;
    }
    if let Some(is_active) = body.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(now());
    let updated = active.update(&state.pool).await.map_err(db_error)?;
    if !updated.is_active || new_role != current_role {
        revoke_all(&state.pool, updated.id).await?;
    }
    info!(role = %new_role, is_active = updated.is_active, "user updated");
    Ok(Json(UserView::new(updated, new_role)))
}

#[instrument(name = "users.deactivate", skip_all, fields(actor = %viewer.id, user_id = %id))]
async fn deactivate_user(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    viewer.require(groups::ADMINISTRATION, "deactivate users")?;
    if id == viewer.id {
        return Err(ApiError::bad_request("cannot deactivate yourself"));
    }
    let (user, role) = load_user_role(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    ensure_may_grant(&viewer, role)?;
    let mut active: users::ActiveModel = user.into();
    active.is_active = Set(false);
    active.updated_at = Set(now());
    active.update(&state.pool).await.map_err(db_error)?;
    revoke_all(&state.pool, id).await?;
    info!("user deactivated");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_roles(
    State(state): State<AppState>,
    _viewer: AuthUser,
) -> ApiResult<Json<Vec<roles::Model>>> {
    let rows = roles::Entity::find()
        .order_by_asc(roles::Column::Id)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(rows))
}

fn ensure_may_grant(viewer: &AuthUser, role: Role) -> ApiResult<()> {
    if role == Role::Management && viewer.role != Role::Management {
        return Err(ApiError::forbidden("only Management may manage Management accounts"));
    }
    Ok(())
}

fn normalize_email(validator: &mut Validator, raw: &str) -> String {
    let email = raw.trim().to_lowercase();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    validator.check(well_formed, "email", "must be a valid email address");
    validator.check(email.len() <= 255, "email", "must be at most 255 characters");
    email
}

fn lookup_role(roles: &[roles::Model], id: i32) -> ApiResult<Role> {
    let row = roles
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("dangling role id {id}")))?;
    Role::parse(&row.name).map_err(|err| ApiError::internal(err.into()))
}

fn lookup_role_id(roles: &[roles::Model], role: Role) -> ApiResult<i32> {
    roles
        .iter()
        .find(|r| r.name == role.as_str())
        .map(|r| r.id)
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("role {role} is not seeded")))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::testing::TestApp;

    #[tokio::test]
    async fn hr_creates_and_filters_users() {
        let app = TestApp::new().await;
        let hr = app.seeded.hr.clone();
        let (status, created) = app
            .post(
                "/api/users",
                &hr,
                json!({"email": " New.Hire@Example.test ", "password": "long enough", "role": "employee"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["email"], "new.hire@example.test");
        assert_eq!(created["role"], "EMPLOYEE");

        let (status, listed) = app.get("/api/users?q=new.hire", &hr).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (_, managers) = app.get("/api/users?role=MANAGER", &hr).await;
        assert_eq!(managers.as_array().unwrap().len(), 1);
        assert_eq!(managers[0]["email"], app.seeded.manager.email);

        let (status, _) = app
            .post(
                "/api/users",
                &hr,
                json!({"email": "new.hire@example.test", "password": "long enough", "role": "EMPLOYEE"}),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_reports_every_invalid_field() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post(
                "/api/users",
                &app.seeded.hr,
                json!({"email": "nope", "password": "short", "role": "CEO"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION");
        assert!(body["fields"]["email"].is_string());
        assert!(body["fields"]["password"].is_string());
        assert!(body["fields"]["role"].is_string());
    }

    #[tokio::test]
    async fn employees_cannot_manage_users() {
        let app = TestApp::new().await;
        let (status, body) = app.get("/api/users", &app.seeded.employee).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
        let (status, roles) = app.get("/api/roles", &app.seeded.employee).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(roles.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn hr_cannot_grant_management() {
        let app = TestApp::new().await;
        let uri = format!("/api/users/{}", app.seeded.employee.id);
        let (status, _) = app
            .patch(&uri, &app.seeded.hr, json!({"role": "MANAGEMENT"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = app
            .patch(&uri, &app.seeded.management, json!({"role": "MANAGER"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "MANAGER");
    }

    #[tokio::test]
    async fn deactivated_users_lose_access() {
        let app = TestApp::new().await;
        let employee = app.seeded.employee.clone();
        let (status, _) = app
            .delete(&format!("/api/users/{}", employee.id), &app.seeded.hr)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.get("/api/auth/me", &employee).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, inactive) = app.get("/api/users?active=false", &app.seeded.hr).await;
        assert_eq!(inactive[0]["id"], employee.id.to_string());
    }
}
