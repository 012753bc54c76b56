//! Bearer-token authentication for REST handlers and the GraphQL endpoint.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use entity::{associations, roles, users};
use platform_api::{ApiError, ApiResult};
use platform_authz::Role;
use products_hr::Party;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::http::AppState;
use crate::routes::db_error;

/// The authenticated caller, with the departments they are placed in.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub departments: Vec<Uuid>,
}

impl AuthUser {
    pub fn require(&self, allowed: &[Role], action: &str) -> ApiResult<()> {
        platform_authz::require_any(self.role, allowed, action).map_err(Into::into)
    }

    pub fn party(&self) -> Party<'_, Uuid> {
        Party {
            id: self.id,
            role: self.role,
            departments: &self.departments,
        }
    }

    pub fn shares_department(&self, other: &[Uuid]) -> bool {
        self.departments.iter().any(|dept| other.contains(dept))
    }

    /// HR and Management see everyone; Managers see people in their departments.
    pub async fn can_view_user<C: ConnectionTrait>(&self, db: &C, user_id: Uuid) -> ApiResult<bool> {
        if user_id == self.id || self.role.is_org_wide() {
            return Ok(true);
        }
        if self.role != Role::Manager {
            return Ok(false);
        }
        let theirs = departments_of(db, user_id).await?;
        Ok(self.shares_department(&theirs))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers).await
    }
}

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<AuthUser> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    let subject = platform_authn::verify_access_token(token, &state.config.tokens).map_err(|err| {
        tracing::debug!(error = %err, "access token rejected");
        ApiError::Unauthorized
    })?;
    let (user, role) = load_user_role(&state.pool, subject.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !user.is_active {
        return Err(ApiError::Unauthorized);
    }
    let departments = departments_of(&state.pool, user.id).await?;
    Ok(AuthUser {
        id: user.id,
        email: user.email,
        role,
        departments,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Loads a user together with its parsed role.
pub async fn load_user_role<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> ApiResult<Option<(users::Model, Role)>> {
    let found = users::Entity::find_by_id(user_id)
        .find_also_related(roles::Entity)
        .one(db)
        .await
        .map_err(db_error)?;
    let Some((user, Some(role))) = found else {
        return Ok(None);
    };
    let role = Role::parse(&role.name)
        .map_err(|err| ApiError::internal(anyhow::anyhow!("user {} has {err}", user.id)))?;
    Ok(Some((user, role)))
}

pub async fn departments_of<C: ConnectionTrait>(db: &C, user_id: Uuid) -> ApiResult<Vec<Uuid>> {
    associations::Entity::find()
        .select_only()
        .column(associations::Column::DepartmentId)
        .filter(associations::Column::UserId.eq(user_id))
        .into_tuple::<Uuid>()
        .all(db)
        .await
        .map_err(db_error)
}

/// Users placed in any of `departments`.
pub async fn members_of<C: ConnectionTrait>(db: &C, departments: &[Uuid]) -> ApiResult<Vec<Uuid>> {
    if departments.is_empty() {
        return Ok(Vec::new());
    }
    let mut ids = associations::Entity::find()
        .select_only()
        .column(associations::Column::UserId)
        .filter(associations::Column::DepartmentId.is_in(departments.iter().copied()))
        .into_tuple::<Uuid>()
        .all(db)
        .await
        .map_err(db_error)?;
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Whether an active Manager is placed in any of `departments`.
pub async fn has_active_manager<C: ConnectionTrait>(db: &C, departments: &[Uuid]) -> ApiResult<bool> {
    let members = members_of(db, departments).await?;
    if members.is_empty() {
        return Ok(false);
    }
    let manager = role_id(db, Role::Manager).await?;
    let count = users::Entity::find()
        .filter(users::Column::Id.is_in(members))
        .filter(users::Column::RoleId.eq(manager))
        .filter(users::Column::IsActive.eq(true))
        .count(db)
        .await
        .map_err(db_error)?;
    Ok(count > 0)
}

pub async fn role_id<C: ConnectionTrait>(db: &C, role: Role) -> ApiResult<i32> {
    roles::Entity::find()
        .filter(roles::Column::Name.eq(role.as_str()))
        .one(db)
        .await
        .map_err(db_error)?
        .map(|row| row.id)
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("role {role} is not seeded")))
}
