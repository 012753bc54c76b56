use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use entity::{departments, refresh_tokens, staff, users};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authn::{TokenKind, decode_token, issue_access_token, issue_refresh_token};
use platform_authz::Role;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use time::Duration as TimeDuration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::users::UserView;
use super::{db_error, now};
use crate::auth::{AuthUser, load_user_role};
use crate::http::AppState;

pub(crate) const REFRESH_COOKIE: &str = "hr_refresh";
const MIN_PASSWORD_LEN: usize = 8;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Default, Deserialize)]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    expires_in: i64,
    user: UserView,
}

#[derive(Serialize)]
struct MeResponse {
    user: UserView,
    staff: Option<staff::Model>,
    departments: Vec<departments::Model>,
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[instrument(name = "auth.login", skip_all)]
async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(body): Json<LoginRequest>,
) -> ApiResult<(PrivateCookieJar, Json<TokenResponse>)> {
    let email = body.email.trim().to_lowercase();
    let user = users::Entity::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(&state.pool)
        .await
        .map_err(db_error)?;
    // Unknown email, wrong password and inactive accounts look the same.
    let Some(user) = user.filter(|u| u.is_active) else {
        info!(%email, "login rejected");
        return Err(ApiError::Unauthorized);
    };
    if !platform_authn::verify_password(&body.password, &user.password_hash) {
        info!(user_id = %user.id, "login rejected");
        return Err(ApiError::Unauthorized);
    }
    let (user, role) = load_user_role(&state.pool, user.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let response = issue_pair(&state, user, role).await?;
    info!(user_id = %response.user.id, role = %role, "user logged in");
    let jar = jar.add(refresh_cookie(&state, response.refresh_token.clone()));
    Ok((jar, Json(response)))
}

#[instrument(name = "auth.refresh", skip_all)]
async fn refresh(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    body: Bytes,
) -> ApiResult<(PrivateCookieJar, Json<TokenResponse>)> {
    let presented = presented_refresh_token(&jar, &body).ok_or(ApiError::Unauthorized)?;
    let claims = decode_token(&presented, TokenKind::Refresh, &state.config.tokens)
        .map_err(|_| ApiError::Unauthorized)?;
    let row = refresh_tokens::Entity::find_by_id(claims.jti)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .filter(|row| row.user_id == claims.sub)
        .ok_or(ApiError::Unauthorized)?;
    if row.revoked_at.is_some() {
        // A rotated token came back: treat the whole family as leaked.
        warn!(user_id = %row.user_id, token_id = %row.id, "revoked refresh token reused");
        revoke_all(&state.pool, row.user_id).await?;
        return Err(ApiError::Unauthorized);
    }
    if row.expires_at < now() {
        return Err(ApiError::Unauthorized);
    }
    let (user, role) = load_user_role(&state.pool, row.user_id)
        .await?
        .filter(|(user, _)| user.is_active)
        .ok_or(ApiError::Unauthorized)?;

    // Only one request may rotate a given token; a lost race counts as reuse.
    let claimed = refresh_tokens::Entity::update_many()
        .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(now()))
        .filter(refresh_tokens::Column::Id.eq(row.id))
        .filter(refresh_tokens::Column::RevokedAt.is_null())
        .exec(&state.pool)
        .await
        .map_err(db_error)?;
    if claimed.rows_affected != 1 {
        warn!(user_id = %row.user_id, token_id = %row.id, "refresh token rotated concurrently");
        revoke_all(&state.pool, row.user_id).await?;
        return Err(ApiError::Unauthorized);
    }

    let response = issue_pair(&state, user, role).await?;
    let jar = jar.add(refresh_cookie(&state, response.refresh_token.clone()));
    Ok((jar, Json(response)))
}

#[instrument(name = "auth.logout", skip_all)]
async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    body: Bytes,
) -> ApiResult<(PrivateCookieJar, StatusCode)> {
    if let Some(token) = presented_refresh_token(&jar, &body) {
        if let Ok(claims) = decode_token(&token, TokenKind::Refresh, &state.config.tokens) {
            refresh_tokens::Entity::update_many()
                .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(now()))
                .filter(refresh_tokens::Column::Id.eq(claims.jti))
                .filter(refresh_tokens::Column::RevokedAt.is_null())
                .exec(&state.pool)
                .await
                .map_err(db_error)?;
            info!(user_id = %claims.sub, "user logged out");
        }
    }
    let jar = jar.remove(Cookie::build((REFRESH_COOKIE, "")).path("/api/auth").build());
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn me(State(state): State<AppState>, viewer: AuthUser) -> ApiResult<Json<MeResponse>> {
    let (user, role) = load_user_role(&state.pool, viewer.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let profile = staff::Entity::find()
        .filter(staff::Column::UserId.eq(user.id))
        .one(&state.pool)
        .await
        .map_err(db_error)?;
    let departments = if viewer.departments.is_empty() {
        Vec::new()
    } else {
        departments::Entity::find()
            .filter(departments::Column::Id.is_in(viewer.departments.iter().copied()))
            .all(&state.pool)
            .await
            .map_err(db_error)?
    };
    Ok(Json(MeResponse {
        user: UserView::new(user, role),
        staff: profile,
        departments,
    }))
}

#[instrument(name = "auth.change_password", skip_all, fields(user_id = %viewer.id))]
async fn change_password(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let mut validator = Validator::new();
    validator.check(
        body.new_password.chars().count() >= MIN_PASSWORD_LEN,
        "new_password",
        "must be at least 8 characters",
    );
    validator.check(
        body.new_password != body.current_password,
        "new_password",
        "must differ from the current password",
    );
    validator.finish()?;

    let user = users::Entity::find_by_id(viewer.id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::Unauthorized)?;
    if !platform_authn::verify_password(&body.current_password, &user.password_hash) {
        return Err(ApiError::invalid("current_password", "is incorrect"));
    }
    let hash = platform_authn::hash_password(&body.new_password)
        .map_err(|err| ApiError::internal(err.into()))?;
    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(hash);
    active.updated_at = Set(now());
    active.update(&state.pool).await.map_err(db_error)?;
    revoke_all(&state.pool, viewer.id).await?;
    info!("password changed; refresh tokens revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Persists a refresh-token row and issues the matching token pair.
async fn issue_pair(state: &AppState, user: users::Model, role: Role) -> ApiResult<TokenResponse> {
    let tokens = &state.config.tokens;
    let token_id = Uuid::new_v4();
    let refresh = issue_refresh_token(user.id, token_id, role, tokens)
        .map_err(|err| ApiError::internal(err.into()))?;
    let access =
        issue_access_token(user.id, role, tokens).map_err(|err| ApiError::internal(err.into()))?;
    refresh_tokens::ActiveModel {
        id: Set(token_id),
        user_id: Set(user.id),
        expires_at: Set(refresh.expires_at.into()),
        revoked_at: Set(None),
        created_at: Set(now()),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    Ok(TokenResponse {
        access_token: access.token,
        refresh_token: refresh.token,
        token_type: "Bearer",
        expires_in: tokens.access_ttl_minutes * 60,
        user: UserView::new(user, role),
    })
}

pub(crate) async fn revoke_all<C: ConnectionTrait>(db: &C, user_id: Uuid) -> ApiResult<()> {
    refresh_tokens::Entity::update_many()
        .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(now()))
        .filter(refresh_tokens::Column::UserId.eq(user_id))
        .filter(refresh_tokens::Column::RevokedAt.is_null())
        .exec(db)
        .await
        .map_err(db_error)?;
    Ok(())
}

/// Body token wins over the cookie.
fn presented_refresh_token(jar: &PrivateCookieJar, body: &[u8]) -> Option<String> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(body)
            .unwrap_or_default()
            .refresh_token
            .filter(|t| !t.trim().is_empty())
    };
    from_body.or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
}

fn refresh_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path("/api/auth")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(TimeDuration::days(state.config.tokens.refresh_ttl_days))
        .build()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use serde_json::json;

    use crate::routes::testing::{PASSWORD, TestApp, read_json};

    async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, serde_json::Value, Option<String>) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"email": email, "password": password}).to_string()))
            .unwrap();
        let response = app.send(request).await;
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        (status, read_json(response).await, cookie)
    }

    #[tokio::test]
    async fn login_issues_tokens_and_cookie() {
        let app = TestApp::new().await;
        let email = app.seeded.employee.email.to_uppercase();
        let (status, body, cookie) = login(&app, &email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 900);
        assert_eq!(body["user"]["role"], "EMPLOYEE");
        assert!(body["user"].get("password_hash").is_none());
        assert!(cookie.unwrap().starts_with("hr_refresh="));

        let access = body["access_token"].as_str().unwrap();
        let request = Request::builder()
            .uri("/api/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let me = read_json(response).await;
        assert_eq!(me["user"]["email"], app.seeded.employee.email);
        assert_eq!(me["staff"]["first_name"], "Eli");
        assert_eq!(me["departments"][0]["name"], "Engineering");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = TestApp::new().await;
        let (status, body, _) = login(&app, &app.seeded.employee.email, "nope-nope").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_reuse() {
        let app = TestApp::new().await;
        let (_, body, _) = login(&app, &app.seeded.manager.email, PASSWORD).await;
        let first = body["refresh_token"].as_str().unwrap().to_string();

        let (status, rotated) = app
            .call(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({"refresh_token": first})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let second = rotated["refresh_token"].as_str().unwrap().to_string();
        assert_ne!(first, second);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({"refresh_token": first})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Reuse revoked the whole family, including the rotated token.
        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({"refresh_token": second})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn concurrent_refreshes_rotate_only_once() {
        let app = TestApp::new().await;
        let (_, body, _) = login(&app, &app.seeded.employee.email, PASSWORD).await;
        let token = body["refresh_token"].as_str().unwrap().to_string();
        let refresh = || {
            app.call(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({"refresh_token": token})),
            )
        };
        let ((first, _), (second, _)) = tokio::join!(refresh(), refresh());
        let mut statuses = [first, second];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);
    }

    #[tokio::test]
    async fn refresh_falls_back_to_the_cookie() {
        let app = TestApp::new().await;
        let (_, _, cookie) = login(&app, &app.seeded.hr.email, PASSWORD).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/refresh")
            .header(header::COOKIE, cookie.unwrap())
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_revokes_the_refresh_token() {
        let app = TestApp::new().await;
        let (_, body, _) = login(&app, &app.seeded.hr.email, PASSWORD).await;
        let token = body["refresh_token"].as_str().unwrap().to_string();
        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/logout",
                None,
                Some(json!({"refresh_token": token})),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({"refresh_token": token})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn change_password_requires_the_current_one() {
        let app = TestApp::new().await;
        let employee = app.seeded.employee.clone();
        let (status, body) = app
            .post(
                "/api/auth/change-password",
                &employee,
                json!({"current_password": "guess-guess", "new_password": "brand new secret"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"]["current_password"], "is incorrect");

        let (status, _) = app
            .post(
                "/api/auth/change-password",
                &employee,
                json!({"current_password": PASSWORD, "new_password": "brand new secret"}),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = login(&app, &employee.email, "brand new secret").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_or_garbage_tokens_are_rejected() {
        let app = TestApp::new().await;
        let (status, _) = app.call(Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let request = Request::builder()
            .uri("/api/auth/me")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);
    }
}
