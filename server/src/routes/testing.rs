//! In-memory SQLite app for router tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use axum_extra::extract::cookie::Key;
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use platform_authn::TokenConfig;
use platform_db::DbPool;
use products_hr::RoutingPolicy;
use sea_orm::Database;
use serde_json::Value;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::graphql;
use crate::http::{AppState, build_router};
use crate::seed::{SeedReport, SeededUser, seed_demo};

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub seeded: SeedReport,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        tokens: TokenConfig {
            secret: "test-secret-with-at-least-32-bytes!!".into(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        },
        cookie_key: Key::generate(),
        cors_allowed_origins: vec!["http://localhost:5173".into()],
        default_entitled_days: 24,
        routing: RoutingPolicy::default(),
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&pool, None).await.unwrap();
        let seeded = seed_demo(&pool, PASSWORD).await.unwrap().unwrap();
        let config = Arc::new(test_config());
        let schema = graphql::build_schema(pool.clone(), config.clone());
        let router = build_router(AppState {
            pool: pool.clone(),
            schema,
            config: config.clone(),
        });
        Self {
            router,
            pool,
            config,
            seeded,
        }
    }

    pub fn token(&self, user: &SeededUser) -> String {
        platform_authn::issue_access_token(user.id, user.role, &self.config.tokens)
            .unwrap()
            .token
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        user: Option<&SeededUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.send(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    pub async fn get(&self, uri: &str, user: &SeededUser) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: &SeededUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &SeededUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(user), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, user: &SeededUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &SeededUser) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(user), None).await
    }
}

/// Empty bodies read as `Value::Null`.
pub async fn read_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}
