mod me;

use std::sync::Arc;

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Result, Schema,
};
use platform_api::ApiError;
use platform_db::DbPool;
use tracing::instrument;

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::routes::dashboard::{self, DashboardSummary};

pub use me::MePayload;

pub type SchemaType = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn build_schema(pool: DbPool, config: Arc<AppConfig>) -> SchemaType {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(pool)
        .data(config)
        .finish()
}

/// SDL for `schema:print`; needs no database.
pub fn schema_sdl() -> String {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .finish()
        .sdl()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The signed-in user with their profile and departments.
    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> Result<MePayload> {
        let viewer = viewer(ctx)?;
        let pool = ctx.data::<DbPool>()?;
        MePayload::load(pool, viewer).await.map_err(|err| err.extend())
    }

    /// Same summary as `GET /api/dashboard`.
    #[instrument(name = "graphql.dashboard", skip_all)]
    async fn dashboard(&self, ctx: &Context<'_>) -> Result<DashboardSummary> {
        let viewer = viewer(ctx)?;
        let pool = ctx.data::<DbPool>()?;
        let config = ctx.data::<Arc<AppConfig>>()?;
        dashboard::summary(pool, config, viewer)
            .await
            .map_err(|err| err.extend())
    }

    async fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

fn viewer<'a>(ctx: &Context<'a>) -> Result<&'a AuthUser> {
    ctx.data_opt::<AuthUser>()
        .ok_or_else(|| ApiError::Unauthorized.extend())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::schema_sdl;
    use crate::routes::testing::TestApp;

    #[test]
    fn sdl_lists_the_query_surface() {
        let sdl = schema_sdl();
        assert!(sdl.contains("dashboard: DashboardSummary!"));
        assert!(sdl.contains("me: MePayload!"));
        assert!(sdl.contains("version: String!"));
    }

    #[tokio::test]
    async fn me_and_dashboard_resolve_for_the_bearer() {
        let app = TestApp::new().await;
        let query = json!({
            "query": "{ me { email role fullName departments } dashboard { role leaveBalance { entitled } pendingApprovals } }"
        });
        let (status, body) = app
            .call(Method::POST, "/graphql", Some(&app.seeded.manager), Some(query))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["errors"].is_null(), "{body}");
        let data = &body["data"];
        assert_eq!(data["me"]["email"], app.seeded.manager.email.as_str());
        assert_eq!(data["me"]["role"], "MANAGER");
        assert_eq!(data["me"]["fullName"], "Marco Lead");
        assert_eq!(data["me"]["departments"], json!(["Engineering"]));
        assert_eq!(data["dashboard"]["role"], "MANAGER");
        assert_eq!(data["dashboard"]["pendingApprovals"], 0);
    }

    #[tokio::test]
    async fn anonymous_callers_get_unauthorized_errors() {
        let app = TestApp::new().await;
        let (status, body) = app
            .call(
                Method::POST,
                "/graphql",
                None,
                Some(json!({"query": "{ version me { email } }"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHORIZED");
    }
}
