//! Role-shaped landing summary, served over REST and GraphQL.

use std::collections::HashMap;

use async_graphql::SimpleObject;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Datelike;
use entity::{associations, departments, leaves, tasks, tickets};
use platform_api::ApiResult;
use platform_authz::Role;
use platform_db::DbPool;
use products_hr::LeaveBalance;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use super::leaves::{load_balance, pending_approvals};
use super::{db_error, today};
use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

#[derive(Clone, Debug, Serialize, SimpleObject)]
pub struct DashboardSummary {
    pub role: String,
    pub leave_balance: BalanceSummary,
    pub pending_leaves: i64,
    pub open_tasks: i64,
    pub open_tickets: i64,
    /// Managers and Management only.
    pub pending_approvals: Option<i64>,
    /// HR and Management only.
    pub headcount: Option<Vec<DepartmentHeadcount>>,
    /// HR and Management only: open tickets across the organisation.
    pub ticket_queue: Option<i64>,
}

#[derive(Clone, Debug, Serialize, SimpleObject)]
pub struct BalanceSummary {
    pub year: i32,
    pub entitled: i32,
    pub accumulated: i32,
    pub availed: i32,
    pub pending: i32,
    pub balance: i32,
    pub requestable: i32,
}

impl From<LeaveBalance> for BalanceSummary {
    fn from(value: LeaveBalance) -> Self {
        Self {
            requestable: value.requestable(),
            year: value.year,
            entitled: value.entitled,
            accumulated: value.accumulated,
            availed: value.availed,
            pending: value.pending,
            balance: value.balance,
        }
    }
}

#[derive(Clone, Debug, Serialize, SimpleObject)]
pub struct DepartmentHeadcount {
    pub department_id: Uuid,
    pub name: String,
    pub headcount: i64,
}

async fn dashboard(
    State(state): State<AppState>,
    viewer: AuthUser,
) -> ApiResult<Json<DashboardSummary>> {
    summary(&state.pool, &state.config, &viewer).await.map(Json)
}

#[instrument(name = "dashboard.summary", skip_all, fields(user_id = %viewer.id))]
pub async fn summary(
    pool: &DbPool,
    config: &AppConfig,
    viewer: &AuthUser,
) -> ApiResult<DashboardSummary> {
    let balance = load_balance(pool, config, viewer.id, today().year()).await?;
    let pending_leaves = leaves::Entity::find()
        .filter(leaves::Column::UserId.eq(viewer.id))
        .filter(leaves::Column::Status.eq(leaves::Status::Pending))
        .count(pool)
        .await
        .map_err(db_error)?;
    let open_tasks = tasks::Entity::find()
        .filter(tasks::Column::AssignedTo.eq(viewer.id))
        .filter(tasks::Column::Status.ne(tasks::Status::Completed))
        .count(pool)
        .await
        .map_err(db_error)?;
    let open_tickets = open_tickets_query()
        .filter(tickets::Column::RaisedBy.eq(viewer.id))
        .count(pool)
        .await
        .map_err(db_error)?;

    let pending_approvals = match viewer.role {
        Role::Management | Role::Manager => {
            Some(pending_approvals(pool, viewer).await?.len() as i64)
        }
        Role::Employee | Role::Hr => None,
    };
    let (headcount, ticket_queue) = if viewer.role.is_org_wide() {
        let queue = open_tickets_query().count(pool).await.map_err(db_error)?;
        (Some(headcount(pool).await?), Some(queue as i64))
    } else {
        (None, None)
    };

    Ok(DashboardSummary {
        role: viewer.role.to_string(),
        leave_balance: balance.into(),
        pending_leaves: pending_leaves as i64,
        open_tasks: open_tasks as i64,
        open_tickets: open_tickets as i64,
        pending_approvals,
        headcount,
        ticket_queue,
    })
}

fn open_tickets_query() -> sea_orm::Select<tickets::Entity> {
    tickets::Entity::find().filter(
        tickets::Column::Status.is_in([tickets::Status::Open, tickets::Status::InProgress]),
    )
}

async fn headcount(pool: &DbPool) -> ApiResult<Vec<DepartmentHeadcount>> {
    let counts: HashMap<Uuid, i64> = associations::Entity::find()
        .select_only()
        .column(associations::Column::DepartmentId)
        .column_as(Expr::col(associations::Column::Id).count(), "headcount")
        .group_by(associations::Column::DepartmentId)
        .into_tuple::<(Uuid, i64)>()
        .all(pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .collect();
    let rows = departments::Entity::find()
        .order_by_asc(departments::Column::Name)
        .all(pool)
        .await
        .map_err(db_error)?;
    Ok(rows
        .into_iter()
        .map(|dept| DepartmentHeadcount {
            headcount: counts.get(&dept.id).copied().unwrap_or(0),
            department_id: dept.id,
            name: dept.name,
        })
        .collect())
}
