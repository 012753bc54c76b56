use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use entity::{tasks, tickets};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authz::groups;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{Page, db_error, now};
use crate::auth::{AuthUser, load_user_role};
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tickets).post(raise_ticket))
        .route("/{id}", get(get_ticket))
        .route("/{id}/assign", post(assign_ticket))
        .route("/{id}/status", patch(update_status))
}

#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum TicketScope {
    #[default]
    Mine,
    Assigned,
    All,
}

#[derive(Debug, Default, Deserialize)]
struct TicketFilter {
    #[serde(default)]
    scope: TicketScope,
    status: Option<tickets::Status>,
    category: Option<tickets::Category>,
    limit: Option<u64>,
    offset: Option<u64>,
}

#[derive(Deserialize)]
struct NewTicket {
    subject: String,
    description: String,
    category: Option<tickets::Category>,
    priority: Option<tasks::Priority>,
}

#[derive(Deserialize)]
struct Assignment {
    assigned_to: Uuid,
}

#[derive(Deserialize)]
struct StatusChange {
    status: tickets::Status,
    resolution: Option<String>,
}

async fn list_tickets(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(filter): Query<TicketFilter>,
) -> ApiResult<Json<Vec<tickets::Model>>> {
    let mut select = tickets::Entity::find().order_by_desc(tickets::Column::CreatedAt);
    select = match filter.scope {
        TicketScope::Mine => select.filter(tickets::Column::RaisedBy.eq(viewer.id)),
        TicketScope::Assigned => select.filter(tickets::Column::AssignedTo.eq(viewer.id)),
        TicketScope::All => {
            viewer.require(groups::ADMINISTRATION, "list every ticket")?;
            select
        }
    };
    if let Some(status) = filter.status {
        select = select.filter(tickets::Column::Status.eq(status));
    }
    if let Some(category) = filter.category {
        select = select.filter(tickets::Column::Category.eq(category));
    }
    let page = Page {
        limit: filter.limit,
        offset: filter.offset,
    };
    let rows = select
        .limit(page.limit())
        .offset(page.offset())
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(rows))
}

#[instrument(name = "tickets.raise", skip_all, fields(user_id = %viewer.id))]
async fn raise_ticket(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<NewTicket>,
) -> ApiResult<(StatusCode, Json<tickets::Model>)> {
    let mut validator = Validator::new();
    let subject = validator.required_text("subject", &body.subject, 200);
    let description = validator.required_text("description", &body.description, 4000);
    validator.finish()?;
    let stamp = now();
    let ticket = tickets::ActiveModel {
        id: Set(Uuid::new_v4()),
        subject: Set(subject),
        description: Set(description),
        category: Set(body.category.unwrap_or(tickets::Category::Other)),
        status: Set(tickets::Status::Open),
        priority: Set(body.priority.unwrap_or(tasks::Priority::Medium)),
        raised_by: Set(viewer.id),
        assigned_to: Set(None),
        resolution: Set(None),
        resolved_at: Set(None),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(ticket_id = %ticket.id, category = ?ticket.category, "ticket raised");
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn get_ticket(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<tickets::Model>> {
    let ticket = find_ticket(&state, id).await?;
    let involved = ticket.raised_by == viewer.id || ticket.assigned_to == Some(viewer.id);
    if !involved && !viewer.role.is_org_wide() {
        return Err(ApiError::forbidden("not involved in this ticket"));
    }
    Ok(Json(ticket))
}

#[instrument(name = "tickets.assign", skip_all, fields(ticket_id = %id))]
async fn assign_ticket(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Assignment>,
) -> ApiResult<Json<tickets::Model>> {
    viewer.require(groups::ADMINISTRATION, "assign tickets")?;
    let ticket = find_ticket(&state, id).await?;
    let (assignee, _) = load_user_role(&state.pool, body.assigned_to)
        .await?
        .ok_or_else(|| ApiError::invalid("assigned_to", "unknown user"))?;
    if !assignee.is_active {
        return Err(ApiError::invalid("assigned_to", "user is deactivated"));
    }
    let mut active: tickets::ActiveModel = ticket.into();
    active.assigned_to = Set(Some(assignee.id));
    active.updated_at = Set(now());
    let ticket = active.update(&state.pool).await.map_err(db_error)?;
    info!(assignee = %assignee.id, "ticket assigned");
    Ok(Json(ticket))
}

#[instrument(name = "tickets.status", skip_all, fields(ticket_id = %id))]
async fn update_status(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusChange>,
) -> ApiResult<Json<tickets::Model>> {
    let ticket = find_ticket(&state, id).await?;
    if ticket.assigned_to != Some(viewer.id) && !viewer.role.is_org_wide() {
        return Err(ApiError::forbidden(
            "only the assignee, HR or Management update tickets",
        ));
    }
    let mut validator = Validator::new();
    let resolution = validator.optional_text("resolution", body.resolution.as_deref(), 4000);
    validator.check(
        body.status != tickets::Status::Resolved || resolution.is_some(),
        "resolution",
        "is required when resolving",
    );
    validator.finish()?;

    let stamp = now();
    let (resolution, resolved_at) = match body.status {
        tickets::Status::Resolved => (resolution, Some(stamp)),
        tickets::Status::Closed => (
            resolution.or_else(|| ticket.resolution.clone()),
            Some(ticket.resolved_at.unwrap_or(stamp)),
        ),
        tickets::Status::Open | tickets::Status::InProgress => {
            (resolution.or_else(|| ticket.resolution.clone()), None)
        }
    };
    let mut active: tickets::ActiveModel = ticket.into();
    active.status = Set(body.status);
    active.resolution = Set(resolution);
    active.resolved_at = Set(resolved_at);
    active.updated_at = Set(stamp);
    let ticket = active.update(&state.pool).await.map_err(db_error)?;
    info!(status = ?ticket.status, "ticket status changed");
    Ok(Json(ticket))
}

async fn find_ticket(state: &AppState, id: Uuid) -> ApiResult<tickets::Model> {
    tickets::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("ticket"))
}
