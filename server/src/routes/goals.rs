use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use entity::{goals, kpis, milestones};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authz::groups;
use products_hr::performance::percent;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{db_error, now};
use crate::auth::AuthUser;
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_goals).post(create_goal))
        .route("/{id}", get(get_goal).put(update_goal).delete(delete_goal))
        .route("/{id}/milestones", post(add_milestone))
        .route(
            "/{id}/milestones/{milestone_id}",
            patch(update_milestone).delete(delete_milestone),
        )
}

#[derive(Debug, Default, Deserialize)]
struct GoalFilter {
    user_id: Option<Uuid>,
    status: Option<goals::Status>,
}

#[derive(Deserialize)]
struct GoalInput {
    title: String,
    description: Option<String>,
    kpi_id: Option<Uuid>,
    start_date: NaiveDate,
    target_date: NaiveDate,
    status: Option<goals::Status>,
}

#[derive(Deserialize)]
struct NewMilestone {
    title: String,
    due_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct MilestoneChange {
    title: Option<String>,
    due_date: Option<NaiveDate>,
    completed: Option<bool>,
}

#[derive(Serialize)]
struct GoalView {
    #[serde(flatten)]
    goal: goals::Model,
    milestones_total: u64,
    milestones_completed: u64,
    progress_percent: u8,
}

impl GoalView {
    fn new(goal: goals::Model, milestones: &[milestones::Model]) -> Self {
        let total = milestones.len() as u64;
        let completed = milestones
            .iter()
            .filter(|m| m.completed_at.is_some())
            .count() as u64;
        Self {
            goal,
            milestones_total: total,
            milestones_completed: completed,
            progress_percent: percent(completed, total),
        }
    }
}

#[derive(Serialize)]
struct GoalDetail {
    #[serde(flatten)]
    view: GoalView,
    milestones: Vec<milestones::Model>,
}

struct ValidGoal {
    title: String,
    description: Option<String>,
}

async fn list_goals(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(filter): Query<GoalFilter>,
) -> ApiResult<Json<Vec<GoalView>>> {
    let user_id = filter.user_id.unwrap_or(viewer.id);
    if user_id != viewer.id {
        viewer.require(groups::PEOPLE_LEADS, "read other users' goals")?;
        if !viewer.can_view_user(&state.pool, user_id).await? {
            return Err(ApiError::forbidden("user is outside your departments"));
        }
    }
    let mut select = goals::Entity::find()
        .filter(goals::Column::UserId.eq(user_id))
        .order_by_asc(goals::Column::TargetDate);
    if let Some(status) = filter.status {
        select = select.filter(goals::Column::Status.eq(status));
    }
    let rows = select
        .find_with_related(milestones::Entity)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    let views = rows
        .into_iter()
        .map(|(goal, milestones)| GoalView::new(goal, &milestones))
        .collect();
    Ok(Json(views))
}

async fn get_goal(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GoalDetail>> {
    let goal = find_goal(&state, id).await?;
    if !viewer.can_view_user(&state.pool, goal.user_id).await? {
        return Err(ApiError::forbidden("not allowed to view this goal"));
    }
    detail(&state, goal).await.map(Json)
}

async fn create_goal(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<GoalInput>,
) -> ApiResult<(StatusCode, Json<GoalDetail>)> {
    let valid = validate(&state, &body).await?;
    let stamp = now();
    let goal = goals::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(viewer.id),
        kpi_id: Set(body.kpi_id),
        title: Set(valid.title),
        description: Set(valid.description),
        start_date: Set(body.start_date),
        target_date: Set(body.target_date),
        status: Set(body.status.unwrap_or(goals::Status::Active)),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(goal_id = %goal.id, user_id = %viewer.id, "goal created");
    Ok((
        StatusCode::CREATED,
        Json(GoalDetail {
            view: GoalView::new(goal, &[]),
            milestones: Vec::new(),
        }),
    ))
}

async fn update_goal(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<GoalInput>,
) -> ApiResult<Json<GoalDetail>> {
    let goal = owned_goal(&state, &viewer, id).await?;
    let valid = validate(&state, &body).await?;
    let mut active: goals::ActiveModel = goal.into();
    active.kpi_id = Set(body.kpi_id);
    active.title = Set(valid.title);
    active.description = Set(valid.description);
    active.start_date = Set(body.start_date);
    active.target_date = Set(body.target_date);
    if let Some(status) = body.status {
        active.status = Set(status);
    }
    active.updated_at = Set(now());
    let goal = active.update(&state.pool).await.map_err(db_error)?;
    detail(&state, goal).await.map(Json)
}

async fn delete_goal(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let goal = owned_goal(&state, &viewer, id).await?;
    goal.delete(&state.pool).await.map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_milestone(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<NewMilestone>,
) -> ApiResult<(StatusCode, Json<milestones::Model>)> {
    let goal = owned_goal(&state, &viewer, id).await?;
    let mut validator = Validator::new();
    let title = validator.required_text("title", &body.title, 200);
    validator.finish()?;
    let milestone = milestones::ActiveModel {
        id: Set(Uuid::new_v4()),
        goal_id: Set(goal.id),
        title: Set(title),
        due_date: Set(body.due_date),
        completed_at: Set(None),
        created_at: Set(now()),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(milestone)))
}

async fn update_milestone(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path((id, milestone_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<MilestoneChange>,
) -> ApiResult<Json<milestones::Model>> {
    let goal = owned_goal(&state, &viewer, id).await?;
    let milestone = find_milestone(&state, goal.id, milestone_id).await?;
    let mut validator = Validator::new();
    let title = body
        .title
        .as_deref()
        .map(|title| validator.required_text("title", title, 200));
    validator.finish()?;

    let completed_at = match body.completed {
        Some(true) => Some(milestone.completed_at.unwrap_or_else(now)),
        Some(false) => None,
        None => milestone.completed_at,
    };
    let mut active: milestones::ActiveModel = milestone.into();
    if let Some(title) = title {
        active.title = Set(title);
    }
    if let Some(due_date) = body.due_date {
        active.due_date = Set(Some(due_date));
    }
    active.completed_at = Set(completed_at);
    let milestone = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(milestone))
}

async fn delete_milestone(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path((id, milestone_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let goal = owned_goal(&state, &viewer, id).await?;
    find_milestone(&state, goal.id, milestone_id)
        .await?
        .delete(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn validate(state: &AppState, body: &GoalInput) -> ApiResult<ValidGoal> {
    let mut validator = Validator::new();
    let title = validator.required_text("title", &body.title, 200);
    let description = validator.optional_text("description", body.description.as_deref(), 2000);
    validator.check(
        body.target_date >= body.start_date,
        "target_date",
        "must not be before start_date",
    );
    validator.finish()?;
    if let Some(kpi_id) = body.kpi_id {
        kpis::Entity::find_by_id(kpi_id)
            .one(&state.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ApiError::invalid("kpi_id", "unknown KPI"))?;
    }
    Ok(ValidGoal { title, description })
}

async fn detail(state: &AppState, goal: goals::Model) -> ApiResult<GoalDetail> {
    let milestones = goal
        .find_related(milestones::Entity)
        .order_by_asc(milestones::Column::CreatedAt)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(GoalDetail {
        view: GoalView::new(goal, &milestones),
        milestones,
    })
}

async fn owned_goal(state: &AppState, viewer: &AuthUser, id: Uuid) -> ApiResult<goals::Model> {
    let goal = find_goal(state, id).await?;
    if goal.user_id != viewer.id {
        return Err(ApiError::forbidden("only the owner edits a goal"));
    }
    Ok(goal)
}

async fn find_goal(state: &AppState, id: Uuid) -> ApiResult<goals::Model> {
    goals::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("goal"))
}

async fn find_milestone(
    state: &AppState,
    goal_id: Uuid,
    id: Uuid,
) -> ApiResult<milestones::Model> {
    milestones::Entity::find_by_id(id)
        .filter(milestones::Column::GoalId.eq(goal_id))
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("milestone"))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::routes::testing::TestApp;

    async fn create(app: &TestApp) -> Value {
        let (status, goal) = app
            .post(
                "/api/goals",
                &app.seeded.employee,
                json!({
                    "title": "Ship the billing rewrite",
                    "kpi_id": app.seeded.kpi,
                    "start_date": "2026-01-01",
                    "target_date": "2026-06-30",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        goal
    }

    #[tokio::test]
    async fn milestones_drive_progress() {
        let app = TestApp::new().await;
        let goal = create(&app).await;
        assert_eq!(goal["status"], "ACTIVE");
        assert_eq!(goal["progress_percent"], 0);
        let id = goal["id"].as_str().unwrap();

        let uri = format!("/api/goals/{id}/milestones");
        let mut ids = Vec::new();
        for title in ["Design", "Build", "Launch"] {
            let (status, milestone) = app
                .post(&uri, &app.seeded.employee, json!({"title": title}))
                .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(milestone["id"].as_str().unwrap().to_string());
        }
        let toggle = format!("/api/goals/{id}/milestones/{}", ids[0]);
        let (_, done) = app
            .patch(&toggle, &app.seeded.employee, json!({"completed": true}))
            .await;
        assert!(done["completed_at"].is_string());

        let (_, detail) = app
            .get(&format!("/api/goals/{id}"), &app.seeded.employee)
            .await;
        assert_eq!(detail["milestones_total"], 3);
        assert_eq!(detail["milestones_completed"], 1);
        assert_eq!(detail["progress_percent"], 33);

        let (_, undone) = app
            .patch(&toggle, &app.seeded.employee, json!({"completed": false}))
            .await;
        assert!(undone["completed_at"].is_null());
    }

    #[tokio::test]
    async fn goals_are_owned_and_visible_to_leads() {
        let app = TestApp::new().await;
        let goal = create(&app).await;
        let uri = format!("/api/goals/{}", goal["id"].as_str().unwrap());
        let edit = json!({
            "title": "Hijacked",
            "start_date": "2026-01-01",
            "target_date": "2026-06-30",
        });
        let (status, _) = app.put(&uri, &app.seeded.manager, edit).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let list = format!("/api/goals?user_id={}", app.seeded.employee.id);
        let (status, goals) = app.get(&list, &app.seeded.manager).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(goals.as_array().unwrap().len(), 1);
        let (status, _) = app.get(&list, &app.seeded.analyst).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.delete(&uri, &app.seeded.employee).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn target_date_must_follow_start_date() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post(
                "/api/goals",
                &app.seeded.employee,
                json!({
                    "title": "Backwards",
                    "start_date": "2026-06-30",
                    "target_date": "2026-01-01",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["target_date"].is_string());
    }
}
