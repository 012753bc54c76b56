use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::NaiveDate;
use entity::{kais, tasks};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authz::{Role, groups};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{Page, db_error, now, today};
use crate::auth::{AuthUser, load_user_role};
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/{id}/status", patch(update_status))
}

#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum TaskScope {
    #[default]
    Assigned,
    Created,
    All,
}

#[derive(Debug, Default, Deserialize)]
struct TaskFilter {
    #[serde(default)]
    scope: TaskScope,
    status: Option<tasks::Status>,
    limit: Option<u64>,
    offset: Option<u64>,
}

#[derive(Deserialize)]
struct TaskInput {
    title: String,
    description: Option<String>,
    priority: Option<tasks::Priority>,
    assigned_to: Uuid,
    kai_id: Option<Uuid>,
    due_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct StatusChange {
    status: tasks::Status,
}

struct ValidTask {
    title: String,
    description: Option<String>,
}

async fn list_tasks(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<tasks::Model>>> {
    let mut select = tasks::Entity::find()
        .order_by_asc(tasks::Column::DueDate)
        .order_by_desc(tasks::Column::CreatedAt);
    select = match filter.scope {
        TaskScope::Assigned => select.filter(tasks::Column::AssignedTo.eq(viewer.id)),
        TaskScope::Created => select.filter(tasks::Column::AssignedBy.eq(viewer.id)),
        TaskScope::All => {
            viewer.require(groups::ADMINISTRATION, "list every task")?;
            select
        }
    };
    if let Some(status) = filter.status {
        select = select.filter(tasks::Column::Status.eq(status));
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

#[instrument(name = "tasks.create", skip_all, fields(assigner = %viewer.id))]
async fn create_task(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<TaskInput>,
) -> ApiResult<(StatusCode, Json<tasks::Model>)> {
    viewer.require(groups::TASK_ASSIGNERS, "assign tasks")?;
    let valid = validate(&body, None)?;
    check_assignment(&state, &viewer, &body).await?;
    let stamp = now();
    let task = tasks::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(valid.title),
        description: Set(valid.description),
        status: Set(tasks::Status::Pending),
        priority: Set(body.priority.unwrap_or(tasks::Priority::Medium)),
        assigned_to: Set(body.assigned_to),
        assigned_by: Set(viewer.id),
        kai_id: Set(body.kai_id),
        due_date: Set(body.due_date),
        completed_at: Set(None),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(task_id = %task.id, assignee = %task.assigned_to, "task assigned");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<tasks::Model>> {
    let task = find_task(&state, id).await?;
    let involved = task.assigned_to == viewer.id || task.assigned_by == viewer.id;
    if !involved && !viewer.role.is_org_wide() {
        return Err(ApiError::forbidden("not involved in this task"));
    }
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<TaskInput>,
) -> ApiResult<Json<tasks::Model>> {
    let task = find_task(&state, id).await?;
    ensure_owner(&viewer, &task, "edit this task")?;
    let valid = validate(&body, task.due_date)?;
    if body.assigned_to != task.assigned_to {
        check_assignment(&state, &viewer, &body).await?;
    }
    let mut active: tasks::ActiveModel = task.into();
    active.title = Set(valid.title);
    active.description = Set(valid.description);
    if let Some(priority) = body.priority {
        active.priority = Set(priority);
    }
    active.assigned_to = Set(body.assigned_to);
    active.kai_id = Set(body.kai_id);
    active.due_date = Set(body.due_date);
    active.updated_at = Set(now());
    let task = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(task))
}

#[instrument(name = "tasks.status", skip_all, fields(task_id = %id))]
async fn update_status(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusChange>,
) -> ApiResult<Json<tasks::Model>> {
    let task = find_task(&state, id).await?;
    if task.assigned_to != viewer.id {
        return Err(ApiError::forbidden("only the assignee updates task status"));
    }
    let stamp = now();
    let completed_at = match body.status {
        tasks::Status::Completed => Some(task.completed_at.unwrap_or(stamp)),
        tasks::Status::Pending | tasks::Status::InProgress => None,
    };
    let mut active: tasks::ActiveModel = task.into();
    active.status = Set(body.status);
    active.completed_at = Set(completed_at);
    active.updated_at = Set(stamp);
    let task = active.update(&state.pool).await.map_err(db_error)?;
    info!(status = ?task.status, "task status changed");
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let task = find_task(&state, id).await?;
    ensure_owner(&viewer, &task, "delete this task")?;
    task.delete(&state.pool).await.map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// A due date is only checked against today when it changes.
fn validate(body: &TaskInput, current_due: Option<NaiveDate>) -> ApiResult<ValidTask> {
    let mut validator = Validator::new();
    let title = validator.required_text("title", &body.title, 200);
    let description = validator.optional_text("description", body.description.as_deref(), 4000);
    if let Some(due) = body.due_date.filter(|due| Some(*due) != current_due) {
        validator.check(due >= today(), "due_date", "must not be in the past");
    }
    validator.finish()?;
    Ok(ValidTask { title, description })
}

/// Assignee must be active; Managers only assign within their departments.
async fn check_assignment(state: &AppState, viewer: &AuthUser, body: &TaskInput) -> ApiResult<()> {
    let (assignee, _) = load_user_role(&state.pool, body.assigned_to)
        .await?
        .ok_or_else(|| ApiError::invalid("assigned_to", "unknown user"))?;
    if !assignee.is_active {
        return Err(ApiError::invalid("assigned_to", "user is deactivated"));
    }
    if viewer.role == Role::Manager && !viewer.can_view_user(&state.pool, assignee.id).await? {
        return Err(ApiError::forbidden(
            "managers assign tasks within their departments only",
        ));
    }
    if let Some(kai_id) = body.kai_id {
        kais::Entity::find_by_id(kai_id)
            .one(&state.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ApiError::invalid("kai_id", "unknown KAI"))?;
    }
    Ok(())
}

fn ensure_owner(viewer: &AuthUser, task: &tasks::Model, action: &str) -> ApiResult<()> {
    if task.assigned_by == viewer.id || viewer.role == Role::Management {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("not allowed to {action}")))
    }
}

async fn find_task(state: &AppState, id: Uuid) -> ApiResult<tasks::Model> {
    tasks::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("task"))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Duration;
    use serde_json::{Value, json};

    use entity::tasks;
    use sea_orm::{ActiveModelTrait, Set};

    use crate::routes::testing::TestApp;
    use crate::routes::{now, today};

    async fn assign(app: &TestApp, assignee: uuid::Uuid) -> (StatusCode, Value) {
        app.post(
            "/api/tasks",
            &app.seeded.manager,
            json!({
                "title": "Write release notes",
                "assigned_to": assignee,
                "priority": "HIGH",
                "kai_id": app.seeded.kai,
                "due_date": today() + Duration::days(7),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn managers_assign_within_their_department() {
        let app = TestApp::new().await;
        let (status, task) = assign(&app, app.seeded.employee.id).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["status"], "PENDING");
        assert_eq!(task["priority"], "HIGH");
        assert_eq!(task["assigned_by"], app.seeded.manager.id.to_string());

        let (status, _) = assign(&app, app.seeded.analyst.id).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .post(
                "/api/tasks",
                &app.seeded.employee,
                json!({"title": "x", "assigned_to": app.seeded.manager.id}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .post(
                "/api/tasks",
                &app.seeded.management,
                json!({"title": "Quarterly audit", "assigned_to": app.seeded.analyst.id}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn past_due_dates_are_rejected() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post(
                "/api/tasks",
                &app.seeded.manager,
                json!({
                    "title": "Late already",
                    "assigned_to": app.seeded.employee.id,
                    "due_date": today() - Duration::days(1),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["due_date"].is_string());
    }

    #[tokio::test]
    async fn assignee_moves_status_and_completion_is_stamped() {
        let app = TestApp::new().await;
        let (_, task) = assign(&app, app.seeded.employee.id).await;
        let uri = format!("/api/tasks/{}/status", task["id"].as_str().unwrap());

        let (status, _) = app
            .patch(&uri, &app.seeded.manager, json!({"status": "COMPLETED"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, done) = app
            .patch(&uri, &app.seeded.employee, json!({"status": "COMPLETED"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(done["completed_at"].is_string());

        let (_, reopened) = app
            .patch(&uri, &app.seeded.employee, json!({"status": "IN_PROGRESS"}))
            .await;
        assert!(reopened["completed_at"].is_null());
    }

    #[tokio::test]
    async fn scopes_split_assigned_and_created() {
        let app = TestApp::new().await;
        assign(&app, app.seeded.employee.id).await;
        let (_, mine) = app.get("/api/tasks", &app.seeded.employee).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        let (_, created) = app.get("/api/tasks?scope=created", &app.seeded.manager).await;
        assert_eq!(created.as_array().unwrap().len(), 1);
        let (_, assigned) = app.get("/api/tasks?scope=assigned", &app.seeded.manager).await;
        assert!(assigned.as_array().unwrap().is_empty());
        let (status, _) = app.get("/api/tasks?scope=all", &app.seeded.employee).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, all) = app
            .get("/api/tasks?scope=all&status=PENDING", &app.seeded.hr)
            .await;
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_the_assigner_edits_and_deletes() {
        let app = TestApp::new().await;
        let (_, task) = assign(&app, app.seeded.employee.id).await;
        let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());
        let edit = json!({
            "title": "Write the changelog",
            "assigned_to": app.seeded.employee.id,
        });
        let (status, _) = app.put(&uri, &app.seeded.employee, edit.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, updated) = app.put(&uri, &app.seeded.manager, edit).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Write the changelog");
        assert_eq!(updated["priority"], "HIGH");

        let (status, _) = app.get(&uri, &app.seeded.analyst).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.delete(&uri, &app.seeded.employee).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.delete(&uri, &app.seeded.management).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.get(&uri, &app.seeded.manager).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn overdue_tasks_stay_editable() {
        let app = TestApp::new().await;
        let overdue = today() - Duration::days(3);
        let stamp = now();
        let task = tasks::ActiveModel {
            id: Set(uuid::Uuid::new_v4()),
            title: Set("Close the books".into()),
            description: Set(None),
            status: Set(tasks::Status::InProgress),
            priority: Set(tasks::Priority::Medium),
            assigned_to: Set(app.seeded.employee.id),
            assigned_by: Set(app.seeded.manager.id),
            kai_id: Set(None),
            due_date: Set(Some(overdue)),
            completed_at: Set(None),
            created_at: Set(stamp),
            updated_at: Set(stamp),
        }
        .insert(&app.pool)
        .await
        .unwrap();
        let uri = format!("/api/tasks/{}", task.id);

        let (status, updated) = app
            .put(
                &uri,
                &app.seeded.manager,
                json!({
                    "title": "Close the quarter books",
                    "assigned_to": app.seeded.employee.id,
                    "due_date": overdue,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Close the quarter books");

        let (status, body) = app
            .put(
                &uri,
                &app.seeded.manager,
                json!({
                    "title": "Close the quarter books",
                    "assigned_to": app.seeded.employee.id,
                    "due_date": overdue - Duration::days(1),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["due_date"].is_string());
    }
}
