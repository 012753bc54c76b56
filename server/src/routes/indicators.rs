//! KMI -> KPI -> KAI performance hierarchy.
//!
//! Management owns KMIs. KPIs and KAIs may also be maintained by Managers
//! for the departments they are placed in.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use entity::{kais, kmis, kpis};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authz::{Role, groups};
use products_hr::performance::achievement;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::departments::find_department;
use super::{db_error, now};
use crate::auth::AuthUser;
use crate::http::AppState;

pub fn kmi_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_kmis).post(create_kmi))
        .route("/{id}", get(get_kmi).put(update_kmi).delete(delete_kmi))
        .route("/{id}/tree", get(kmi_tree))
}

pub fn kpi_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_kpis).post(create_kpi))
        .route("/{id}", get(get_kpi).put(update_kpi).delete(delete_kpi))
}

pub fn kai_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_kais).post(create_kai))
        .route("/{id}", get(get_kai).put(update_kai).delete(delete_kai))
        .route("/{id}/progress", patch(record_progress))
}

#[derive(Debug, Default, Deserialize)]
struct KmiFilter {
    year: Option<i32>,
}

#[derive(Deserialize)]
struct KmiInput {
    title: String,
    description: Option<String>,
    year: i32,
}

#[derive(Debug, Default, Deserialize)]
struct KpiFilter {
    kmi_id: Option<Uuid>,
    department_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct KpiInput {
    kmi_id: Uuid,
    title: String,
    description: Option<String>,
    department_id: Option<Uuid>,
    target: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct KaiFilter {
    kpi_id: Option<Uuid>,
    assigned_to: Option<Uuid>,
}

#[derive(Deserialize)]
struct KaiInput {
    kpi_id: Uuid,
    title: String,
    description: Option<String>,
    assigned_to: Option<Uuid>,
    target: Option<f64>,
}

#[derive(Deserialize)]
struct Progress {
    achieved: Option<f64>,
    status: Option<kais::Status>,
}

#[derive(Serialize)]
struct KmiTree {
    #[serde(flatten)]
    kmi: kmis::Model,
    kpis: Vec<KpiNode>,
}

#[derive(Serialize)]
struct KpiNode {
    #[serde(flatten)]
    kpi: kpis::Model,
    achievement_percent: Option<u8>,
    kais: Vec<KaiNode>,
}

#[derive(Serialize)]
struct KaiNode {
    #[serde(flatten)]
    kai: kais::Model,
    achievement_percent: Option<u8>,
}

struct Text {
    title: String,
    description: Option<String>,
}

async fn list_kmis(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Query(filter): Query<KmiFilter>,
) -> ApiResult<Json<Vec<kmis::Model>>> {
    let mut select = kmis::Entity::find()
        .order_by_desc(kmis::Column::Year)
        .order_by_asc(kmis::Column::Title);
    if let Some(year) = filter.year {
        select = select.filter(kmis::Column::Year.eq(year));
    }
    let rows = select.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

async fn get_kmi(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<kmis::Model>> {
    find_kmi(&state, id).await.map(Json)
}

#[instrument(name = "kmi.create", skip_all, fields(actor = %viewer.id))]
async fn create_kmi(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<KmiInput>,
) -> ApiResult<(StatusCode, Json<kmis::Model>)> {
    viewer.require(groups::INDICATOR_OWNERS, "create KMIs")?;
    let text = validate_kmi(&body)?;
    let stamp = now();
    let kmi = kmis::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(text.title),
        description: Set(text.description),
        year: Set(body.year),
        created_by: Set(viewer.id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(kmi_id = %kmi.id, year = kmi.year, "KMI created");
    Ok((StatusCode::CREATED, Json(kmi)))
}

async fn update_kmi(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<KmiInput>,
) -> ApiResult<Json<kmis::Model>> {
    viewer.require(groups::INDICATOR_OWNERS, "edit KMIs")?;
    let text = validate_kmi(&body)?;
    let mut active: kmis::ActiveModel = find_kmi(&state, id).await?.into();
    active.title = Set(text.title);
    active.description = Set(text.description);
    active.year = Set(body.year);
    active.updated_at = Set(now());
    let kmi = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(kmi))
}

async fn delete_kmi(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    viewer.require(groups::INDICATOR_OWNERS, "delete KMIs")?;
    let kmi = find_kmi(&state, id).await?;
    kmi.delete(&state.pool).await.map_err(db_error)?;
    info!(kmi_id = %id, "KMI deleted with its KPIs and KAIs");
    Ok(StatusCode::NO_CONTENT)
}

async fn kmi_tree(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<KmiTree>> {
    let kmi = find_kmi(&state, id).await?;
    let kpis = kpis::Entity::find()
        .filter(kpis::Column::KmiId.eq(kmi.id))
        .order_by_asc(kpis::Column::Title)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    let mut all_kais = kais::Entity::find()
        .filter(kais::Column::KpiId.is_in(kpis.iter().map(|kpi| kpi.id)))
        .order_by_asc(kais::Column::Title)
        .all(&state.pool)
        .await
        .map_err(db_error)?;

    let nodes = kpis
        .into_iter()
        .map(|kpi| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                all_kais.drain(..).partition(|kai| kai.kpi_id == kpi.id);
            all_kais = rest;
            let achieved = mine.iter().filter_map(|kai| kai.achieved).sum::<f64>();
            let kais = mine
                .into_iter()
                .map(|kai| KaiNode {
                    achievement_percent: achievement(kai.achieved, kai.target),
                    kai,
                })
                .collect::<Vec<_>>();
            KpiNode {
                achievement_percent: achievement(Some(achieved), kpi.target),
                kpi,
                kais,
            }
        })
        .collect();
    Ok(Json(KmiTree { kmi, kpis: nodes }))
}

async fn list_kpis(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Query(filter): Query<KpiFilter>,
) -> ApiResult<Json<Vec<kpis::Model>>> {
    let mut select = kpis::Entity::find().order_by_asc(kpis::Column::Title);
    if let Some(kmi_id) = filter.kmi_id {
        select = select.filter(kpis::Column::KmiId.eq(kmi_id));
    }
    if let Some(department_id) = filter.department_id {
        select = select.filter(kpis::Column::DepartmentId.eq(department_id));
    }
    let rows = select.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

async fn get_kpi(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<kpis::Model>> {
    find_kpi(&state, id).await.map(Json)
}

#[instrument(name = "kpi.create", skip_all, fields(actor = %viewer.id))]
async fn create_kpi(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<KpiInput>,
) -> ApiResult<(StatusCode, Json<kpis::Model>)> {
    viewer.require(groups::INDICATOR_EDITORS, "create KPIs")?;
    let text = validate_kpi(&state, &viewer, &body).await?;
    let stamp = now();
    let kpi = kpis::ActiveModel {
        id: Set(Uuid::new_v4()),
        kmi_id: Set(body.kmi_id),
        title: Set(text.title),
        description: Set(text.description),
        department_id: Set(body.department_id),
        target: Set(body.target),
        created_by: Set(viewer.id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(kpi_id = %kpi.id, kmi_id = %kpi.kmi_id, "KPI created");
    Ok((StatusCode::CREATED, Json(kpi)))
}

async fn update_kpi(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<KpiInput>,
) -> ApiResult<Json<kpis::Model>> {
    viewer.require(groups::INDICATOR_EDITORS, "edit KPIs")?;
    let kpi = find_kpi(&state, id).await?;
    ensure_kpi_editor(&viewer, &kpi)?;
    let text = validate_kpi(&state, &viewer, &body).await?;
    let mut active: kpis::ActiveModel = kpi.into();
    active.kmi_id = Set(body.kmi_id);
    active.title = Set(text.title);
    active.description = Set(text.description);
    active.department_id = Set(body.department_id);
    active.target = Set(body.target);
    active.updated_at = Set(now());
    let kpi = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(kpi))
}

async fn delete_kpi(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    viewer.require(groups::INDICATOR_EDITORS, "delete KPIs")?;
    let kpi = find_kpi(&state, id).await?;
    ensure_kpi_editor(&viewer, &kpi)?;
    kpi.delete(&state.pool).await.map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_kais(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Query(filter): Query<KaiFilter>,
) -> ApiResult<Json<Vec<kais::Model>>> {
    let mut select = kais::Entity::find().order_by_asc(kais::Column::Title);
    if let Some(kpi_id) = filter.kpi_id {
        select = select.filter(kais::Column::KpiId.eq(kpi_id));
    }
    if let Some(assigned_to) = filter.assigned_to {
        select = select.filter(kais::Column::AssignedTo.eq(assigned_to));
    }
    let rows = select.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

async fn get_kai(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<kais::Model>> {
    find_kai(&state, id).await.map(Json)
}

#[instrument(name = "kai.create", skip_all, fields(actor = %viewer.id))]
async fn create_kai(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<KaiInput>,
) -> ApiResult<(StatusCode, Json<kais::Model>)> {
    viewer.require(groups::INDICATOR_EDITORS, "create KAIs")?;
    let text = validate_kai(&state, &viewer, &body).await?;
    let stamp = now();
    let kai = kais::ActiveModel {
        id: Set(Uuid::new_v4()),
        kpi_id: Set(body.kpi_id),
        title: Set(text.title),
        description: Set(text.description),
        assigned_to: Set(body.assigned_to),
        target: Set(body.target),
        achieved: Set(None),
        status: Set(kais::Status::NotStarted),
        created_by: Set(viewer.id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    info!(kai_id = %kai.id, kpi_id = %kai.kpi_id, "KAI created");
    Ok((StatusCode::CREATED, Json(kai)))
}

async fn update_kai(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<KaiInput>,
) -> ApiResult<Json<kais::Model>> {
    viewer.require(groups::INDICATOR_EDITORS, "edit KAIs")?;
    let kai = find_kai(&state, id).await?;
    ensure_kpi_editor(&viewer, &find_kpi(&state, kai.kpi_id).await?)?;
    let text = validate_kai(&state, &viewer, &body).await?;
    let mut active: kais::ActiveModel = kai.into();
    active.kpi_id = Set(body.kpi_id);
    active.title = Set(text.title);
    active.description = Set(text.description);
    active.assigned_to = Set(body.assigned_to);
    active.target = Set(body.target);
    active.updated_at = Set(now());
    let kai = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(kai))
}

async fn delete_kai(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    viewer.require(groups::INDICATOR_EDITORS, "delete KAIs")?;
    let kai = find_kai(&state, id).await?;
    ensure_kpi_editor(&viewer, &find_kpi(&state, kai.kpi_id).await?)?;
    kai.delete(&state.pool).await.map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Records achievement. Without an explicit status one is derived from
/// `achieved` against the target.
#[instrument(name = "kai.progress", skip_all, fields(kai_id = %id))]
async fn record_progress(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Progress>,
) -> ApiResult<Json<kais::Model>> {
    let kai = find_kai(&state, id).await?;
    if kai.assigned_to != Some(viewer.id) {
        viewer.require(groups::INDICATOR_EDITORS, "record KAI progress")?;
        ensure_kpi_editor(&viewer, &find_kpi(&state, kai.kpi_id).await?)?;
    }
    let mut validator = Validator::new();
    if let Some(achieved) = body.achieved {
        validator.check(
            achieved.is_finite() && achieved >= 0.0,
            "achieved",
            "must be a non-negative number",
        );
    }
    validator.check(
        body.achieved.is_some() || body.status.is_some(),
        "achieved",
        "achieved or status is required",
    );
    validator.finish()?;

    let achieved = body.achieved.or(kai.achieved);
    let status = body.status.unwrap_or_else(|| derive_status(achieved, kai.target));
    let mut active: kais::ActiveModel = kai.into();
    active.achieved = Set(achieved);
    active.status = Set(status);
    active.updated_at = Set(now());
    let kai = active.update(&state.pool).await.map_err(db_error)?;
    info!(achieved = ?kai.achieved, status = ?kai.status, "KAI progress recorded");
    Ok(Json(kai))
}

fn derive_status(achieved: Option<f64>, target: Option<f64>) -> kais::Status {
    match (achieved, target) {
        (Some(done), Some(goal)) if goal > 0.0 && done >= goal => kais::Status::Achieved,
        (Some(done), _) if done > 0.0 => kais::Status::InProgress,
        _ => kais::Status::NotStarted,
    }
}

fn validate_kmi(body: &KmiInput) -> ApiResult<Text> {
    let mut validator = Validator::new();
    let title = validator.required_text("title", &body.title, 200);
    let description = validator.optional_text("description", body.description.as_deref(), 2000);
    validator.check(
        (2000..=2100).contains(&body.year),
        "year",
        "must be between 2000 and 2100",
    );
    validator.finish()?;
    Ok(Text { title, description })
}

async fn validate_kpi(state: &AppState, viewer: &AuthUser, body: &KpiInput) -> ApiResult<Text> {
    let mut validator = Validator::new();
    let title = validator.required_text("title", &body.title, 200);
    let description = validator.optional_text("description", body.description.as_deref(), 2000);
    check_target(&mut validator, body.target);
    if viewer.role == Role::Manager {
        validator.check(
            body.department_id
                .is_some_and(|dept| viewer.departments.contains(&dept)),
            "department_id",
            "must be one of your departments",
        );
    }
    validator.finish()?;
    find_kmi(state, body.kmi_id).await?;
    if let Some(department_id) = body.department_id {
        find_department(state, department_id).await?;
    }
    Ok(Text { title, description })
}

async fn validate_kai(state: &AppState, viewer: &AuthUser, body: &KaiInput) -> ApiResult<Text> {
    let mut validator = Validator::new();
    let title = validator.required_text("title", &body.title, 200);
    let description = validator.optional_text("description", body.description.as_deref(), 2000);
    check_target(&mut validator, body.target);
    validator.finish()?;
    ensure_kpi_editor(viewer, &find_kpi(state, body.kpi_id).await?)?;
    if let Some(assignee) = body.assigned_to {
        let assignable = viewer.can_view_user(&state.pool, assignee).await?;
        if !assignable || !user_exists(state, assignee).await? {
            return Err(ApiError::invalid(
                "assigned_to",
                "must be a user in your departments",
            ));
        }
    }
    Ok(Text { title, description })
}

fn check_target(validator: &mut Validator, target: Option<f64>) {
    if let Some(target) = target {
        validator.check(
            target.is_finite() && target > 0.0,
            "target",
            "must be a positive number",
        );
    }
}

/// Management edits any KPI; Managers those of their own departments.
fn ensure_kpi_editor(viewer: &AuthUser, kpi: &kpis::Model) -> ApiResult<()> {
    let allowed = match viewer.role {
        Role::Management => true,
        Role::Manager => kpi
            .department_id
            .is_some_and(|dept| viewer.departments.contains(&dept)),
        Role::Employee | Role::Hr => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden("KPI belongs to another department"))
    }
}

async fn user_exists(state: &AppState, id: Uuid) -> ApiResult<bool> {
    let found = entity::users::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(found.is_some())
}

async fn find_kmi(state: &AppState, id: Uuid) -> ApiResult<kmis::Model> {
    kmis::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("KMI"))
}

async fn find_kpi(state: &AppState, id: Uuid) -> ApiResult<kpis::Model> {
    kpis::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("KPI"))
}

async fn find_kai(state: &AppState, id: Uuid) -> ApiResult<kais::Model> {
    kais::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("KAI"))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::derive_status;
    use crate::routes::testing::TestApp;
    use entity::kais::Status;

    #[test]
    fn status_follows_achievement() {
        assert_eq!(derive_status(None, Some(10.0)), Status::NotStarted);
        assert_eq!(derive_status(Some(3.0), Some(10.0)), Status::InProgress);
        assert_eq!(derive_status(Some(10.0), Some(10.0)), Status::Achieved);
        assert_eq!(derive_status(Some(3.0), None), Status::InProgress);
    }

    #[tokio::test]
    async fn only_management_owns_kmis() {
        let app = TestApp::new().await;
        let body = json!({"title": "Retention", "year": 2099});
        let (status, _) = app.post("/api/kmi", &app.seeded.manager, body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, kmi) = app.post("/api/kmi", &app.seeded.management, body).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, listed) = app.get("/api/kmi?year=2099", &app.seeded.employee).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, body) = app
            .post(
                "/api/kmi",
                &app.seeded.management,
                json!({"title": "Old", "year": 1999}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["year"].is_string());

        let uri = format!("/api/kmi/{}", kmi["id"].as_str().unwrap());
        let (status, _) = app.delete(&uri, &app.seeded.management).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn managers_create_kpis_for_their_departments() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post(
                "/api/kpi",
                &app.seeded.manager,
                json!({
                    "kmi_id": app.seeded.kmi,
                    "title": "Onboarding time",
                    "department_id": app.seeded.people_ops,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["department_id"].is_string());

        let (status, _) = app
            .post(
                "/api/kpi",
                &app.seeded.manager,
                json!({
                    "kmi_id": app.seeded.kmi,
                    "title": "Deploy frequency",
                    "department_id": app.seeded.engineering,
                    "target": 12.0,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/kpi?kmi_id={}", app.seeded.kmi);
        let (_, kpis) = app.get(&uri, &app.seeded.employee).await;
        assert_eq!(kpis.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn kai_assignees_must_share_the_managers_department() {
        let app = TestApp::new().await;
        let (status, _) = app
            .post(
                "/api/kai",
                &app.seeded.manager,
                json!({
                    "kpi_id": app.seeded.kpi,
                    "title": "Survey follow-ups",
                    "assigned_to": app.seeded.analyst.id,
                    "target": 5.0,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, kai) = app
            .post(
                "/api/kai",
                &app.seeded.manager,
                json!({
                    "kpi_id": app.seeded.kpi,
                    "title": "Survey follow-ups",
                    "assigned_to": app.seeded.employee.id,
                    "target": 5.0,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(kai["status"], "NOT_STARTED");

        let uri = format!("/api/kai?assigned_to={}", app.seeded.employee.id);
        let (_, assigned) = app.get(&uri, &app.seeded.employee).await;
        assert_eq!(assigned.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn assignee_records_progress_and_tree_rolls_up() {
        let app = TestApp::new().await;
        let uri = format!("/api/kai/{}/progress", app.seeded.kai);
        let (status, _) = app
            .patch(&uri, &app.seeded.analyst, json!({"achieved": 4.0}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = app
            .patch(&uri, &app.seeded.employee, json!({"achieved": -1.0}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["achieved"].is_string());

        let (status, kai) = app
            .patch(&uri, &app.seeded.employee, json!({"achieved": 4.0}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(kai["status"], "IN_PROGRESS");

        let (status, tree) = app
            .get(&format!("/api/kmi/{}/tree", app.seeded.kmi), &app.seeded.analyst)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tree["title"], "Customer satisfaction");
        let kpi = &tree["kpis"][0];
        assert_eq!(kpi["id"], app.seeded.kpi.to_string());
        assert_eq!(kpi["achievement_percent"], 10);
        assert_eq!(kpi["kais"][0]["achievement_percent"], 40);

        let (_, kai) = app
            .patch(&uri, &app.seeded.manager, json!({"achieved": 10.0}))
            .await;
        assert_eq!(kai["status"], "ACHIEVED");
    }
}
