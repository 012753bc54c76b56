//! Leave applications, decisions, cancellation, balances and entitlements.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Datelike, NaiveDate};
use entity::{leave_entitlements, leaves, users};
use platform_api::{ApiError, ApiResult, Validator};
use platform_authz::{Role, groups};
use products_hr::{
    ApprovalAuthority, CancellationPlan, LeaveBalance, LeaveRuleError, LeaveSpan, Party,
    SpanState, days_within_year, plan_cancellation, validate_request, years_touched,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{Page, db_error, now, today};
use crate::auth::{AuthUser, departments_of, has_active_manager, load_user_role, members_of};
use crate::config::AppConfig;
use crate::http::AppState;

const ACTIVE_STATES: [leaves::Status; 2] = [leaves::Status::Pending, leaves::Status::Approved];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_leaves).post(apply_leave))
        .route("/mine", get(my_leaves))
        .route("/balance", get(balance))
        .route("/approvals", get(approvals))
        .route(
            "/entitlements",
            get(list_entitlements).put(upsert_entitlement),
        )
        .route("/{id}", get(get_leave))
        .route("/{id}/approve", post(approve_leave))
        .route("/{id}/reject", post(reject_leave))
        .route("/{id}/cancel", post(cancel_leave))
}

#[derive(Deserialize)]
struct LeaveApplication {
    leave_type: leaves::LeaveType,
    from_date: NaiveDate,
    to_date: NaiveDate,
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct LeaveFilter {
    status: Option<leaves::Status>,
    user_id: Option<Uuid>,
    year: Option<i32>,
    limit: Option<u64>,
    offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct BalanceQuery {
    year: Option<i32>,
    user_id: Option<Uuid>,
}

#[derive(Default, Deserialize)]
struct Decision {
    remarks: Option<String>,
}

#[derive(Serialize)]
struct BalanceView {
    user_id: Uuid,
    #[serde(flatten)]
    balance: LeaveBalance,
    requestable: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum CancelOutcome {
    Deleted,
    Shortened,
}

#[derive(Serialize)]
struct CancelResponse {
    outcome: CancelOutcome,
    leave: Option<leaves::Model>,
}

#[derive(Debug, Default, Deserialize)]
struct EntitlementQuery {
    user_id: Option<Uuid>,
    year: Option<i32>,
}

#[derive(Deserialize)]
struct EntitlementInput {
    user_id: Uuid,
    year: i32,
    entitled_days: i32,
    #[serde(default)]
    accumulated_days: i32,
}

#[instrument(name = "leaves.apply", skip_all, fields(user_id = %viewer.id))]
async fn apply_leave(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<LeaveApplication>,
) -> ApiResult<(StatusCode, Json<leaves::Model>)> {
    let mut validator = Validator::new();
    let reason = validator.required_text("reason", &body.reason, 1000);
    validator.finish()?;

    let (from, to) = (body.from_date, body.to_date);
    let days = validate_request(from, to, today()).map_err(rule_error)?;

    let txn = state.pool.begin().await.map_err(db_error)?;
    lock_user(&txn, viewer.id).await?;
    let clash = active_leaves(viewer.id)
        .filter(leaves::Column::FromDate.lte(to))
        .filter(leaves::Column::ToDate.gte(from))
        .one(&txn)
        .await
        .map_err(db_error)?;
    if let Some(clash) = clash {
        return Err(ApiError::bad_request(format!(
            "overlaps an existing leave from {} to {}",
            clash.from_date, clash.to_date
        )));
    }

    if body.leave_type.is_paid() {
        for year in years_touched(from, to) {
            let balance = load_balance(&txn, &state.config, viewer.id, year).await?;
            balance
                .ensure_fits(days_within_year(from, to, year), true)
                .map_err(rule_error)?;
        }
    }

    let reachable_manager =
        viewer.role == Role::Employee && has_active_manager(&txn, &viewer.departments).await?;
    let authority = state
        .config
        .routing
        .authority(viewer.role, days, reachable_manager);
    let stamp = now();
    let leave = leaves::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(viewer.id),
        leave_type: Set(body.leave_type),
        from_date: Set(from),
        to_date: Set(to),
        credited_days: Set(days),
        reason: Set(reason),
        status: Set(leaves::Status::Pending),
        approver_role: Set(approver_role(authority)),
        decided_by: Set(None),
        decided_at: Set(None),
        remarks: Set(None),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await
    .map_err(db_error)?;
    txn.commit().await.map_err(db_error)?;
    info!(
        leave_id = %leave.id,
        days,
        approver = authority.as_str(),
        "leave applied"
    );
    Ok((StatusCode::CREATED, Json(leave)))
}

async fn my_leaves(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(query): Query<YearQuery>,
) -> ApiResult<Json<Vec<leaves::Model>>> {
    let mut select = leaves::Entity::find()
        .filter(leaves::Column::UserId.eq(viewer.id))
        .order_by_desc(leaves::Column::FromDate);
    if let Some(year) = query.year {
        select = within_year(select, year)?;
    }
    let rows = select.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

async fn list_leaves(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(filter): Query<LeaveFilter>,
) -> ApiResult<Json<Vec<leaves::Model>>> {
    viewer.require(groups::ADMINISTRATION, "list all leaves")?;
    let mut select = leaves::Entity::find().order_by_desc(leaves::Column::FromDate);
    if let Some(status) = filter.status {
        select = select.filter(leaves::Column::Status.eq(status));
    }
    if let Some(user_id) = filter.user_id {
        select = select.filter(leaves::Column::UserId.eq(user_id));
    }
    if let Some(year) = filter.year {
        select = within_year(select, year)?;
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

async fn get_leave(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<leaves::Model>> {
    let leave = find_leave(&state.pool, id).await?;
    if !viewer.can_view_user(&state.pool, leave.user_id).await? {
        return Err(ApiError::forbidden("not allowed to view this leave"));
    }
    Ok(Json(leave))
}

async fn balance(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<Json<BalanceView>> {
    let user_id = query.user_id.unwrap_or(viewer.id);
    if user_id != viewer.id {
        viewer.require(groups::PEOPLE_LEADS, "view other balances")?;
        if !viewer.can_view_user(&state.pool, user_id).await? {
            return Err(ApiError::forbidden("user is outside your departments"));
        }
    }
    let year = query.year.unwrap_or_else(|| today().year());
    let balance = load_balance(&state.pool, &state.config, user_id, year).await?;
    Ok(Json(BalanceView {
        user_id,
        requestable: balance.requestable(),
        balance,
    }))
}

async fn approvals(
    State(state): State<AppState>,
    viewer: AuthUser,
) -> ApiResult<Json<Vec<leaves::Model>>> {
    pending_approvals(&state.pool, &viewer).await.map(Json)
}

#[instrument(name = "leaves.approve", skip_all, fields(approver = %viewer.id, leave_id = %id))]
async fn approve_leave(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<leaves::Model>> {
    let txn = state.pool.begin().await.map_err(db_error)?;
    let leave = pending_for_decision(&txn, &state, &viewer, id).await?;
    if leave.leave_type.is_paid() {
        for year in years_touched(leave.from_date, leave.to_date) {
            let balance = load_balance(&txn, &state.config, leave.user_id, year).await?;
            balance
                .ensure_fits(days_within_year(leave.from_date, leave.to_date, year), false)
                .map_err(rule_error)?;
        }
    }
    let leave = decide(&txn, &viewer, leave, leaves::Status::Approved, None).await?;
    txn.commit().await.map_err(db_error)?;
    info!(applicant = %leave.user_id, days = leave.credited_days, "leave approved");
    Ok(Json(leave))
}

#[instrument(name = "leaves.reject", skip_all, fields(approver = %viewer.id, leave_id = %id))]
async fn reject_leave(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Decision>,
) -> ApiResult<Json<leaves::Model>> {
    let mut validator = Validator::new();
    let remarks = validator.optional_text("remarks", body.remarks.as_deref(), 1000);
    validator.finish()?;
    let txn = state.pool.begin().await.map_err(db_error)?;
    let leave = pending_for_decision(&txn, &state, &viewer, id).await?;
    let leave = decide(&txn, &viewer, leave, leaves::Status::Rejected, remarks).await?;
    txn.commit().await.map_err(db_error)?;
    info!(applicant = %leave.user_id, "leave rejected");
    Ok(Json(leave))
}

#[instrument(name = "leaves.cancel", skip_all, fields(user_id = %viewer.id, leave_id = %id))]
async fn cancel_leave(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    let leave = find_leave(&state.pool, id).await?;
    if leave.user_id != viewer.id {
        return Err(ApiError::forbidden("only the applicant may cancel a leave"));
    }
    if leave.status == leaves::Status::Rejected {
        return Err(ApiError::bad_request("rejected leaves cannot be cancelled"));
    }
    let response = match plan_cancellation(leave.from_date, leave.to_date, today()).map_err(rule_error)? {
        CancellationPlan::Delete => {
            leave.delete(&state.pool).await.map_err(db_error)?;
            info!("leave cancelled before it started");
            CancelResponse {
                outcome: CancelOutcome::Deleted,
                leave: None,
            }
        }
        CancellationPlan::Shorten { to, credited_days } => {
            let mut active: leaves::ActiveModel = leave.into();
            active.to_date = Set(to);
            active.credited_days = Set(credited_days);
            active.updated_at = Set(now());
            let leave = active.update(&state.pool).await.map_err(db_error)?;
            info!(%to, credited_days, "running leave shortened");
            CancelResponse {
                outcome: CancelOutcome::Shortened,
                leave: Some(leave),
            }
        }
    };
    Ok(Json(response))
}

async fn list_entitlements(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(query): Query<EntitlementQuery>,
) -> ApiResult<Json<Vec<leave_entitlements::Model>>> {
    let mut select = leave_entitlements::Entity::find()
        .order_by_desc(leave_entitlements::Column::Year);
    match query.user_id {
        Some(user_id) if user_id != viewer.id => {
            viewer.require(groups::PEOPLE_LEADS, "view other entitlements")?;
            if !viewer.can_view_user(&state.pool, user_id).await? {
                return Err(ApiError::forbidden("user is outside your departments"));
            }
            select = select.filter(leave_entitlements::Column::UserId.eq(user_id));
        }
        None if viewer.role.is_org_wide() => {}
        _ => select = select.filter(leave_entitlements::Column::UserId.eq(viewer.id)),
    }
    if let Some(year) = query.year {
        select = select.filter(leave_entitlements::Column::Year.eq(year));
    }
    let rows = select.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

#[instrument(name = "leaves.entitlement", skip_all, fields(actor = %viewer.id))]
async fn upsert_entitlement(
    State(state): State<AppState>,
    viewer: AuthUser,
    Json(body): Json<EntitlementInput>,
) -> ApiResult<Json<leave_entitlements::Model>> {
    viewer.require(&[Role::Hr], "set leave entitlements")?;
    let mut validator = Validator::new();
    validator.check(
        (2000..=2100).contains(&body.year),
        "year",
        "must be between 2000 and 2100",
    );
    validator.check(
        (0..=366).contains(&body.entitled_days),
        "entitled_days",
        "must be between 0 and 366",
    );
    validator.check(
        (0..=366).contains(&body.accumulated_days),
        "accumulated_days",
        "must be between 0 and 366",
    );
    validator.finish()?;
    users::Entity::find_by_id(body.user_id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("user"))?;

    let existing = leave_entitlements::Entity::find()
        .filter(leave_entitlements::Column::UserId.eq(body.user_id))
        .filter(leave_entitlements::Column::Year.eq(body.year))
        .one(&state.pool)
        .await
        .map_err(db_error)?;
    let stamp = now();
    let model = match existing {
        Some(row) => {
            let mut active: leave_entitlements::ActiveModel = row.into();
            active.entitled_days = Set(body.entitled_days);
            active.accumulated_days = Set(body.accumulated_days);
            active.updated_at = Set(stamp);
            active.update(&state.pool).await
        }
        None => {
            leave_entitlements::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(body.user_id),
                year: Set(body.year),
                entitled_days: Set(body.entitled_days),
                accumulated_days: Set(body.accumulated_days),
                created_at: Set(stamp),
                updated_at: Set(stamp),
            }
            .insert(&state.pool)
            .await
        }
    }
    .map_err(db_error)?;
    info!(
        user_id = %model.user_id,
        year = model.year,
        entitled = model.entitled_days,
        accumulated = model.accumulated_days,
        "entitlement saved"
    );
    Ok(Json(model))
}

/// Computes a user's balance for `year`, falling back to the configured
/// default entitlement when HR has not set one.
pub(crate) async fn load_balance<C: ConnectionTrait>(
    db: &C,
    config: &AppConfig,
    user_id: Uuid,
    year: i32,
) -> ApiResult<LeaveBalance> {
    let entitlement = leave_entitlements::Entity::find()
        .filter(leave_entitlements::Column::UserId.eq(user_id))
        .filter(leave_entitlements::Column::Year.eq(year))
        .one(db)
        .await
        .map_err(db_error)?;
    let (entitled, accumulated) = entitlement
        .map(|row| (row.entitled_days, row.accumulated_days))
        .unwrap_or((config.default_entitled_days, 0));
    let rows = within_year(active_leaves(user_id), year)?
        .all(db)
        .await
        .map_err(db_error)?;
    let spans = rows
        .iter()
        .map(|row| LeaveSpan {
            from: row.from_date,
            to: row.to_date,
            state: match row.status {
                leaves::Status::Approved => SpanState::Approved,
                _ => SpanState::Pending,
            },
            paid: row.leave_type.is_paid(),
        })
        .collect::<Vec<_>>();
    Ok(LeaveBalance::compute(year, entitled, accumulated, &spans))
}

/// Pending leaves `viewer` is entitled to decide.
pub(crate) async fn pending_approvals<C: ConnectionTrait>(
    db: &C,
    viewer: &AuthUser,
) -> ApiResult<Vec<leaves::Model>> {
    let base = leaves::Entity::find()
        .filter(leaves::Column::Status.eq(leaves::Status::Pending))
        .filter(leaves::Column::UserId.ne(viewer.id))
        .order_by_asc(leaves::Column::FromDate);
    let select = match viewer.role {
        Role::Management => {
            base.filter(leaves::Column::ApproverRole.eq(leaves::ApproverRole::Management))
        }
        Role::Manager => {
            let members = members_of(db, &viewer.departments).await?;
            if members.is_empty() {
                return Ok(Vec::new());
            }
            base.filter(leaves::Column::ApproverRole.eq(leaves::ApproverRole::Manager))
                .filter(leaves::Column::UserId.is_in(members))
        }
        Role::Employee | Role::Hr => return Ok(Vec::new()),
    };
    select.all(db).await.map_err(db_error)
}

/// Loads a pending leave `viewer` may decide, holding the applicant's row
/// lock so the balance cannot move until the decision commits.
async fn pending_for_decision(
    txn: &DatabaseTransaction,
    state: &AppState,
    viewer: &AuthUser,
    id: Uuid,
) -> ApiResult<leaves::Model> {
    let leave = find_leave(txn, id).await?;
    lock_user(txn, leave.user_id).await?;
    let leave = find_leave(txn, id).await?;
    if leave.status != leaves::Status::Pending {
        return Err(ApiError::bad_request("only pending leaves can be decided"));
    }
    let (_, applicant_role) = load_user_role(txn, leave.user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let applicant_departments = departments_of(txn, leave.user_id).await?;
    let applicant = Party {
        id: leave.user_id,
        role: applicant_role,
        departments: &applicant_departments,
    };
    state
        .config
        .routing
        .may_decide(&viewer.party(), &applicant, authority(leave.approver_role))
        .map_err(|denied| ApiError::forbidden(denied.to_string()))?;
    Ok(leave)
}

async fn decide<C: ConnectionTrait>(
    db: &C,
    viewer: &AuthUser,
    leave: leaves::Model,
    status: leaves::Status,
    remarks: Option<String>,
) -> ApiResult<leaves::Model> {
    let stamp = now();
    let mut active: leaves::ActiveModel = leave.into();
    active.status = Set(status);
    active.decided_by = Set(Some(viewer.id));
    active.decided_at = Set(Some(stamp));
    active.remarks = Set(remarks);
    active.updated_at = Set(stamp);
    active.update(db).await.map_err(db_error)
}

async fn find_leave<C: ConnectionTrait>(db: &C, id: Uuid) -> ApiResult<leaves::Model> {
    leaves::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("leave"))
}

/// Serializes leave writes per applicant. SQLite ignores the row lock and
/// serializes whole transactions instead.
async fn lock_user(txn: &DatabaseTransaction, user_id: Uuid) -> ApiResult<()> {
    users::Entity::find_by_id(user_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(db_error)?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(())
}

fn active_leaves(user_id: Uuid) -> Select<leaves::Entity> {
    leaves::Entity::find()
        .filter(leaves::Column::UserId.eq(user_id))
        .filter(leaves::Column::Status.is_in(ACTIVE_STATES))
}

fn within_year(select: Select<leaves::Entity>, year: i32) -> ApiResult<Select<leaves::Entity>> {
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return Err(ApiError::invalid("year", "is out of range"));
    };
    Ok(select
        .filter(leaves::Column::FromDate.lte(last))
        .filter(leaves::Column::ToDate.gte(first)))
}

fn approver_role(authority: ApprovalAuthority) -> leaves::ApproverRole {
    match authority {
        ApprovalAuthority::Management => leaves::ApproverRole::Management,
        ApprovalAuthority::Manager => leaves::ApproverRole::Manager,
    }
}

fn authority(role: leaves::ApproverRole) -> ApprovalAuthority {
    match role {
        leaves::ApproverRole::Management => ApprovalAuthority::Management,
        leaves::ApproverRole::Manager => ApprovalAuthority::Manager,
    }
}

fn rule_error(err: LeaveRuleError) -> ApiError {
    match err {
        LeaveRuleError::InvertedRange { .. } => ApiError::invalid("to_date", err.to_string()),
        LeaveRuleError::StartsInPast { .. } => ApiError::invalid("from_date", err.to_string()),
        LeaveRuleError::AlreadyElapsed { .. } | LeaveRuleError::InsufficientBalance { .. } => {
            ApiError::bad_request(err.to_string())
        }
    }
}
