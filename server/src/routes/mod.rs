//! REST surface under `/api`.

mod associations;
mod auth;
pub(crate) mod dashboard;
mod departments;
mod goals;
mod indicators;
pub(crate) mod leaves;
mod staff;
mod tasks;
mod tickets;
mod users;

use axum::Router;
use chrono::{NaiveDate, Utc};
use platform_api::ApiError;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DbErr, SqlErr};
use serde::Deserialize;

use crate::http::AppState;

const DEFAULT_PAGE: u64 = 50;
const MAX_PAGE: u64 = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/users", users::routes())
        .nest("/api/roles", users::role_routes())
        .nest("/api/departments", departments::routes())
        .nest("/api/designations", departments::designation_routes())
        .nest("/api/staff", staff::routes())
        .nest("/api/associations", associations::routes())
        .nest("/api/leaves", leaves::routes())
        .nest("/api/tasks", tasks::routes())
        .nest("/api/tickets", tickets::routes())
        .nest("/api/kmi", indicators::kmi_routes())
        .nest("/api/kpi", indicators::kpi_routes())
        .nest("/api/kai", indicators::kai_routes())
        .nest("/api/goals", goals::routes())
        .nest("/api/dashboard", dashboard::routes())
}

/// Maps constraint violations to client errors and hides everything else.
pub(crate) fn db_error(err: DbErr) -> ApiError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(%detail, "unique constraint violated");
            ApiError::Conflict("a record with these values already exists".into())
        }
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
            tracing::debug!(%detail, "foreign key constraint violated");
            ApiError::bad_request("a referenced record does not exist")
        }
        _ => ApiError::internal(err.into()),
    }
}

pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Page {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Page {
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

/// Trims an optional query filter, dropping blank values.
pub(crate) fn filter_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        let page = Page {
            limit: Some(10_000),
            offset: None,
        };
        assert_eq!(page.limit(), MAX_PAGE);
        assert_eq!(page.offset(), 0);
        assert_eq!(Page::default().limit(), DEFAULT_PAGE);
    }

    #[test]
    fn blank_filters_are_dropped() {
        assert_eq!(filter_text(Some("  ")), None);
        assert_eq!(filter_text(Some(" ada ")), Some("ada".to_string()));
    }
}
