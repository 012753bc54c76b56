//! HR business rules with no I/O.
//!
//! The server loads rows, hands plain values to these functions and persists
//! whatever they decide. Everything here is deterministic given `today`.

pub mod balance;
pub mod calendar;
pub mod cancellation;
pub mod performance;
pub mod routing;

use chrono::NaiveDate;
use thiserror::Error;

pub use balance::{LeaveBalance, LeaveSpan, SpanState};
pub use calendar::{credited_days, days_within_year, ranges_overlap, years_touched};
pub use cancellation::{CancellationPlan, plan_cancellation};
pub use routing::{ApprovalAuthority, DecisionDenied, Party, RoutingPolicy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeaveRuleError {
    #[error("to_date {to} is before from_date {from}")]
    InvertedRange { from: NaiveDate, to: NaiveDate },
    #[error("leave cannot start in the past ({from})")]
    StartsInPast { from: NaiveDate },
    #[error("leave ended on {to} and can no longer be cancelled")]
    AlreadyElapsed { to: NaiveDate },
    #[error("requested {requested} day(s) in {year} but only {available} remain")]
    InsufficientBalance {
        year: i32,
        requested: i32,
        available: i32,
    },
}

/// Checks a new request's dates against `today` and returns its day count.
pub fn validate_request(
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Result<i32, LeaveRuleError> {
    let days = credited_days(from, to)?;
    if from < today {
        return Err(LeaveRuleError::StartsInPast { from });
    }
    Ok(days)
}
