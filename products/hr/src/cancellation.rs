use chrono::{Duration, NaiveDate};

use crate::LeaveRuleError;
use crate::calendar::credited_days;

/// What cancelling a leave does to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationPlan {
    /// Nothing of the leave has been taken yet.
    Delete,
    /// The leave is running: keep the days already taken.
    Shorten { to: NaiveDate, credited_days: i32 },
}

pub fn plan_cancellation(
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Result<CancellationPlan, LeaveRuleError> {
    if to < from {
        return Err(LeaveRuleError::InvertedRange { from, to });
    }
    if to < today {
        return Err(LeaveRuleError::AlreadyElapsed { to });
    }
    if from >= today {
        return Ok(CancellationPlan::Delete);
    }
    let yesterday = today - Duration::days(1);
    Ok(CancellationPlan::Shorten {
        to: yesterday,
        credited_days: credited_days(from, yesterday)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn future_leave_is_deleted() {
        let today = date(2026, 4, 10);
        assert_eq!(
            plan_cancellation(date(2026, 4, 11), date(2026, 4, 15), today),
            Ok(CancellationPlan::Delete)
        );
    }

    #[test]
    fn leave_starting_today_is_deleted() {
        let today = date(2026, 4, 10);
        assert_eq!(
            plan_cancellation(today, date(2026, 4, 12), today),
            Ok(CancellationPlan::Delete)
        );
    }

    #[test]
    fn running_leave_ends_yesterday() {
        let today = date(2026, 4, 10);
        assert_eq!(
            plan_cancellation(date(2026, 4, 7), date(2026, 4, 14), today),
            Ok(CancellationPlan::Shorten {
                to: date(2026, 4, 9),
                credited_days: 3,
            })
        );
    }

    #[test]
    fn leave_ending_today_keeps_earlier_days() {
        let today = date(2026, 3, 1);
        assert_eq!(
            plan_cancellation(date(2026, 2, 27), today, today),
            Ok(CancellationPlan::Shorten {
                to: date(2026, 2, 28),
                credited_days: 2,
            })
        );
    }

    #[test]
    fn elapsed_leave_cannot_be_cancelled() {
        let today = date(2026, 4, 10);
        assert_eq!(
            plan_cancellation(date(2026, 4, 1), date(2026, 4, 9), today),
            Err(LeaveRuleError::AlreadyElapsed {
                to: date(2026, 4, 9)
            })
        );
    }
}
