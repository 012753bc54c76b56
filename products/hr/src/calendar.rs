use chrono::{Datelike, NaiveDate};

use crate::LeaveRuleError;

/// Inclusive calendar-day count of a leave range.
pub fn credited_days(from: NaiveDate, to: NaiveDate) -> Result<i32, LeaveRuleError> {
    if to < from {
        return Err(LeaveRuleError::InvertedRange { from, to });
    }
    Ok((to - from).num_days() as i32 + 1)
}

/// Days of `[from, to]` that fall inside calendar `year`. Zero when disjoint.
pub fn days_within_year(from: NaiveDate, to: NaiveDate, year: i32) -> i32 {
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0;
    };
    let start = from.max(first);
    let end = to.min(last);
    credited_days(start, end).unwrap_or(0)
}

pub fn years_touched(from: NaiveDate, to: NaiveDate) -> Vec<i32> {
    if to < from {
        return Vec::new();
    }
    (from.year()..=to.year()).collect()
}

pub fn ranges_overlap(a_from: NaiveDate, a_to: NaiveDate, b_from: NaiveDate, b_to: NaiveDate) -> bool {
    a_from <= b_to && b_from <= a_to
}
