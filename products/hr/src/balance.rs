use chrono::NaiveDate;
use serde::Serialize;

use crate::LeaveRuleError;
use crate::calendar::days_within_year;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    Approved,
    Pending,
}

/// A stored leave reduced to what the balance needs.
#[derive(Debug, Clone, Copy)]
pub struct LeaveSpan {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub state: SpanState,
    /// Unpaid leave never draws on the entitlement.
    pub paid: bool,
}

/// Yearly balance: `balance = entitled + accumulated - availed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeaveBalance {
    pub year: i32,
    pub entitled: i32,
    pub accumulated: i32,
    pub availed: i32,
    pub pending: i32,
    pub balance: i32,
}

impl LeaveBalance {
    pub fn compute(year: i32, entitled: i32, accumulated: i32, spans: &[LeaveSpan]) -> Self {
        let mut availed = 0;
        let mut pending = 0;
        for span in spans.iter().filter(|s| s.paid) {
            let days = days_within_year(span.from, span.to, year);
            match span.state {
                SpanState::Approved => availed += days,
                SpanState::Pending => pending += days,
            }
        }
        Self {
            year,
            entitled,
            accumulated,
            availed,
            pending,
            balance: entitled + accumulated - availed,
        }
    }

    /// Days still requestable once pending requests are reserved.
    pub fn requestable(&self) -> i32 {
        self.balance - self.pending
    }

    /// Errors when `requested` in-year days do not fit.
    ///
    /// `reserve_pending` is false when approving a request that is itself
    /// counted in `pending`.
    pub fn ensure_fits(&self, requested: i32, reserve_pending: bool) -> Result<(), LeaveRuleError> {
        let available = if reserve_pending {
            self.requestable()
        } else {
            self.balance
        };
        if requested > available {
            return Err(LeaveRuleError::InsufficientBalance {
                year: self.year,
                requested,
                available: available.max(0),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn span(from: NaiveDate, to: NaiveDate, state: SpanState, paid: bool) -> LeaveSpan {
        LeaveSpan {
            from,
            to,
            state,
            paid,
        }
    }

    #[test]
    fn balance_is_entitled_plus_accumulated_minus_availed() {
        let spans = [
            span(date(2026, 2, 2), date(2026, 2, 4), SpanState::Approved, true),
            span(date(2026, 6, 1), date(2026, 6, 2), SpanState::Pending, true),
            span(date(2026, 7, 1), date(2026, 7, 9), SpanState::Approved, false),
        ];
        let balance = LeaveBalance::compute(2026, 24, 6, &spans);
        assert_eq!(balance.availed, 3);
        assert_eq!(balance.pending, 2);
        assert_eq!(balance.balance, 27);
        assert_eq!(balance.requestable(), 25);
    }

    #[test]
    fn only_in_year_days_are_availed() {
        let spans = [span(
            date(2025, 12, 29),
            date(2026, 1, 2),
            SpanState::Approved,
            true,
        )];
        assert_eq!(LeaveBalance::compute(2025, 24, 0, &spans).availed, 3);
        assert_eq!(LeaveBalance::compute(2026, 24, 0, &spans).availed, 2);
    }

    #[test]
    fn requests_beyond_the_balance_are_rejected() {
        let spans = [span(
            date(2026, 3, 1),
            date(2026, 3, 3),
            SpanState::Pending,
            true,
        )];
        let balance = LeaveBalance::compute(2026, 4, 0, &spans);
        assert_eq!(
            balance.ensure_fits(2, true),
            Err(LeaveRuleError::InsufficientBalance {
                year: 2026,
                requested: 2,
                available: 1,
            })
        );
        assert_eq!(balance.ensure_fits(3, false), Ok(()));
    }
}
