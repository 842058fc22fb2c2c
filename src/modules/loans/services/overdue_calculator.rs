use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::loans::models::{Loan, LoanStatus};

/// Point-in-time overdue classification of a loan, for reporting only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueStatus {
    pub is_overdue: bool,
    pub is_in_grace_period: bool,
    pub days_until_due: i64,
    pub days_overdue: i64,
}

/// Due-date arithmetic over `(due_date, grace_period_days, status, now)`.
///
/// Only `active` loans report overdue: once a loan has been moved to
/// `overdue`, `defaulted` or `paid`, the transition has already happened.
/// Nothing here changes loan status.
pub struct OverdueCalculator;

impl OverdueCalculator {
    pub fn is_overdue(status: LoanStatus, due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        status == LoanStatus::Active && now > due_date
    }

    pub fn is_in_grace_period(
        status: LoanStatus,
        due_date: DateTime<Utc>,
        grace_period_days: i32,
        now: DateTime<Utc>,
    ) -> bool {
        Self::is_overdue(status, due_date, now)
            && now < due_date + Duration::days(i64::from(grace_period_days))
    }

    /// Whole days left before the due date, zero once it has passed
    pub fn days_until_due(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        ((due_date - now).num_hours() / 24).max(0)
    }

    pub fn days_overdue(status: LoanStatus, due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        if Self::is_overdue(status, due_date, now) {
            (now - due_date).num_hours() / 24
        } else {
            0
        }
    }

    pub fn evaluate(loan: &Loan, now: DateTime<Utc>) -> OverdueStatus {
        OverdueStatus {
            is_overdue: Self::is_overdue(loan.status, loan.due_date, now),
            is_in_grace_period: Self::is_in_grace_period(
                loan.status,
                loan.due_date,
                loan.grace_period_days,
                now,
            ),
            days_until_due: Self::days_until_due(loan.due_date, now),
            days_overdue: Self::days_overdue(loan.status, loan.due_date, now),
        }
    }
}
