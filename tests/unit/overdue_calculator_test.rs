// Overdue and grace period classification

use chrono::{DateTime, Duration, TimeZone, Utc};
use pawnledger::modules::loans::{LoanStatus, OverdueCalculator};
use proptest::prelude::*;

fn due() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_not_overdue_at_exact_due_time() {
    assert!(!OverdueCalculator::is_overdue(LoanStatus::Active, due(), due()));
    assert!(OverdueCalculator::is_overdue(
        LoanStatus::Active,
        due(),
        due() + Duration::seconds(1)
    ));
}

#[test]
fn test_only_active_loans_report_overdue() {
    let late = due() + Duration::days(10);
    for status in [
        LoanStatus::Overdue,
        LoanStatus::Defaulted,
        LoanStatus::Paid,
        LoanStatus::Confiscated,
        LoanStatus::Renewed,
    ] {
        assert!(!OverdueCalculator::is_overdue(status, due(), late));
        assert_eq!(OverdueCalculator::days_overdue(status, due(), late), 0);
    }
}

#[test]
fn test_grace_period_window() {
    let grace_days = 5;
    let inside = due() + Duration::days(4) + Duration::hours(23);
    let boundary = due() + Duration::days(5);

    assert!(OverdueCalculator::is_in_grace_period(
        LoanStatus::Active,
        due(),
        grace_days,
        inside
    ));
    assert!(!OverdueCalculator::is_in_grace_period(
        LoanStatus::Active,
        due(),
        grace_days,
        boundary
    ));
    // Before the due date there is nothing to be graceful about
    assert!(!OverdueCalculator::is_in_grace_period(
        LoanStatus::Active,
        due(),
        grace_days,
        due() - Duration::days(1)
    ));
}

#[test]
fn test_day_counts_floor_partial_days() {
    let now = due() - Duration::hours(47);
    assert_eq!(OverdueCalculator::days_until_due(due(), now), 1);

    let now = due() + Duration::hours(71);
    assert_eq!(OverdueCalculator::days_until_due(due(), now), 0);
    assert_eq!(OverdueCalculator::days_overdue(LoanStatus::Active, due(), now), 2);
}

proptest! {
    #[test]
    fn prop_due_and_overdue_days_are_exclusive(offset_hours in -2_000i64..2_000i64) {
        let now = due() + Duration::hours(offset_hours);
        let until = OverdueCalculator::days_until_due(due(), now);
        let overdue = OverdueCalculator::days_overdue(LoanStatus::Active, due(), now);

        prop_assert!(until >= 0);
        prop_assert!(overdue >= 0);
        prop_assert!(until == 0 || overdue == 0);
    }
}
