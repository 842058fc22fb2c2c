// Allocation waterfall: late fee, then interest, then principal

use pawnledger::core::AppError;
use pawnledger::modules::loans::{AllocationWaterfall, Loan, LoanStatus, PaymentPlanType};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn cents(value: u64) -> Decimal {
    Decimal::new(value as i64, 2)
}

fn loan(late_fee: Decimal, interest: Decimal, principal: Decimal) -> Loan {
    let now = chrono::Utc::now();
    Loan {
        id: "loan-1".to_string(),
        loan_number: "LN-0001".to_string(),
        customer_id: "cust-1".to_string(),
        item_id: "item-1".to_string(),
        branch_id: "branch-1".to_string(),
        loan_amount: principal,
        principal_remaining: principal,
        interest_remaining: interest,
        late_fee_remaining: late_fee,
        amount_paid: Decimal::ZERO,
        status: LoanStatus::Active,
        payment_plan_type: PaymentPlanType::Single,
        due_date: now,
        grace_period_days: 0,
        paid_date: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_partial_payment_scenario() {
    let allocation = AllocationWaterfall::allocate(dec!(100), dec!(10), dec!(50), dec!(500));
    assert_eq!(allocation.late_fee, dec!(10));
    assert_eq!(allocation.interest, dec!(50));
    assert_eq!(allocation.principal, dec!(40));
}

#[test]
fn test_small_payment_goes_entirely_to_late_fee() {
    let allocation = AllocationWaterfall::allocate(dec!(7.25), dec!(10), dec!(50), dec!(500));
    assert_eq!(allocation.late_fee, dec!(7.25));
    assert_eq!(allocation.interest, Decimal::ZERO);
    assert_eq!(allocation.principal, Decimal::ZERO);
}

#[test]
fn test_zero_components_are_skipped() {
    let allocation = AllocationWaterfall::allocate(dec!(460), dec!(0), dec!(0), dec!(460));
    assert_eq!(allocation.late_fee, Decimal::ZERO);
    assert_eq!(allocation.interest, Decimal::ZERO);
    assert_eq!(allocation.principal, dec!(460));
}

#[test]
fn test_overpayment_rejected_with_both_amounts() {
    let loan = loan(dec!(10), dec!(50), dec!(500));

    match AllocationWaterfall::allocate_for_loan(&loan, dec!(560.01)) {
        Err(AppError::Overpayment { amount, total_owed }) => {
            assert_eq!(amount, dec!(560.01));
            assert_eq!(total_owed, dec!(560));
        }
        other => panic!("expected overpayment, got {:?}", other),
    }

    let exact = AllocationWaterfall::allocate_for_loan(&loan, dec!(560)).unwrap();
    assert_eq!(exact.total(), dec!(560));
}

proptest! {
    /// Splits are never negative and never exceed their component
    #[test]
    fn prop_splits_bounded_by_components(
        payment in 0u64..2_000_000u64,
        late_fee in 0u64..100_000u64,
        interest in 0u64..500_000u64,
        principal in 0u64..1_000_000u64,
    ) {
        let (payment, late_fee, interest, principal) =
            (cents(payment), cents(late_fee), cents(interest), cents(principal));

        let allocation = AllocationWaterfall::allocate(payment, late_fee, interest, principal);

        prop_assert!(allocation.late_fee >= Decimal::ZERO);
        prop_assert!(allocation.interest >= Decimal::ZERO);
        prop_assert!(allocation.principal >= Decimal::ZERO);
        prop_assert!(allocation.late_fee <= late_fee);
        prop_assert!(allocation.interest <= interest);
        prop_assert!(allocation.principal <= principal);
        prop_assert!(allocation.total() <= payment);
    }

    /// Interest is only touched once the late fee is cleared, principal only
    /// once interest is cleared
    #[test]
    fn prop_priority_order(
        payment in 0u64..2_000_000u64,
        late_fee in 0u64..100_000u64,
        interest in 0u64..500_000u64,
        principal in 0u64..1_000_000u64,
    ) {
        let (payment, late_fee, interest, principal) =
            (cents(payment), cents(late_fee), cents(interest), cents(principal));

        let allocation = AllocationWaterfall::allocate(payment, late_fee, interest, principal);

        if allocation.interest > Decimal::ZERO {
            prop_assert_eq!(allocation.late_fee, late_fee);
        }
        if allocation.principal > Decimal::ZERO {
            prop_assert_eq!(allocation.interest, interest);
        }
    }

    /// Any payment within the balance is allocated in full
    #[test]
    fn prop_payment_within_balance_fully_allocated(
        late_fee in 0u64..100_000u64,
        interest in 0u64..500_000u64,
        principal in 1u64..1_000_000u64,
        fraction in 1u64..=100u64,
    ) {
        let loan = loan(cents(late_fee), cents(interest), cents(principal));
        let payment = (loan.total_remaining() * Decimal::from(fraction) / Decimal::from(100))
            .round_dp(2)
            .max(dec!(0.01));

        let allocation = AllocationWaterfall::allocate_for_loan(&loan, payment).unwrap();
        prop_assert_eq!(allocation.total(), payment);
    }
}
