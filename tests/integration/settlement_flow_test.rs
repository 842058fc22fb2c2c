// Settle: waterfall splits, loan transitions and all-or-nothing writes

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{TestDataFactory, TestLedger};
use pawnledger::core::AppError;
use pawnledger::modules::collateral::{ItemStatus, RecordingCollateralSignal};
use pawnledger::modules::loans::LoanStatus;
use pawnledger::modules::payments::PaymentStatus;
use pawnledger::modules::settlement::repositories::FailurePoint;
use pawnledger::modules::settlement::{LedgerStore, RetryPolicy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_partial_then_full_settlement() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(10), dec!(50), dec!(500));
    ledger.seed_loan(&loan).await;

    let first = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(100)))
        .await
        .unwrap();

    assert_eq!(first.payment.late_fee_amount, dec!(10));
    assert_eq!(first.payment.interest_amount, dec!(50));
    assert_eq!(first.payment.principal_amount, dec!(40));
    assert_eq!(first.payment.status, PaymentStatus::Completed);
    assert_eq!(first.loan.late_fee_remaining, Decimal::ZERO);
    assert_eq!(first.loan.interest_remaining, Decimal::ZERO);
    assert_eq!(first.loan.principal_remaining, dec!(460));
    assert_eq!(first.loan.status, LoanStatus::Active);
    assert!(!first.fully_paid);

    let second = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(460)))
        .await
        .unwrap();

    assert_eq!(second.payment.late_fee_amount, Decimal::ZERO);
    assert_eq!(second.payment.interest_amount, Decimal::ZERO);
    assert_eq!(second.payment.principal_amount, dec!(460));
    assert_eq!(second.payment.loan_balance_after, Decimal::ZERO);
    assert!(second.fully_paid);

    let stored = ledger.loan(&loan.id).await;
    assert_eq!(stored.status, LoanStatus::Paid);
    assert!(stored.paid_date.is_some());
    assert_eq!(stored.amount_paid, dec!(560));
    assert_eq!(stored.total_remaining(), Decimal::ZERO);

    // Full settlement releases the pledged item
    assert_eq!(
        ledger.collateral.calls().await,
        vec![(loan.item_id.clone(), ItemStatus::Available)]
    );
}

#[tokio::test]
async fn test_payment_snapshots_and_metadata() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(0), dec!(30), dec!(200));
    ledger.seed_loan(&loan).await;

    let outcome = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(50)))
        .await
        .unwrap();

    let payment = &outcome.payment;
    assert!(payment.payment_number.starts_with("PAY-"));
    assert_eq!(payment.customer_id, loan.customer_id);
    assert_eq!(payment.loan_balance_after, dec!(180));
    assert_eq!(payment.interest_balance_after, Decimal::ZERO);
    assert_eq!(payment.cash_session_id.as_deref(), Some("session-1"));

    let history = ledger.settlement.list_payments(&loan.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, payment.id);
}

#[tokio::test]
async fn test_overpayment_leaves_loan_untouched() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(10), dec!(50), dec!(500));
    ledger.seed_loan(&loan).await;

    let err = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(600)))
        .await
        .unwrap_err();

    match err {
        AppError::Overpayment { amount, total_owed } => {
            assert_eq!(amount, dec!(600));
            assert_eq!(total_owed, dec!(560));
        }
        other => panic!("expected overpayment, got {:?}", other),
    }

    assert_eq!(ledger.loan(&loan.id).await, loan);
    assert!(ledger.store.payments_for_loan(&loan.id).await.unwrap().is_empty());
    assert!(ledger.store.adjustments().await.is_empty());
}

#[tokio::test]
async fn test_closed_loans_reject_payments() {
    let ledger = TestLedger::new();

    for status in [LoanStatus::Paid, LoanStatus::Confiscated] {
        let mut loan = TestDataFactory::loan(dec!(0), dec!(0), dec!(100));
        loan.status = status;
        ledger.seed_loan(&loan).await;

        let err = ledger
            .settlement
            .settle(TestDataFactory::settle_request(&loan.id, dec!(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LoanNotPayable { .. }));
    }

    // Overdue and defaulted loans still take payments
    for status in [LoanStatus::Overdue, LoanStatus::Defaulted] {
        let mut loan = TestDataFactory::loan(dec!(5), dec!(0), dec!(100));
        loan.status = status;
        ledger.seed_loan(&loan).await;

        let outcome = ledger
            .settlement
            .settle(TestDataFactory::settle_request(&loan.id, dec!(10)))
            .await
            .unwrap();
        assert_eq!(outcome.loan.status, status);
    }
}

#[tokio::test]
async fn test_unknown_loan_is_not_found() {
    let ledger = TestLedger::new();

    let err = ledger
        .settlement
        .settle(TestDataFactory::settle_request("loan-missing", dec!(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_write_rolls_back_everything() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(10), dec!(50), dec!(500));
    ledger.seed_loan(&loan).await;

    for point in [
        FailurePoint::InsertPayment,
        FailurePoint::UpdateLoan,
        FailurePoint::EnqueueAdjustment,
        FailurePoint::Commit,
    ] {
        ledger.store.fail_on(Some(point)).await;

        let err = ledger
            .settlement
            .settle(TestDataFactory::settle_request(&loan.id, dec!(560)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)), "{:?}", point);

        assert_eq!(ledger.loan(&loan.id).await, loan);
        assert!(ledger.store.payments_for_loan(&loan.id).await.unwrap().is_empty());
        assert!(ledger.store.adjustments().await.is_empty());
    }

    assert!(ledger.collateral.calls().await.is_empty());
}

#[tokio::test]
async fn test_collateral_failure_does_not_fail_payment() {
    let ledger = TestLedger::with_collateral(RecordingCollateralSignal::failing(), RetryPolicy::none());
    let loan = TestDataFactory::loan(dec!(0), dec!(0), dec!(75.50));
    ledger.seed_loan(&loan).await;

    let outcome = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(75.50)))
        .await
        .unwrap();

    assert!(outcome.fully_paid);
    assert_eq!(ledger.loan(&loan.id).await.status, LoanStatus::Paid);
    assert_eq!(ledger.collateral.calls().await.len(), 1);
}

#[tokio::test]
async fn test_settlement_queues_customer_adjustment() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(0), dec!(20), dec!(80));
    ledger.seed_loan(&loan).await;

    let outcome = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(35)))
        .await
        .unwrap();

    let adjustments = ledger.store.adjustments().await;
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].customer_id, loan.customer_id);
    assert_eq!(adjustments[0].payment_id, outcome.payment.id);
    assert_eq!(adjustments[0].delta, dec!(35));
    assert!(adjustments[0].processed_at.is_none());
}

#[tokio::test]
async fn test_payoff_quote_tracks_balances() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(10), dec!(50), dec!(500));
    ledger.seed_loan(&loan).await;

    let before = ledger.settlement.payoff_quote(&loan.id).await.unwrap();
    assert_eq!(before.payoff_amount, dec!(560));
    assert!(before.accepts_payments);
    assert!(!before.overdue.is_overdue);

    ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(100)))
        .await
        .unwrap();

    let after = ledger.settlement.payoff_quote(&loan.id).await.unwrap();
    assert_eq!(after.payoff_amount, dec!(460));
    assert_eq!(after.amount_paid, dec!(100));
}
