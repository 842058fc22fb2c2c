// Reverse: exact inverse of settle, loan resurrection and re-pledge

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{TestDataFactory, TestLedger};
use pawnledger::core::AppError;
use pawnledger::modules::collateral::ItemStatus;
use pawnledger::modules::loans::LoanStatus;
use pawnledger::modules::payments::PaymentStatus;
use pawnledger::modules::settlement::repositories::FailurePoint;
use pawnledger::modules::settlement::LedgerStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_reversing_final_payment_reopens_loan() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(10), dec!(50), dec!(500));
    ledger.seed_loan(&loan).await;

    ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(100)))
        .await
        .unwrap();
    let last = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(460)))
        .await
        .unwrap();
    assert_eq!(last.loan.status, LoanStatus::Paid);

    let outcome = ledger
        .reversal
        .reverse(TestDataFactory::reverse_request(&last.payment.id))
        .await
        .unwrap();

    assert!(outcome.loan_reactivated);
    assert_eq!(outcome.payment.status, PaymentStatus::Reversed);
    assert_eq!(outcome.payment.reversed_by.as_deref(), Some("manager-1"));
    assert!(outcome.payment.reversed_at.is_some());

    let stored = ledger.loan(&loan.id).await;
    assert_eq!(stored.status, LoanStatus::Active);
    assert!(stored.paid_date.is_none());
    assert_eq!(stored.principal_remaining, dec!(460));
    assert_eq!(stored.interest_remaining, Decimal::ZERO);
    assert_eq!(stored.late_fee_remaining, Decimal::ZERO);
    assert_eq!(stored.amount_paid, dec!(100));

    assert_eq!(
        ledger.collateral.calls().await,
        vec![
            (loan.item_id.clone(), ItemStatus::Available),
            (loan.item_id.clone(), ItemStatus::Collateral),
        ]
    );
}

#[tokio::test]
async fn test_settle_then_reverse_restores_loan_exactly() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(12.40), dec!(33.10), dec!(250.00));
    ledger.seed_loan(&loan).await;

    for amount in [dec!(5.00), dec!(40.00), dec!(295.50)] {
        let before = ledger.loan(&loan.id).await;

        let settled = ledger
            .settlement
            .settle(TestDataFactory::settle_request(&loan.id, amount))
            .await
            .unwrap();
        ledger
            .reversal
            .reverse(TestDataFactory::reverse_request(&settled.payment.id))
            .await
            .unwrap();

        let after = ledger.loan(&loan.id).await;
        assert_eq!(after.late_fee_remaining, before.late_fee_remaining);
        assert_eq!(after.interest_remaining, before.interest_remaining);
        assert_eq!(after.principal_remaining, before.principal_remaining);
        assert_eq!(after.amount_paid, before.amount_paid);
        assert_eq!(after.status, before.status);
        assert_eq!(after.paid_date, before.paid_date);
    }
}

#[tokio::test]
async fn test_payment_reverses_only_once() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(0), dec!(10), dec!(100));
    ledger.seed_loan(&loan).await;

    let settled = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(20)))
        .await
        .unwrap();
    ledger
        .reversal
        .reverse(TestDataFactory::reverse_request(&settled.payment.id))
        .await
        .unwrap();
    let loan_after_first = ledger.loan(&loan.id).await;

    let err = ledger
        .reversal
        .reverse(TestDataFactory::reverse_request(&settled.payment.id))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PaymentNotReversible { .. }));
    assert_eq!(ledger.loan(&loan.id).await, loan_after_first);
}

#[tokio::test]
async fn test_reversal_of_partial_payment_keeps_loan_active() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(10), dec!(50), dec!(500));
    ledger.seed_loan(&loan).await;

    let settled = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(100)))
        .await
        .unwrap();

    let outcome = ledger
        .reversal
        .reverse(TestDataFactory::reverse_request(&settled.payment.id))
        .await
        .unwrap();

    assert!(!outcome.loan_reactivated);
    assert_eq!(outcome.loan.total_remaining(), dec!(560));
    assert!(ledger.collateral.calls().await.is_empty());
}

#[tokio::test]
async fn test_reversal_queues_negative_adjustment() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(0), dec!(0), dec!(90));
    ledger.seed_loan(&loan).await;

    let settled = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(90)))
        .await
        .unwrap();
    ledger
        .reversal
        .reverse(TestDataFactory::reverse_request(&settled.payment.id))
        .await
        .unwrap();

    let deltas: Vec<Decimal> = ledger
        .store
        .adjustments()
        .await
        .iter()
        .map(|a| a.delta)
        .collect();
    assert_eq!(deltas, vec![dec!(90), dec!(-90)]);
}

#[tokio::test]
async fn test_failed_reversal_changes_nothing() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(0), dec!(0), dec!(90));
    ledger.seed_loan(&loan).await;

    let settled = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(90)))
        .await
        .unwrap();
    let paid_loan = ledger.loan(&loan.id).await;

    ledger.store.fail_on(Some(FailurePoint::UpdatePayment)).await;
    let err = ledger
        .reversal
        .reverse(TestDataFactory::reverse_request(&settled.payment.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));

    assert_eq!(ledger.loan(&loan.id).await, paid_loan);
    let payment = ledger.store.find_payment(&settled.payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(ledger.store.adjustments().await.len(), 1);
}

#[tokio::test]
async fn test_unknown_payment_is_not_found() {
    let ledger = TestLedger::new();

    let err = ledger
        .reversal
        .reverse(TestDataFactory::reverse_request("pay-missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
