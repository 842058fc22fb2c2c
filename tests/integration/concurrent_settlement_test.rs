// Per-loan serialization and conflict retry

#[path = "../helpers/mod.rs"]
mod helpers;

use std::time::Duration;

use helpers::{TestDataFactory, TestLedger};
use pawnledger::core::AppError;
use pawnledger::modules::collateral::RecordingCollateralSignal;
use pawnledger::modules::loans::LoanStatus;
use pawnledger::modules::settlement::{LedgerStore, RetryPolicy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn retrying(max_attempts: u32) -> TestLedger {
    TestLedger::with_collateral(
        RecordingCollateralSignal::new(),
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_never_lose_updates() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(10), dec!(50), dec!(500));
    ledger.seed_loan(&loan).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let settlement = ledger.settlement.clone();
        let loan_id = loan.id.clone();
        handles.push(tokio::spawn(async move {
            settlement
                .settle(TestDataFactory::settle_request(&loan_id, dec!(25)))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = ledger.loan(&loan.id).await;
    assert_eq!(stored.amount_paid, dec!(500));
    assert_eq!(stored.total_remaining(), dec!(60));
    assert_eq!(stored.late_fee_remaining, Decimal::ZERO);
    assert_eq!(stored.interest_remaining, Decimal::ZERO);
    assert_eq!(stored.principal_remaining, dec!(60));
    assert_eq!(stored.version, loan.version + 20);

    let payments = ledger.store.payments_for_loan(&loan.id).await.unwrap();
    assert_eq!(payments.len(), 20);
    let split_total: Decimal = payments
        .iter()
        .map(|p| p.late_fee_amount + p.interest_amount + p.principal_amount)
        .sum();
    assert_eq!(split_total, dec!(500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_payoffs_close_the_loan_once() {
    let ledger = TestLedger::new();
    let loan = TestDataFactory::loan(dec!(0), dec!(0), dec!(100));
    ledger.seed_loan(&loan).await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let settlement = ledger.settlement.clone();
        let loan_id = loan.id.clone();
        handles.push(tokio::spawn(async move {
            settlement
                .settle(TestDataFactory::settle_request(&loan_id, dec!(100)))
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert!(outcome.fully_paid);
                succeeded += 1;
            }
            Err(AppError::LoanNotPayable { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(ledger.loan(&loan.id).await.status, LoanStatus::Paid);
}

#[tokio::test]
async fn test_conflict_is_retried() {
    let ledger = retrying(3);
    let loan = TestDataFactory::loan(dec!(0), dec!(0), dec!(100));
    ledger.seed_loan(&loan).await;
    ledger.store.inject_conflicts(2);

    let outcome = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(30)))
        .await
        .unwrap();

    assert_eq!(outcome.loan.principal_remaining, dec!(70));
    // Only the successful attempt left a payment behind
    assert_eq!(ledger.store.payments_for_loan(&loan.id).await.unwrap().len(), 1);
    assert_eq!(ledger.store.adjustments().await.len(), 1);
}

#[tokio::test]
async fn test_conflict_surfaces_when_retries_run_out() {
    let ledger = retrying(2);
    let loan = TestDataFactory::loan(dec!(0), dec!(0), dec!(100));
    ledger.seed_loan(&loan).await;
    ledger.store.inject_conflicts(5);

    let err = ledger
        .settlement
        .settle(TestDataFactory::settle_request(&loan.id, dec!(30)))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(ledger.loan(&loan.id).await, loan);
    assert!(ledger.store.payments_for_loan(&loan.id).await.unwrap().is_empty());
}
