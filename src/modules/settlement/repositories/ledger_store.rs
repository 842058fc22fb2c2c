use async_trait::async_trait;

use crate::core::Result;
use crate::modules::customers::models::CustomerAdjustment;
use crate::modules::loans::models::{Loan, LoanInstallment};
use crate::modules::payments::models::Payment;

/// Entry point to the loan ledger: plain reads plus transaction start.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work. Every write made through it lands together on
    /// `commit` or not at all.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>>;

    async fn find_loan(&self, loan_id: &str) -> Result<Option<Loan>>;

    async fn find_payment(&self, payment_id: &str) -> Result<Option<Payment>>;

    /// Payments for a loan, newest first
    async fn payments_for_loan(&self, loan_id: &str) -> Result<Vec<Payment>>;

    /// Installments for a loan, ascending by installment number
    async fn installments_for_loan(&self, loan_id: &str) -> Result<Vec<LoanInstallment>>;

    /// Cheap connectivity probe for readiness checks
    async fn ping(&self) -> Result<()>;
}

/// Transaction-scoped repository set for one settle or reverse call.
///
/// Dropping a transaction without calling [`LedgerTransaction::commit`]
/// discards every write made through it.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Read a loan and hold its row lock until the transaction ends
    async fn lock_loan(&mut self, loan_id: &str) -> Result<Option<Loan>>;

    /// Write a loan's balances and status. Fails with `ConcurrencyConflict`
    /// if `loan.version` no longer matches the stored row; on success the
    /// version is bumped in place.
    async fn update_loan(&mut self, loan: &mut Loan) -> Result<()>;

    /// Read a payment and hold its row lock until the transaction ends
    async fn lock_payment(&mut self, payment_id: &str) -> Result<Option<Payment>>;

    async fn next_payment_number(&mut self) -> Result<String>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    /// Persist a payment's reversal fields
    async fn update_payment(&mut self, payment: &Payment) -> Result<()>;

    /// Locked installments for a loan, ascending by installment number
    async fn installments(&mut self, loan_id: &str) -> Result<Vec<LoanInstallment>>;

    async fn update_installment(&mut self, installment: &LoanInstallment) -> Result<()>;

    /// Queue a customer `total_paid` change for the stats relay
    async fn enqueue_customer_adjustment(&mut self, adjustment: &CustomerAdjustment) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
