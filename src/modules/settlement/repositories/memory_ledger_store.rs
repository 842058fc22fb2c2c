// In-process ledger store
//
// Transactions are serialized: `begin` takes the store lock and holds it
// until the transaction is committed or dropped. Writes go to a staged copy
// of the state that replaces the live state only on commit.
//
// Used by tests and local runs without a database. Failure injection:
// - fail_on(point): the next transactions fail at that write step
// - inject_conflicts(n): the next n loan writes report a version conflict
// - fail_customer_updates(n): the next n customer adjustments fail to apply

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::{AppError, Result};
use crate::modules::customers::models::{AdjustmentApplication, Customer, CustomerAdjustment};
use crate::modules::customers::repositories::{CustomerAdjustmentOutbox, CustomerRepository};
use crate::modules::loans::models::{Loan, LoanInstallment};
use crate::modules::payments::models::Payment;
use crate::modules::settlement::repositories::{LedgerStore, LedgerTransaction};

/// Write step at which an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    UpdateLoan,
    InsertPayment,
    UpdatePayment,
    UpdateInstallment,
    EnqueueAdjustment,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    loans: HashMap<String, Loan>,
    payments: HashMap<String, Payment>,
    installments: HashMap<String, Vec<LoanInstallment>>,
    customers: HashMap<String, Customer>,
    adjustments: Vec<CustomerAdjustment>,
    adjustment_seq: i64,
    payment_seq: u64,
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    fail_on: Mutex<Option<FailurePoint>>,
    pending_conflicts: Arc<AtomicU32>,
    pending_customer_failures: AtomicU32,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_loan(&self, loan: Loan) {
        self.state.lock().await.loans.insert(loan.id.clone(), loan);
    }

    pub async fn insert_installments(&self, loan_id: &str, mut installments: Vec<LoanInstallment>) {
        installments.sort_by_key(|i| i.installment_number);
        self.state
            .lock()
            .await
            .installments
            .insert(loan_id.to_string(), installments);
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.state
            .lock()
            .await
            .customers
            .insert(customer.id.clone(), customer);
    }

    /// Every adjustment ever enqueued, processed or not
    pub async fn adjustments(&self) -> Vec<CustomerAdjustment> {
        self.state.lock().await.adjustments.clone()
    }

    pub async fn fail_on(&self, point: Option<FailurePoint>) {
        *self.fail_on.lock().await = point;
    }

    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn fail_customer_updates(&self, count: u32) {
        self.pending_customer_failures.store(count, Ordering::SeqCst);
    }
}

/// Decrement a counter if positive; true when it was
fn consume(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>> {
        let fail_on = *self.fail_on.lock().await;
        let live = self.state.clone().lock_owned().await;
        let staged = live.clone();

        Ok(Box::new(MemoryLedgerTransaction {
            live,
            staged,
            fail_on,
            pending_conflicts: self.pending_conflicts.clone(),
        }))
    }

    async fn find_loan(&self, loan_id: &str) -> Result<Option<Loan>> {
        Ok(self.state.lock().await.loans.get(loan_id).cloned())
    }

    async fn find_payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        Ok(self.state.lock().await.payments.get(payment_id).cloned())
    }

    async fn payments_for_loan(&self, loan_id: &str) -> Result<Vec<Payment>> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            b.payment_date
                .cmp(&a.payment_date)
                .then_with(|| b.payment_number.cmp(&a.payment_number))
        });
        Ok(payments)
    }

    async fn installments_for_loan(&self, loan_id: &str) -> Result<Vec<LoanInstallment>> {
        Ok(self
            .state
            .lock()
            .await
            .installments
            .get(loan_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub struct MemoryLedgerTransaction {
    live: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
    fail_on: Option<FailurePoint>,
    pending_conflicts: Arc<AtomicU32>,
}

impl MemoryLedgerTransaction {
    fn check(&self, point: FailurePoint) -> Result<()> {
        if self.fail_on == Some(point) {
            return Err(AppError::Persistence(format!(
                "injected failure at {:?}",
                point
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTransaction {
    async fn lock_loan(&mut self, loan_id: &str) -> Result<Option<Loan>> {
        Ok(self.staged.loans.get(loan_id).cloned())
    }

    async fn update_loan(&mut self, loan: &mut Loan) -> Result<()> {
        self.check(FailurePoint::UpdateLoan)?;

        if consume(&self.pending_conflicts) {
            return Err(AppError::conflict(format!(
                "Loan {} changed since version {}",
                loan.id, loan.version
            )));
        }

        let stored = self
            .staged
            .loans
            .get_mut(&loan.id)
            .ok_or_else(|| AppError::not_found(format!("Loan '{}' not found", loan.id)))?;

        if stored.version != loan.version {
            return Err(AppError::conflict(format!(
                "Loan {} changed since version {}",
                loan.id, loan.version
            )));
        }

        loan.version += 1;
        *stored = loan.clone();
        Ok(())
    }

    async fn lock_payment(&mut self, payment_id: &str) -> Result<Option<Payment>> {
        Ok(self.staged.payments.get(payment_id).cloned())
    }

    async fn next_payment_number(&mut self) -> Result<String> {
        self.staged.payment_seq += 1;
        Ok(format!(
            "PAY-{}-{:08}",
            Utc::now().format("%Y%m%d"),
            self.staged.payment_seq
        ))
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.check(FailurePoint::InsertPayment)?;

        if self.staged.payments.contains_key(&payment.id) {
            return Err(AppError::Persistence(format!("Duplicate payment {}", payment.id)));
        }
        // Same classification as the unique payment number index on MySQL
        if self
            .staged
            .payments
            .values()
            .any(|p| p.payment_number == payment.payment_number)
        {
            return Err(AppError::conflict(format!(
                "Payment number {} already taken",
                payment.payment_number
            )));
        }

        self.staged
            .payments
            .insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        self.check(FailurePoint::UpdatePayment)?;

        let stored = self
            .staged
            .payments
            .get_mut(&payment.id)
            .ok_or_else(|| AppError::not_found(format!("Payment '{}' not found", payment.id)))?;
        *stored = payment.clone();
        Ok(())
    }

    async fn installments(&mut self, loan_id: &str) -> Result<Vec<LoanInstallment>> {
        Ok(self
            .staged
            .installments
            .get(loan_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_installment(&mut self, installment: &LoanInstallment) -> Result<()> {
        self.check(FailurePoint::UpdateInstallment)?;

        let stored = self
            .staged
            .installments
            .get_mut(&installment.loan_id)
            .and_then(|list| list.iter_mut().find(|i| i.id == installment.id))
            .ok_or_else(|| {
                AppError::not_found(format!("Installment '{}' not found", installment.id))
            })?;
        *stored = installment.clone();
        Ok(())
    }

    async fn enqueue_customer_adjustment(&mut self, adjustment: &CustomerAdjustment) -> Result<()> {
        self.check(FailurePoint::EnqueueAdjustment)?;

        self.staged.adjustment_seq += 1;
        let mut queued = adjustment.clone();
        queued.sequence = self.staged.adjustment_seq;
        self.staged.adjustments.push(queued);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.check(FailurePoint::Commit)?;

        let MemoryLedgerTransaction {
            mut live, staged, ..
        } = *self;
        *live = staged;
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for MemoryLedgerStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Customer>> {
        Ok(self.state.lock().await.customers.get(id).cloned())
    }
}

#[async_trait]
impl CustomerAdjustmentOutbox for MemoryLedgerStore {
    async fn pending(&self, limit: u32, max_attempts: i32) -> Result<Vec<CustomerAdjustment>> {
        let state = self.state.lock().await;
        let mut pending: Vec<CustomerAdjustment> = state
            .adjustments
            .iter()
            .filter(|a| a.processed_at.is_none() && a.attempts < max_attempts)
            .cloned()
            .collect();
        pending.sort_by_key(|a| a.sequence);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn apply_adjustment(
        &self,
        adjustment: &CustomerAdjustment,
        at: DateTime<Utc>,
    ) -> Result<AdjustmentApplication> {
        let mut state = self.state.lock().await;

        let Some(queued) = state
            .adjustments
            .iter()
            .find(|a| a.id == adjustment.id && a.processed_at.is_none())
            .cloned()
        else {
            return Ok(AdjustmentApplication::Skipped);
        };

        let blocked = state.adjustments.iter().any(|a| {
            a.customer_id == queued.customer_id
                && a.processed_at.is_none()
                && a.sequence < queued.sequence
        });
        if blocked {
            return Ok(AdjustmentApplication::Blocked);
        }

        if consume(&self.pending_customer_failures) {
            return Err(AppError::Persistence(
                "injected customer update failure".to_string(),
            ));
        }

        let customer = state.customers.get_mut(&queued.customer_id).ok_or_else(|| {
            AppError::not_found(format!("Customer '{}' not found", queued.customer_id))
        })?;
        let previous_total = customer.total_paid;
        let total_paid = queued.apply_to(previous_total);
        customer.total_paid = total_paid;
        customer.updated_at = at;

        if let Some(stored) = state.adjustments.iter_mut().find(|a| a.id == queued.id) {
            stored.processed_at = Some(at);
        }

        Ok(AdjustmentApplication::Applied {
            previous_total,
            total_paid,
        })
    }

    async fn record_failure(&self, id: &str, error: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(adjustment) = state.adjustments.iter_mut().find(|a| a.id == id) {
            adjustment.attempts += 1;
            adjustment.last_error = Some(error.to_string());
        }
        Ok(())
    }
}
