use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::{AppError, Result};
use crate::modules::collateral::services::{CollateralSignal, ItemStatus};
use crate::modules::customers::models::CustomerAdjustment;
use crate::modules::loans::models::{Loan, LoanInstallment};
use crate::modules::loans::services::{Allocation, AllocationWaterfall, InstallmentLedger, PayoffQuote};
use crate::modules::payments::models::{Payment, PaymentStatus};
use crate::modules::settlement::models::{SettlePaymentRequest, SettlementOutcome};
use crate::modules::settlement::repositories::{LedgerStore, LedgerTransaction};
use crate::modules::settlement::services::retry::{with_conflict_retry, RetryPolicy};

/// Applies payments to loans.
///
/// Every write for one payment (loan balances, payment row, installments,
/// customer adjustment) goes through a single [`LedgerTransaction`]. The
/// collateral signal runs only after commit and never fails the call.
pub struct SettlementService {
    store: Arc<dyn LedgerStore>,
    collateral: Arc<dyn CollateralSignal>,
    retry: RetryPolicy,
}

impl SettlementService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        collateral: Arc<dyn CollateralSignal>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            collateral,
            retry,
        }
    }

    /// Apply a payment to a loan
    pub async fn settle(&self, request: SettlePaymentRequest) -> Result<SettlementOutcome> {
        request.validate()?;

        let request = &request;
        let outcome = with_conflict_retry(self.retry, "settle_payment", move || {
            self.settle_once(request)
        })
        .await?;

        info!(
            payment_id = %outcome.payment.id,
            payment_number = %outcome.payment.payment_number,
            loan_id = %outcome.loan.id,
            amount = %outcome.payment.amount,
            late_fee = %outcome.payment.late_fee_amount,
            interest = %outcome.payment.interest_amount,
            principal = %outcome.payment.principal_amount,
            balance_after = %outcome.payment.loan_balance_after,
            fully_paid = outcome.fully_paid,
            "Payment settled"
        );

        if outcome.fully_paid {
            self.signal_collateral(&outcome.loan, ItemStatus::Available).await;
        }

        Ok(outcome)
    }

    /// Current payoff amount and breakdown for a loan
    pub async fn payoff_quote(&self, loan_id: &str) -> Result<PayoffQuote> {
        let loan = self
            .store
            .find_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Loan '{}' not found", loan_id)))?;

        Ok(PayoffQuote::for_loan(&loan, Utc::now()))
    }

    /// Payment history for a loan, newest first
    pub async fn list_payments(&self, loan_id: &str) -> Result<Vec<Payment>> {
        if self.store.find_loan(loan_id).await?.is_none() {
            return Err(AppError::not_found(format!("Loan '{}' not found", loan_id)));
        }

        self.store.payments_for_loan(loan_id).await
    }

    async fn settle_once(&self, request: &SettlePaymentRequest) -> Result<SettlementOutcome> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let mut loan = tx
            .lock_loan(&request.loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Loan '{}' not found", request.loan_id)))?;

        loan.ensure_payable()?;

        // Overpayment is rejected here, before the loan is touched
        let allocation = AllocationWaterfall::allocate_for_loan(&loan, request.amount)?;
        let fully_paid = loan.apply_allocation(&allocation, request.amount, now)?;

        let payment_number = tx.next_payment_number().await?;
        let payment = build_payment(request, &loan, &allocation, payment_number, now);

        tx.insert_payment(&payment).await?;
        tx.update_loan(&mut loan).await?;

        let installments = if loan.uses_installments() {
            distribute_to_installments(tx.as_mut(), &loan, &payment, now).await?
        } else {
            Vec::new()
        };

        let adjustment = CustomerAdjustment::new(
            loan.customer_id.clone(),
            payment.id.clone(),
            payment.amount,
            now,
        );
        tx.enqueue_customer_adjustment(&adjustment).await?;

        tx.commit().await?;

        Ok(SettlementOutcome {
            payment,
            loan,
            installments,
            fully_paid,
        })
    }

    async fn signal_collateral(&self, loan: &Loan, status: ItemStatus) {
        if let Err(e) = self.collateral.update_status(&loan.item_id, status).await {
            warn!(
                loan_id = %loan.id,
                item_id = %loan.item_id,
                status = %status,
                error = %e,
                "Failed to signal collateral status change"
            );
        }
    }
}

fn build_payment(
    request: &SettlePaymentRequest,
    loan: &Loan,
    allocation: &Allocation,
    payment_number: String,
    now: DateTime<Utc>,
) -> Payment {
    Payment {
        id: uuid::Uuid::new_v4().to_string(),
        payment_number,
        loan_id: loan.id.clone(),
        customer_id: loan.customer_id.clone(),
        branch_id: request.branch_id.clone(),
        amount: request.amount,
        late_fee_amount: allocation.late_fee,
        interest_amount: allocation.interest,
        principal_amount: allocation.principal,
        payment_method: request.payment_method,
        status: PaymentStatus::Completed,
        loan_balance_after: loan.total_remaining(),
        interest_balance_after: loan.interest_remaining,
        reference_number: request.reference_number.clone(),
        notes: request.notes.clone(),
        cash_session_id: request.cash_session_id.clone(),
        created_by: request.created_by.clone(),
        payment_date: now,
        reversed_at: None,
        reversed_by: None,
        reversal_reason: None,
        created_at: now,
        updated_at: now,
    }
}

/// Spread the full payment amount over unpaid installments, oldest first
async fn distribute_to_installments(
    tx: &mut dyn LedgerTransaction,
    loan: &Loan,
    payment: &Payment,
    now: DateTime<Utc>,
) -> Result<Vec<LoanInstallment>> {
    let mut installments = tx.installments(&loan.id).await?;
    let movement = InstallmentLedger::distribute(&mut installments, payment.amount, now);

    for &index in &movement.touched {
        let installment = &installments[index];
        installment.check_invariants()?;
        tx.update_installment(installment).await?;
    }

    if !movement.unmoved.is_zero() {
        debug!(
            loan_id = %loan.id,
            payment_id = %payment.id,
            undistributed = %movement.unmoved,
            "Payment exceeds remaining installment balances"
        );
    }

    Ok(installments)
}
