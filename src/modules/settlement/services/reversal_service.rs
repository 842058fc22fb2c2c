use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::core::{AppError, Result};
use crate::modules::collateral::services::{CollateralSignal, ItemStatus};
use crate::modules::customers::models::CustomerAdjustment;
use crate::modules::loans::models::{Loan, LoanInstallment};
use crate::modules::loans::services::InstallmentLedger;
use crate::modules::payments::models::Payment;
use crate::modules::settlement::models::{ReversalOutcome, ReversePaymentRequest};
use crate::modules::settlement::repositories::{LedgerStore, LedgerTransaction};
use crate::modules::settlement::services::retry::{with_conflict_retry, RetryPolicy};

/// Undoes completed payments.
///
/// A reversal is the exact inverse of the settlement that produced the
/// payment: the recorded splits go back onto the loan, installments are
/// drained newest first and the customer's running total is reduced.
pub struct ReversalService {
    store: Arc<dyn LedgerStore>,
    collateral: Arc<dyn CollateralSignal>,
    retry: RetryPolicy,
}

impl ReversalService {
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

    pub async fn reverse(&self, request: ReversePaymentRequest) -> Result<ReversalOutcome> {
        request.validate()?;

        let request = &request;
        let outcome = with_conflict_retry(self.retry, "reverse_payment", move || {
            self.reverse_once(request)
        })
        .await?;

        info!(
            payment_id = %outcome.payment.id,
            payment_number = %outcome.payment.payment_number,
            loan_id = %outcome.loan.id,
            amount = %outcome.payment.amount,
            reversed_by = %request.reversed_by,
            loan_reactivated = outcome.loan_reactivated,
            "Payment reversed"
        );

        if outcome.loan_reactivated {
            let loan = &outcome.loan;
            if let Err(e) = self
                .collateral
                .update_status(&loan.item_id, ItemStatus::Collateral)
                .await
            {
                warn!(
                    loan_id = %loan.id,
                    item_id = %loan.item_id,
                    error = %e,
                    "Failed to signal collateral re-pledge"
                );
            }
        }

        Ok(outcome)
    }

    async fn reverse_once(&self, request: &ReversePaymentRequest) -> Result<ReversalOutcome> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let mut payment = tx.lock_payment(&request.payment_id).await?.ok_or_else(|| {
            AppError::not_found(format!("Payment '{}' not found", request.payment_id))
        })?;

        payment.ensure_reversible()?;

        let mut loan = tx.lock_loan(&payment.loan_id).await?.ok_or_else(|| {
            AppError::not_found(format!("Loan '{}' not found", payment.loan_id))
        })?;

        let loan_reactivated = loan.restore_allocation(&payment.allocation(), payment.amount, now)?;
        payment.mark_reversed(request.reason.trim().to_string(), request.reversed_by.clone(), now)?;

        tx.update_loan(&mut loan).await?;
        tx.update_payment(&payment).await?;

        let installments = if loan.uses_installments() {
            release_from_installments(tx.as_mut(), &loan, &payment, now).await?
        } else {
            Vec::new()
        };

        let adjustment = CustomerAdjustment::new(
            loan.customer_id.clone(),
            payment.id.clone(),
            -payment.amount,
            now,
        );
        tx.enqueue_customer_adjustment(&adjustment).await?;

        tx.commit().await?;

        Ok(ReversalOutcome {
            payment,
            loan,
            installments,
            loan_reactivated,
        })
    }
}

/// Pull the payment amount back off installments, newest first
async fn release_from_installments(
    tx: &mut dyn LedgerTransaction,
    loan: &Loan,
    payment: &Payment,
    now: DateTime<Utc>,
) -> Result<Vec<LoanInstallment>> {
    let mut installments = tx.installments(&loan.id).await?;
    let movement = InstallmentLedger::reverse_distribute(&mut installments, payment.amount, now);

    for &index in &movement.touched {
        let installment = &installments[index];
        installment.check_invariants()?;
        tx.update_installment(installment).await?;
    }

    // Happens when the original payment overflowed the schedule
    if !movement.unmoved.is_zero() {
        warn!(
            loan_id = %loan.id,
            payment_id = %payment.id,
            unreleased = %movement.unmoved,
            "Reversal amount exceeds paid installment balances"
        );
    }

    Ok(installments)
}
