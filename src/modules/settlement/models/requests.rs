use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{money, AppError, Result};
use crate::modules::loans::models::{Loan, LoanInstallment};
use crate::modules::payments::models::{Payment, PaymentMethod};

/// Request to apply a payment to a loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlePaymentRequest {
    pub loan_id: String,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cash_session_id: Option<String>,
    pub branch_id: String,
    pub created_by: String,
}

impl SettlePaymentRequest {
    pub fn validate(&self) -> Result<()> {
        if self.loan_id.trim().is_empty() {
            return Err(AppError::validation("Loan ID cannot be empty"));
        }

        money::validate_payment_amount(self.amount).map_err(AppError::Validation)?;

        if self.branch_id.trim().is_empty() {
            return Err(AppError::validation("Branch ID cannot be empty"));
        }

        if self.created_by.trim().is_empty() {
            return Err(AppError::validation("created_by cannot be empty"));
        }

        Ok(())
    }
}

/// Request to undo a completed payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversePaymentRequest {
    pub payment_id: String,
    pub reason: String,
    pub reversed_by: String,
}

impl ReversePaymentRequest {
    pub fn validate(&self) -> Result<()> {
        if self.payment_id.trim().is_empty() {
            return Err(AppError::validation("Payment ID cannot be empty"));
        }

        if self.reason.trim().is_empty() {
            return Err(AppError::validation("Reversal reason is required"));
        }

        if self.reversed_by.trim().is_empty() {
            return Err(AppError::validation("reversed_by cannot be empty"));
        }

        Ok(())
    }
}

/// Committed result of a settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub payment: Payment,
    pub loan: Loan,
    /// Installments after distribution; empty for non-installment loans
    pub installments: Vec<LoanInstallment>,
    pub fully_paid: bool,
}

/// Committed result of a reversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalOutcome {
    pub payment: Payment,
    pub loan: Loan,
    pub installments: Vec<LoanInstallment>,
    /// The reversal reopened a loan that had been paid off
    pub loan_reactivated: bool,
}
