use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};

/// One scheduled sub-payment of an installment-plan loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanInstallment {
    pub id: String,
    pub loan_id: String,
    /// Sequential number (1, 2, 3...) within the loan
    pub installment_number: i32,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    /// Never exceeds `total_amount`
    pub amount_paid: Decimal,
    /// True iff `amount_paid == total_amount`
    pub is_paid: bool,
    pub paid_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LoanInstallment {
    /// Amount still owed on this installment
    pub fn remaining(&self) -> Decimal {
        self.total_amount - self.amount_paid
    }

    /// Apply up to `amount`, capped at this installment's remaining
    /// balance. Returns the amount consumed.
    pub fn apply(&mut self, amount: Decimal, now: DateTime<Utc>) -> Decimal {
        let applied = amount.min(self.remaining()).max(Decimal::ZERO);
        if applied.is_zero() {
            return applied;
        }

        self.amount_paid += applied;
        if self.amount_paid == self.total_amount {
            self.is_paid = true;
            self.paid_date = Some(now);
        }
        self.updated_at = now;
        applied
    }

    /// Pull back up to `amount` from what has been paid. Returns the amount
    /// released.
    pub fn release(&mut self, amount: Decimal, now: DateTime<Utc>) -> Decimal {
        let released = amount.min(self.amount_paid).max(Decimal::ZERO);
        if released.is_zero() {
            return released;
        }

        self.amount_paid -= released;
        if self.amount_paid < self.total_amount {
            self.is_paid = false;
            self.paid_date = None;
        }
        self.updated_at = now;
        released
    }

    pub fn is_consistent(&self) -> bool {
        self.amount_paid >= Decimal::ZERO
            && self.amount_paid <= self.total_amount
            && self.is_paid == (self.amount_paid == self.total_amount)
    }

    /// Refuse to persist a row whose paid amount left `0..=total_amount`
    pub fn check_invariants(&self) -> Result<()> {
        if self.is_consistent() {
            return Ok(());
        }

        Err(AppError::internal(format!(
            "Installment {} of loan {} would have paid {} of {} (is_paid = {})",
            self.installment_number, self.loan_id, self.amount_paid, self.total_amount, self.is_paid
        )))
    }
}
