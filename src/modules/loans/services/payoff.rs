use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::modules::loans::models::{Loan, LoanStatus};
use crate::modules::loans::services::{OverdueCalculator, OverdueStatus};

/// Amount needed to close a loan in one payment, with its breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffQuote {
    pub loan_id: String,
    pub loan_number: String,
    pub status: LoanStatus,
    pub late_fee_remaining: Decimal,
    pub interest_remaining: Decimal,
    pub principal_remaining: Decimal,
    pub payoff_amount: Decimal,
    pub amount_paid: Decimal,
    pub accepts_payments: bool,
    pub overdue: OverdueStatus,
    pub quoted_at: DateTime<Utc>,
}

impl PayoffQuote {
    pub fn for_loan(loan: &Loan, now: DateTime<Utc>) -> Self {
        Self {
            loan_id: loan.id.clone(),
            loan_number: loan.loan_number.clone(),
            status: loan.status,
            late_fee_remaining: loan.late_fee_remaining,
            interest_remaining: loan.interest_remaining,
            principal_remaining: loan.principal_remaining,
            payoff_amount: loan.total_remaining(),
            amount_paid: loan.amount_paid,
            accepts_payments: loan.status.accepts_payments(),
            overdue: OverdueCalculator::evaluate(loan, now),
            quoted_at: now,
        }
    }
}
