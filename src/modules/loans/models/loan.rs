use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};
use crate::modules::loans::services::Allocation;

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Overdue,
    Paid,
    Defaulted,
    Renewed,
    Confiscated,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Overdue => "overdue",
            Self::Paid => "paid",
            Self::Defaulted => "defaulted",
            Self::Renewed => "renewed",
            Self::Confiscated => "confiscated",
        }
    }

    /// Paid and confiscated loans are closed to new payments
    pub fn accepts_payments(&self) -> bool {
        !matches!(self, Self::Paid | Self::Confiscated)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for LoanStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(Self::Active),
            "overdue" => Ok(Self::Overdue),
            "paid" => Ok(Self::Paid),
            "defaulted" => Ok(Self::Defaulted),
            "renewed" => Ok(Self::Renewed),
            "confiscated" => Ok(Self::Confiscated),
            _ => Err(format!("Invalid loan status: {}", value)),
        }
    }
}

/// How the borrower repays the loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPlanType {
    Single,
    MinimumPayment,
    Installments,
}

impl PaymentPlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MinimumPayment => "minimum_payment",
            Self::Installments => "installments",
        }
    }
}

impl std::fmt::Display for PaymentPlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for PaymentPlanType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "single" => Ok(Self::Single),
            "minimum_payment" => Ok(Self::MinimumPayment),
            "installments" => Ok(Self::Installments),
            _ => Err(format!("Invalid payment plan type: {}", value)),
        }
    }
}

/// A single pawn transaction and its outstanding balances.
///
/// `principal_remaining + interest_remaining + late_fee_remaining` is the
/// loan's outstanding balance. Only the settlement and reversal services
/// write the balance fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub loan_number: String,
    pub customer_id: String,
    /// Pledged item
    pub item_id: String,
    pub branch_id: String,
    /// Original principal, never changes after issue
    pub loan_amount: Decimal,
    pub principal_remaining: Decimal,
    pub interest_remaining: Decimal,
    pub late_fee_remaining: Decimal,
    pub amount_paid: Decimal,
    pub status: LoanStatus,
    pub payment_plan_type: PaymentPlanType,
    pub due_date: DateTime<Utc>,
    pub grace_period_days: i32,
    pub paid_date: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Outstanding balance: late fee + interest + principal
    pub fn total_remaining(&self) -> Decimal {
        self.late_fee_remaining + self.interest_remaining + self.principal_remaining
    }

    pub fn is_fully_settled(&self) -> bool {
        self.principal_remaining.is_zero()
            && self.interest_remaining.is_zero()
            && self.late_fee_remaining.is_zero()
    }

    pub fn uses_installments(&self) -> bool {
        self.payment_plan_type == PaymentPlanType::Installments
    }

    /// Reject payments against closed loans
    pub fn ensure_payable(&self) -> Result<()> {
        if !self.status.accepts_payments() {
            return Err(AppError::LoanNotPayable {
                loan_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Reject amounts larger than the outstanding balance before any split
    /// is computed
    pub fn ensure_within_balance(&self, amount: Decimal) -> Result<()> {
        let total_owed = self.total_remaining();
        if amount > total_owed {
            return Err(AppError::Overpayment { amount, total_owed });
        }
        Ok(())
    }

    /// Decrement balances by a computed allocation. Returns true when this
    /// payment closed the loan.
    pub fn apply_allocation(
        &mut self,
        allocation: &Allocation,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.late_fee_remaining -= allocation.late_fee;
        self.interest_remaining -= allocation.interest;
        self.principal_remaining -= allocation.principal;
        self.amount_paid += amount;
        self.updated_at = now;

        let fully_paid = self.is_fully_settled();
        if fully_paid {
            self.status = LoanStatus::Paid;
            self.paid_date = Some(now);
        }

        self.check_invariants()?;
        Ok(fully_paid)
    }

    /// Add a previously applied allocation back onto the balances. A paid
    /// loan is reopened as active; returns true when that happened.
    pub fn restore_allocation(
        &mut self,
        allocation: &Allocation,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let reactivated = self.status == LoanStatus::Paid;
        if reactivated {
            self.status = LoanStatus::Active;
            self.paid_date = None;
        }

        self.late_fee_remaining += allocation.late_fee;
        self.interest_remaining += allocation.interest;
        self.principal_remaining += allocation.principal;
        self.amount_paid -= amount;
        self.updated_at = now;

        self.check_invariants()?;
        Ok(reactivated)
    }

    /// Balances never go negative and a paid loan owes nothing
    pub fn check_invariants(&self) -> Result<()> {
        let fields = [
            ("principal_remaining", self.principal_remaining),
            ("interest_remaining", self.interest_remaining),
            ("late_fee_remaining", self.late_fee_remaining),
            ("amount_paid", self.amount_paid),
        ];
        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(AppError::internal(format!(
                    "Loan {} would have negative {}: {}",
                    self.id, name, value
                )));
            }
        }

        if self.status == LoanStatus::Paid && !self.is_fully_settled() {
            return Err(AppError::internal(format!(
                "Loan {} marked paid with outstanding balance {}",
                self.id,
                self.total_remaining()
            )));
        }

        Ok(())
    }
}
