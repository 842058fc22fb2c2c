use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};
use crate::modules::loans::services::Allocation;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Applied to the loan
    Completed,
    /// Undone by a reversal; terminal
    Reversed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Reversed => "reversed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "reversed" => Ok(Self::Reversed),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// Tender used at the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Check,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Check => "check",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "transfer" => Ok(Self::Transfer),
            "check" => Ok(Self::Check),
            "other" => Ok(Self::Other),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

/// Generate a human-readable payment number: `PAY-YYYYMMDD-XXXXXXXX`
pub fn generate_payment_number(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("PAY-{}-{}", now.format("%Y%m%d"), suffix)
}

/// A payment applied to a loan.
///
/// Immutable once created except for the reversal fields, which move it
/// from `completed` to `reversed` exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub payment_number: String,
    pub loan_id: String,
    pub customer_id: String,
    pub branch_id: String,
    pub amount: Decimal,
    pub late_fee_amount: Decimal,
    pub interest_amount: Decimal,
    pub principal_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    /// Loan outstanding balance right after this payment
    pub loan_balance_after: Decimal,
    /// Interest still owed right after this payment
    pub interest_balance_after: Decimal,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub cash_session_id: Option<String>,
    pub created_by: String,
    pub payment_date: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversed_by: Option<String>,
    pub reversal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// The waterfall output recorded on this payment
    pub fn allocation(&self) -> Allocation {
        Allocation {
            late_fee: self.late_fee_amount,
            interest: self.interest_amount,
            principal: self.principal_amount,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    pub fn ensure_reversible(&self) -> Result<()> {
        if !self.is_completed() {
            return Err(AppError::PaymentNotReversible {
                payment_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Transition `completed -> reversed` and stamp who, when and why
    pub fn mark_reversed(
        &mut self,
        reason: String,
        reversed_by: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_reversible()?;

        self.status = PaymentStatus::Reversed;
        self.reversed_at = Some(now);
        self.reversed_by = Some(reversed_by);
        self.reversal_reason = Some(reason);
        self.updated_at = now;

        Ok(())
    }
}
