use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer reporting aggregate. `total_paid` is a cache of the sum of
/// non-reversed payments, not a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub full_name: String,
    pub total_paid: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Pending change to a customer's `total_paid`, written in the same
/// transaction as the payment that caused it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAdjustment {
    pub id: String,
    /// Apply order within the outbox; 0 until the store assigns it
    pub sequence: i64,
    pub customer_id: String,
    pub payment_id: String,
    /// Positive for a settlement, negative for a reversal
    pub delta: Decimal,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl CustomerAdjustment {
    pub fn new(
        customer_id: String,
        payment_id: String,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sequence: 0,
            customer_id,
            payment_id,
            delta,
            attempts: 0,
            last_error: None,
            created_at: now,
            processed_at: None,
        }
    }

    /// New running total, clamped so a reversal never drives it negative
    pub fn apply_to(&self, total_paid: Decimal) -> Decimal {
        (total_paid + self.delta).max(Decimal::ZERO)
    }
}

/// Result of trying to apply one queued adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentApplication {
    /// Customer total moved and the adjustment is marked processed
    Applied {
        previous_total: Decimal,
        total_paid: Decimal,
    },
    /// An older adjustment for the same customer is still unprocessed
    Blocked,
    /// Already processed, or claimed by another relay
    Skipped,
}
