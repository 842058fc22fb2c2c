// Customer aggregate persistence
//
// - CustomerRepository: read a customer
// - CustomerAdjustmentOutbox: pending total_paid deltas queued by the
//   settlement unit of work, drained by CustomerStatsRelay. Each
//   adjustment is applied and marked processed in one transaction, in
//   sequence order per customer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::MySqlPool;

use crate::core::{AppError, Result};
use crate::modules::customers::models::{AdjustmentApplication, Customer, CustomerAdjustment};

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Customer>>;
}

#[async_trait]
pub trait CustomerAdjustmentOutbox: Send + Sync {
    /// Unprocessed adjustments below `max_attempts`, lowest sequence first
    async fn pending(&self, limit: u32, max_attempts: i32) -> Result<Vec<CustomerAdjustment>>;

    /// Atomically add the delta to the customer's `total_paid` (clamped at
    /// zero) and mark the adjustment processed. Nothing is written unless
    /// every older adjustment for the customer is already processed.
    async fn apply_adjustment(
        &self,
        adjustment: &CustomerAdjustment,
        at: DateTime<Utc>,
    ) -> Result<AdjustmentApplication>;

    async fn record_failure(&self, id: &str, error: &str) -> Result<()>;
}

/// MySQL-backed customer repository and outbox
pub struct MySqlCustomerRepository {
    pool: MySqlPool,
}

impl MySqlCustomerRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: String,
    full_name: String,
    total_paid: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            full_name: row.full_name,
            total_paid: row.total_paid,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerAdjustmentRow {
    id: String,
    sequence_no: i64,
    customer_id: String,
    payment_id: String,
    delta: Decimal,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl From<CustomerAdjustmentRow> for CustomerAdjustment {
    fn from(row: CustomerAdjustmentRow) -> Self {
        CustomerAdjustment {
            id: row.id,
            sequence: row.sequence_no,
            customer_id: row.customer_id,
            payment_id: row.payment_id,
            delta: row.delta,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            processed_at: row.processed_at,
        }
    }
}

#[async_trait]
impl CustomerRepository for MySqlCustomerRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, full_name, total_paid, updated_at
            FROM customers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to fetch customer", e))?;

        Ok(row.map(Customer::from))
    }
}

#[async_trait]
impl CustomerAdjustmentOutbox for MySqlCustomerRepository {
    async fn pending(&self, limit: u32, max_attempts: i32) -> Result<Vec<CustomerAdjustment>> {
        let rows = sqlx::query_as::<_, CustomerAdjustmentRow>(
            r#"
            SELECT
                id, sequence_no, customer_id, payment_id, delta, attempts,
                last_error, created_at, processed_at
            FROM customer_adjustments
            WHERE processed_at IS NULL AND attempts < ?
            ORDER BY sequence_no ASC
            LIMIT ?
            "#,
        )
        .bind(max_attempts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to fetch pending customer adjustments", e))?;

        Ok(rows.into_iter().map(CustomerAdjustment::from).collect())
    }

    async fn apply_adjustment(
        &self,
        adjustment: &CustomerAdjustment,
        at: DateTime<Utc>,
    ) -> Result<AdjustmentApplication> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::persistence("Failed to begin customer adjustment", e))?;

        // Another relay holding the row means it is being applied there
        let claimed: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT sequence_no
            FROM customer_adjustments
            WHERE id = ? AND processed_at IS NULL
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(&adjustment.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::persistence("Failed to claim customer adjustment", e))?;

        let Some(sequence_no) = claimed else {
            return Ok(AdjustmentApplication::Skipped);
        };

        let older_pending: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM customer_adjustments
            WHERE customer_id = ? AND processed_at IS NULL AND sequence_no < ?
            "#,
        )
        .bind(&adjustment.customer_id)
        .bind(sequence_no)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::persistence("Failed to check customer adjustment order", e))?;

        if older_pending > 0 {
            return Ok(AdjustmentApplication::Blocked);
        }

        let previous_total: Decimal = sqlx::query_scalar(
            r#"
            SELECT total_paid
            FROM customers
            WHERE id = ?
            FOR UPDATE
            "#,
        )
        .bind(&adjustment.customer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::persistence("Failed to lock customer", e))?
        .ok_or_else(|| {
            AppError::not_found(format!("Customer '{}' not found", adjustment.customer_id))
        })?;

        let total_paid = adjustment.apply_to(previous_total);

        sqlx::query(
            r#"
            UPDATE customers
            SET total_paid = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(total_paid)
        .bind(at)
        .bind(&adjustment.customer_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::persistence("Failed to update customer total_paid", e))?;

        sqlx::query(
            r#"
            UPDATE customer_adjustments
            SET processed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(&adjustment.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::persistence("Failed to mark customer adjustment processed", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::persistence("Failed to commit customer adjustment", e))?;

        Ok(AdjustmentApplication::Applied {
            previous_total,
            total_paid,
        })
    }

    async fn record_failure(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE customer_adjustments
            SET attempts = attempts + 1, last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to record customer adjustment failure", e))?;

        Ok(())
    }
}
