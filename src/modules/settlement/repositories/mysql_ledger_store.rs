// MySQL implementation of the ledger unit of work
//
// Locking:
// - lock_loan / lock_payment / installments take row locks (FOR UPDATE)
//   held until commit or rollback
// - update_loan additionally checks the loan's version column so a writer
//   that skipped the lock still cannot overwrite a newer row
//
// Rollback happens when the sqlx transaction is dropped uncommitted.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::{AppError, Result};
use crate::modules::customers::models::CustomerAdjustment;
use crate::modules::loans::models::{Loan, LoanInstallment, LoanStatus, PaymentPlanType};
use crate::modules::payments::models::{
    generate_payment_number, Payment, PaymentMethod, PaymentStatus,
};
use crate::modules::settlement::repositories::{LedgerStore, LedgerTransaction};

const LOAN_COLUMNS: &str = r#"
    id, loan_number, customer_id, item_id, branch_id, loan_amount,
    principal_remaining, interest_remaining, late_fee_remaining, amount_paid,
    status, payment_plan_type, due_date, grace_period_days, paid_date,
    version, created_at, updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, payment_number, loan_id, customer_id, branch_id, amount,
    late_fee_amount, interest_amount, principal_amount, payment_method,
    status, loan_balance_after, interest_balance_after, reference_number,
    notes, cash_session_id, created_by, payment_date, reversed_at,
    reversed_by, reversal_reason, created_at, updated_at
"#;

const INSTALLMENT_COLUMNS: &str = r#"
    id, loan_id, installment_number, due_date, total_amount, amount_paid,
    is_paid, paid_date, updated_at
"#;

/// Ledger store backed by a MySQL pool
#[derive(Clone)]
pub struct MySqlLedgerStore {
    pool: MySqlPool,
}

impl MySqlLedgerStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for MySqlLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::persistence("Failed to start transaction", e))?;

        Ok(Box::new(MySqlLedgerTransaction { tx }))
    }

    async fn find_loan(&self, loan_id: &str) -> Result<Option<Loan>> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {} FROM loans WHERE id = ?",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to fetch loan", e))?;

        row.map(Loan::try_from).transpose()
    }

    async fn find_payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to fetch payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn payments_for_loan(&self, loan_id: &str) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE loan_id = ? ORDER BY payment_date DESC, created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(loan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to fetch payments for loan", e))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn installments_for_loan(&self, loan_id: &str) -> Result<Vec<LoanInstallment>> {
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {} FROM loan_installments WHERE loan_id = ? ORDER BY installment_number ASC",
            INSTALLMENT_COLUMNS
        ))
        .bind(loan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to fetch installments", e))?;

        Ok(rows.into_iter().map(LoanInstallment::from).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::persistence("Database ping failed", e))?;
        Ok(())
    }
}

/// One open MySQL transaction
pub struct MySqlLedgerTransaction {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl LedgerTransaction for MySqlLedgerTransaction {
    async fn lock_loan(&mut self, loan_id: &str) -> Result<Option<Loan>> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {} FROM loans WHERE id = ? FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::persistence("Failed to lock loan", e))?;

        row.map(Loan::try_from).transpose()
    }

    async fn update_loan(&mut self, loan: &mut Loan) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE loans
            SET
                principal_remaining = ?,
                interest_remaining = ?,
                late_fee_remaining = ?,
                amount_paid = ?,
                status = ?,
                paid_date = ?,
                version = version + 1,
                updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(loan.principal_remaining)
        .bind(loan.interest_remaining)
        .bind(loan.late_fee_remaining)
        .bind(loan.amount_paid)
        .bind(loan.status.as_str())
        .bind(loan.paid_date)
        .bind(loan.updated_at)
        .bind(&loan.id)
        .bind(loan.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::persistence("Failed to update loan", e))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::conflict(format!(
                "Loan {} changed since version {}",
                loan.id, loan.version
            )));
        }

        loan.version += 1;
        Ok(())
    }

    async fn lock_payment(&mut self, payment_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ? FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::persistence("Failed to lock payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn next_payment_number(&mut self) -> Result<String> {
        // Uniqueness is backed by the payments.payment_number index
        Ok(generate_payment_number(Utc::now()))
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO payments ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PAYMENT_COLUMNS
        ))
        .bind(&payment.id)
        .bind(&payment.payment_number)
        .bind(&payment.loan_id)
        .bind(&payment.customer_id)
        .bind(&payment.branch_id)
        .bind(payment.amount)
        .bind(payment.late_fee_amount)
        .bind(payment.interest_amount)
        .bind(payment.principal_amount)
        .bind(payment.payment_method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.loan_balance_after)
        .bind(payment.interest_balance_after)
        .bind(&payment.reference_number)
        .bind(&payment.notes)
        .bind(&payment.cash_session_id)
        .bind(&payment.created_by)
        .bind(payment.payment_date)
        .bind(payment.reversed_at)
        .bind(&payment.reversed_by)
        .bind(&payment.reversal_reason)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::persistence("Failed to insert payment", e))?;

        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE payments
            SET
                status = ?,
                reversed_at = ?,
                reversed_by = ?,
                reversal_reason = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(payment.status.as_str())
        .bind(payment.reversed_at)
        .bind(&payment.reversed_by)
        .bind(&payment.reversal_reason)
        .bind(payment.updated_at)
        .bind(&payment.id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::persistence("Failed to update payment", e))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found(format!("Payment '{}' not found", payment.id)));
        }

        Ok(())
    }

    async fn installments(&mut self, loan_id: &str) -> Result<Vec<LoanInstallment>> {
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {} FROM loan_installments WHERE loan_id = ? ORDER BY installment_number ASC FOR UPDATE",
            INSTALLMENT_COLUMNS
        ))
        .bind(loan_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| AppError::persistence("Failed to lock installments", e))?;

        Ok(rows.into_iter().map(LoanInstallment::from).collect())
    }

    async fn update_installment(&mut self, installment: &LoanInstallment) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE loan_installments
            SET amount_paid = ?, is_paid = ?, paid_date = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(installment.amount_paid)
        .bind(installment.is_paid)
        .bind(installment.paid_date)
        .bind(installment.updated_at)
        .bind(&installment.id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::persistence("Failed to update installment", e))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found(format!(
                "Installment '{}' not found",
                installment.id
            )));
        }

        Ok(())
    }

    async fn enqueue_customer_adjustment(&mut self, adjustment: &CustomerAdjustment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customer_adjustments (
                id, customer_id, payment_id, delta, attempts,
                last_error, created_at, processed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.customer_id)
        .bind(&adjustment.payment_id)
        .bind(adjustment.delta)
        .bind(adjustment.attempts)
        .bind(&adjustment.last_error)
        .bind(adjustment.created_at)
        .bind(adjustment.processed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::persistence("Failed to enqueue customer adjustment", e))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| AppError::persistence("Failed to commit transaction", e))
    }
}

/// Database row representation for the loans table
#[derive(sqlx::FromRow)]
struct LoanRow {
    id: String,
    loan_number: String,
    customer_id: String,
    item_id: String,
    branch_id: String,
    loan_amount: Decimal,
    principal_remaining: Decimal,
    interest_remaining: Decimal,
    late_fee_remaining: Decimal,
    amount_paid: Decimal,
    status: String,
    payment_plan_type: String,
    due_date: DateTime<Utc>,
    grace_period_days: i32,
    paid_date: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self> {
        Ok(Loan {
            id: row.id,
            loan_number: row.loan_number,
            customer_id: row.customer_id,
            item_id: row.item_id,
            branch_id: row.branch_id,
            loan_amount: row.loan_amount,
            principal_remaining: row.principal_remaining,
            interest_remaining: row.interest_remaining,
            late_fee_remaining: row.late_fee_remaining,
            amount_paid: row.amount_paid,
            status: LoanStatus::try_from(row.status).map_err(AppError::Internal)?,
            payment_plan_type: PaymentPlanType::try_from(row.payment_plan_type)
                .map_err(AppError::Internal)?,
            due_date: row.due_date,
            grace_period_days: row.grace_period_days,
            paid_date: row.paid_date,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database row representation for the payments table
#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: String,
    payment_number: String,
    loan_id: String,
    customer_id: String,
    branch_id: String,
    amount: Decimal,
    late_fee_amount: Decimal,
    interest_amount: Decimal,
    principal_amount: Decimal,
    payment_method: String,
    status: String,
    loan_balance_after: Decimal,
    interest_balance_after: Decimal,
    reference_number: Option<String>,
    notes: Option<String>,
    cash_session_id: Option<String>,
    created_by: String,
    payment_date: DateTime<Utc>,
    reversed_at: Option<DateTime<Utc>>,
    reversed_by: Option<String>,
    reversal_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Payment {
            id: row.id,
            payment_number: row.payment_number,
            loan_id: row.loan_id,
            customer_id: row.customer_id,
            branch_id: row.branch_id,
            amount: row.amount,
            late_fee_amount: row.late_fee_amount,
            interest_amount: row.interest_amount,
            principal_amount: row.principal_amount,
            payment_method: row
                .payment_method
                .parse::<PaymentMethod>()
                .map_err(AppError::Internal)?,
            status: row
                .status
                .parse::<PaymentStatus>()
                .map_err(AppError::Internal)?,
            loan_balance_after: row.loan_balance_after,
            interest_balance_after: row.interest_balance_after,
            reference_number: row.reference_number,
            notes: row.notes,
            cash_session_id: row.cash_session_id,
            created_by: row.created_by,
            payment_date: row.payment_date,
            reversed_at: row.reversed_at,
            reversed_by: row.reversed_by,
            reversal_reason: row.reversal_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database row representation for the loan_installments table
#[derive(sqlx::FromRow)]
struct InstallmentRow {
    id: String,
    loan_id: String,
    installment_number: i32,
    due_date: NaiveDate,
    total_amount: Decimal,
    amount_paid: Decimal,
    is_paid: bool,
    paid_date: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<InstallmentRow> for LoanInstallment {
    fn from(row: InstallmentRow) -> Self {
        LoanInstallment {
            id: row.id,
            loan_id: row.loan_id,
            installment_number: row.installment_number,
            due_date: row.due_date,
            total_amount: row.total_amount,
            amount_paid: row.amount_paid,
            is_paid: row.is_paid,
            paid_date: row.paid_date,
            updated_at: row.updated_at,
        }
    }
}
