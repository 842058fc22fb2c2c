use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use rust_decimal::Decimal;

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// MySQL error numbers that mean another transaction holds the row we need
const MYSQL_DEADLOCK: u16 = 1213;
const MYSQL_LOCK_WAIT_TIMEOUT: u16 = 1205;
const MYSQL_DUPLICATE_KEY: u16 = 1062;

/// Unique index on `payments.payment_number`
const PAYMENT_NUMBER_KEY: &str = "uk_payments_payment_number";

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Validation errors for request fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Loan or payment absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Loan is in a state that cannot take payments (paid, confiscated)
    #[error("Loan {loan_id} cannot accept payments in status '{status}'")]
    LoanNotPayable { loan_id: String, status: String },

    /// Payment is not in `completed` status
    #[error("Payment {payment_id} cannot be reversed in status '{status}'")]
    PaymentNotReversible { payment_id: String, status: String },

    /// Payment exceeds late fee + interest + principal outstanding
    #[error("Payment amount {amount} exceeds total owed {total_owed}")]
    Overpayment { amount: Decimal, total_owed: Decimal },

    /// Lost the per-loan lock or version race; retry the whole operation
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Store unreachable or write failed; the transaction was rolled back
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind, used in HTTP bodies and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::LoanNotPayable { .. } => "loan_not_payable",
            AppError::PaymentNotReversible { .. } => "payment_not_reversible",
            AppError::Overpayment { .. } => "overpayment",
            AppError::ConcurrencyConflict(_) => "concurrency_conflict",
            AppError::Persistence(_) | AppError::Database(_) => "persistence",
            AppError::Configuration(_) => "configuration",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": error_message,
                "kind": self.kind(),
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::LoanNotPayable { .. } => StatusCode::CONFLICT,
            AppError::PaymentNotReversible { .. } => StatusCode::CONFLICT,
            AppError::Overpayment { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::ConcurrencyConflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Classify a store failure. Lock contention and a taken payment
    /// number become a conflict the caller may retry; everything else is a
    /// persistence failure.
    pub fn persistence(context: &str, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            let retryable = db_err
                .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                .is_some_and(|e| is_retryable_mysql_error(e.number(), e.message()));
            if retryable {
                return AppError::ConcurrencyConflict(format!("{}: {}", context, db_err));
            }
        }
        AppError::Persistence(format!("{}: {}", context, err))
    }
}

fn is_retryable_mysql_error(number: u16, message: &str) -> bool {
    match number {
        MYSQL_DEADLOCK | MYSQL_LOCK_WAIT_TIMEOUT => true,
        // The next attempt draws a fresh payment number
        MYSQL_DUPLICATE_KEY => message.contains(PAYMENT_NUMBER_KEY),
        _ => false,
    }
}
