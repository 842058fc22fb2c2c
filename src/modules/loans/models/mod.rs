pub mod installment;
pub mod loan;

pub use installment::LoanInstallment;
pub use loan::{Loan, LoanStatus, PaymentPlanType};
