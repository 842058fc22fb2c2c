pub mod models;
pub mod services;

pub use models::{Loan, LoanInstallment, LoanStatus, PaymentPlanType};
pub use services::{
    Allocation, AllocationWaterfall, InstallmentLedger, OverdueCalculator, OverdueStatus,
    PayoffQuote,
};
