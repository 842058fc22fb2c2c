pub mod allocation;
pub mod installment_ledger;
pub mod overdue_calculator;
pub mod payoff;

pub use allocation::{Allocation, AllocationWaterfall};
pub use installment_ledger::{InstallmentLedger, LedgerMovement};
pub use overdue_calculator::{OverdueCalculator, OverdueStatus};
pub use payoff::PayoffQuote;
