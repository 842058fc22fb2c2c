//! Pawnshop loan settlement engine
//!
//! Applies payments to pawn loans through the late fee, interest, principal
//! waterfall, reverses them exactly, and keeps installment schedules and
//! customer totals in step with each loan.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use modules::loans;
pub use modules::payments;
pub use modules::settlement;
