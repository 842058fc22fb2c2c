pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{ReversalOutcome, ReversePaymentRequest, SettlePaymentRequest, SettlementOutcome};
pub use repositories::{LedgerStore, LedgerTransaction, MemoryLedgerStore, MySqlLedgerStore};
pub use services::{ReversalService, RetryPolicy, SettlementService};
