pub mod retry;
pub mod reversal_service;
pub mod settlement_service;

pub use retry::{with_conflict_retry, RetryPolicy};
pub use reversal_service::ReversalService;
pub use settlement_service::SettlementService;
