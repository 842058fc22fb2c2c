pub mod requests;

pub use requests::{
    ReversalOutcome, ReversePaymentRequest, SettlePaymentRequest, SettlementOutcome,
};
