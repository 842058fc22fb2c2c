pub mod customer;

pub use customer::{AdjustmentApplication, Customer, CustomerAdjustment};
