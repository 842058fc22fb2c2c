pub mod models;
pub mod repositories;
pub mod services;

pub use models::{AdjustmentApplication, Customer, CustomerAdjustment};
pub use repositories::{CustomerAdjustmentOutbox, CustomerRepository, MySqlCustomerRepository};
pub use services::{CustomerStatsRelay, RelayReport};
