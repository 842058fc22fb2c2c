pub mod collateral;
pub mod customers;
pub mod health;
pub mod loans;
pub mod payments;
pub mod settlement;
