pub mod models;

pub use models::{Payment, PaymentMethod, PaymentStatus};
