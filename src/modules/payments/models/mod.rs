pub mod payment;

pub use payment::{generate_payment_number, Payment, PaymentMethod, PaymentStatus};
