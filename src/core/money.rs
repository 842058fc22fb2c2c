use rust_decimal::Decimal;

/// Loans are booked in a single currency with cent precision
pub const MONEY_SCALE: u32 = 2;

/// Validates that a payment amount is strictly positive and has at most
/// two decimal places
pub fn validate_payment_amount(amount: Decimal) -> Result<(), String> {
    if amount <= Decimal::ZERO {
        return Err(format!("Amount must be greater than zero, got {}", amount));
    }

    let scale = amount.normalize().scale();
    if scale > MONEY_SCALE {
        return Err(format!(
            "Amounts must have at most {} decimal places, got {}",
            MONEY_SCALE, scale
        ));
    }

    Ok(())
}
