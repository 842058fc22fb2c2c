use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::modules::loans::models::Loan;

/// How one payment splits across a loan's balance components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Allocation {
    pub late_fee: Decimal,
    pub interest: Decimal,
    pub principal: Decimal,
}

impl Allocation {
    pub fn total(&self) -> Decimal {
        self.late_fee + self.interest + self.principal
    }
}

/// Fixed-priority payment waterfall: late fee, then interest, then
/// principal.
pub struct AllocationWaterfall;

impl AllocationWaterfall {
    /// Split `payment_amount` across the three remaining balances.
    ///
    /// Each split is `min(remaining payment, component balance)` taken in
    /// priority order, so no split is ever negative and no component
    /// receives more than it owes. Anything left after principal is not
    /// allocated; callers reject that case up front with
    /// [`Loan::ensure_within_balance`].
    pub fn allocate(
        payment_amount: Decimal,
        late_fee_remaining: Decimal,
        interest_remaining: Decimal,
        principal_remaining: Decimal,
    ) -> Allocation {
        let mut remaining = payment_amount.max(Decimal::ZERO);

        let late_fee = Self::take(&mut remaining, late_fee_remaining);
        let interest = Self::take(&mut remaining, interest_remaining);
        let principal = Self::take(&mut remaining, principal_remaining);

        Allocation {
            late_fee,
            interest,
            principal,
        }
    }

    /// Validate and allocate a payment against a loan's current balances
    pub fn allocate_for_loan(loan: &Loan, payment_amount: Decimal) -> Result<Allocation> {
        loan.ensure_within_balance(payment_amount)?;

        Ok(Self::allocate(
            payment_amount,
            loan.late_fee_remaining,
            loan.interest_remaining,
            loan.principal_remaining,
        ))
    }

    fn take(remaining: &mut Decimal, component: Decimal) -> Decimal {
        let applied = (*remaining).min(component.max(Decimal::ZERO));
        *remaining -= applied;
        applied
    }
}
