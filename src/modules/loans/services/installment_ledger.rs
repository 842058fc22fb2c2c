use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::modules::loans::models::LoanInstallment;

/// Result of spreading an amount over a loan's installments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedgerMovement {
    /// Indices into the installment slice that changed, in visit order
    pub touched: Vec<usize>,
    /// Amount moved onto (or off) installments
    pub moved: Decimal,
    /// Amount left over once the walk ended
    pub unmoved: Decimal,
}

/// Per-installment bookkeeping for installment-plan loans.
///
/// Payments fill the oldest unpaid installment first; reversals drain the
/// newest paid installment first, so a reversal retraces exactly the
/// installments its payment filled.
pub struct InstallmentLedger;

impl InstallmentLedger {
    /// Distribute `amount` over unpaid installments in ascending
    /// `installment_number` order. A remainder after every installment is
    /// paid is left undistributed.
    pub fn distribute(
        installments: &mut [LoanInstallment],
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> LedgerMovement {
        let mut order: Vec<usize> = (0..installments.len()).collect();
        order.sort_by_key(|&i| installments[i].installment_number);

        let mut remaining = amount.max(Decimal::ZERO);
        let mut movement = LedgerMovement::default();

        for index in order {
            if remaining.is_zero() {
                break;
            }

            let installment = &mut installments[index];
            if installment.is_paid {
                continue;
            }

            let applied = installment.apply(remaining, now);
            if !applied.is_zero() {
                debug!(
                    installment_number = installment.installment_number,
                    applied = %applied,
                    is_paid = installment.is_paid,
                    "Applied payment to installment"
                );
                remaining -= applied;
                movement.moved += applied;
                movement.touched.push(index);
            }
        }

        movement.unmoved = remaining;
        movement
    }

    /// Pull `amount` back off installments in descending
    /// `installment_number` order.
    pub fn reverse_distribute(
        installments: &mut [LoanInstallment],
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> LedgerMovement {
        let mut order: Vec<usize> = (0..installments.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(installments[i].installment_number));

        let mut remaining = amount.max(Decimal::ZERO);
        let mut movement = LedgerMovement::default();

        for index in order {
            if remaining.is_zero() {
                break;
            }

            let installment = &mut installments[index];
            let released = installment.release(remaining, now);
            if !released.is_zero() {
                debug!(
                    installment_number = installment.installment_number,
                    released = %released,
                    "Released payment from installment"
                );
                remaining -= released;
                movement.moved += released;
                movement.touched.push(index);
            }
        }

        movement.unmoved = remaining;
        movement
    }

    /// Sum of what has been paid across all installments
    pub fn total_paid(installments: &[LoanInstallment]) -> Decimal {
        installments.iter().map(|i| i.amount_paid).sum()
    }
}
