use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::core::Result;
use crate::modules::customers::models::{AdjustmentApplication, CustomerAdjustment};
use crate::modules::customers::repositories::CustomerAdjustmentOutbox;

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub applied: usize,
    pub failed: usize,
    /// Left for a later pass behind an older adjustment of the same customer
    pub deferred: usize,
}

/// Background job that applies queued `total_paid` adjustments to customers.
///
/// Settlements and reversals only enqueue adjustments inside their own
/// transaction; this relay makes the customer aggregate eventually
/// consistent with them. Adjustments of one customer are applied strictly
/// in sequence order, so a reversal never reaches the zero clamp ahead of
/// the settlement it undoes. A failing adjustment stays queued, holds back
/// the customer's later ones and is retried on the next pass until it
/// reaches `max_attempts`.
pub struct CustomerStatsRelay {
    outbox: Arc<dyn CustomerAdjustmentOutbox>,
    poll_interval: Duration,
    batch_size: u32,
    max_attempts: i32,
}

impl CustomerStatsRelay {
    pub fn new(
        outbox: Arc<dyn CustomerAdjustmentOutbox>,
        poll_interval: Duration,
        batch_size: u32,
        max_attempts: i32,
    ) -> Self {
        Self {
            outbox,
            poll_interval,
            batch_size,
            max_attempts,
        }
    }

    /// Run the relay forever. Spawn as a tokio task from main.rs.
    pub async fn start(self: Arc<Self>) {
        info!(
            poll_seconds = self.poll_interval.as_secs(),
            "Starting customer stats relay"
        );

        let mut ticker = interval(self.poll_interval);

        loop {
            ticker.tick().await;

            match self.drain_once().await {
                Ok(report) => {
                    if report != RelayReport::default() {
                        info!(
                            applied = report.applied,
                            failed = report.failed,
                            deferred = report.deferred,
                            "Customer stats relay pass finished"
                        );
                    }
                }
                Err(e) => {
                    error!(error = %e, "Customer stats relay pass failed");
                }
            }
        }
    }

    /// Apply one batch of pending adjustments
    pub async fn drain_once(&self) -> Result<RelayReport> {
        let pending = self
            .outbox
            .pending(self.batch_size, self.max_attempts)
            .await?;

        let mut report = RelayReport::default();
        // Customers with an older adjustment left unapplied in this pass
        let mut held: HashSet<String> = HashSet::new();

        for adjustment in pending {
            if held.contains(&adjustment.customer_id) {
                report.deferred += 1;
                continue;
            }

            match self.outbox.apply_adjustment(&adjustment, Utc::now()).await {
                Ok(AdjustmentApplication::Applied {
                    previous_total,
                    total_paid,
                }) => {
                    report.applied += 1;
                    log_applied(&adjustment, previous_total, total_paid);
                }
                Ok(AdjustmentApplication::Blocked) => {
                    report.deferred += 1;
                    held.insert(adjustment.customer_id.clone());
                    debug!(
                        adjustment_id = %adjustment.id,
                        customer_id = %adjustment.customer_id,
                        sequence = adjustment.sequence,
                        "Customer adjustment waiting on an older one"
                    );
                }
                Ok(AdjustmentApplication::Skipped) => {
                    report.deferred += 1;
                    held.insert(adjustment.customer_id.clone());
                }
                Err(e) => {
                    report.failed += 1;
                    held.insert(adjustment.customer_id.clone());
                    self.outbox.record_failure(&adjustment.id, &e.to_string()).await?;

                    if adjustment.attempts + 1 >= self.max_attempts {
                        error!(
                            adjustment_id = %adjustment.id,
                            customer_id = %adjustment.customer_id,
                            payment_id = %adjustment.payment_id,
                            delta = %adjustment.delta,
                            error = %e,
                            "Customer adjustment exhausted retries, needs manual reconciliation"
                        );
                    } else {
                        warn!(
                            adjustment_id = %adjustment.id,
                            customer_id = %adjustment.customer_id,
                            attempt = adjustment.attempts + 1,
                            error = %e,
                            "Customer adjustment failed, will retry"
                        );
                    }
                }
            }
        }

        Ok(report)
    }
}

fn log_applied(adjustment: &CustomerAdjustment, previous_total: Decimal, total_paid: Decimal) {
    if previous_total + adjustment.delta < Decimal::ZERO {
        warn!(
            customer_id = %adjustment.customer_id,
            total_paid = %previous_total,
            delta = %adjustment.delta,
            "Customer total_paid clamped at zero"
        );
    }

    debug!(
        adjustment_id = %adjustment.id,
        customer_id = %adjustment.customer_id,
        total_paid = %total_paid,
        "Customer adjustment applied"
    );
}
