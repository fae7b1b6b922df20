use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use tokio::sync::Mutex;

use crate::{
    escrow_api::{escrow_objects::SweepReport, notices, EscrowLedgerApi, NotificationApi},
    traits::{EscrowDatabase, EscrowError},
};

const NON_DELIVERY: &str = "Automatic refund: the order was not delivered";

/// `AutoRefundApi` protects buyers whose goods never arrive, and sellers whose payout did not go through.
///
/// It runs three sweeps, each of which is safe to run at any time and any number of times:
/// 1. [`Self::run_overdue_sweep_at`] arms a refund deadline on every funded escrow that is overdue for delivery, and
///    warns both parties.
/// 2. [`Self::run_refund_sweep_at`] refunds every funded escrow whose deadline has passed.
/// 3. [`Self::run_payout_sweep_at`] retries the seller payout for released escrows that have not been paid.
///
/// A sweep never runs concurrently with itself. If a run is still busy when the next one starts, the new run does
/// nothing and reports itself as skipped.
pub struct AutoRefundApi<B> {
    db: B,
    ledger: EscrowLedgerApi<B>,
    notifications: NotificationApi<B>,
    overdue_guard: Arc<Mutex<()>>,
    refund_guard: Arc<Mutex<()>>,
    payout_guard: Arc<Mutex<()>>,
}

impl<B> Debug for AutoRefundApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AutoRefundApi")
    }
}

impl<B: Clone> Clone for AutoRefundApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            ledger: self.ledger.clone(),
            notifications: self.notifications.clone(),
            overdue_guard: Arc::clone(&self.overdue_guard),
            refund_guard: Arc::clone(&self.refund_guard),
            payout_guard: Arc::clone(&self.payout_guard),
        }
    }
}

impl<B: Clone> AutoRefundApi<B> {
    pub fn new(ledger: EscrowLedgerApi<B>) -> Self {
        let db = ledger.db().clone();
        let notifications = NotificationApi::new(db.clone());
        Self {
            db,
            ledger,
            notifications,
            overdue_guard: Arc::new(Mutex::new(())),
            refund_guard: Arc::new(Mutex::new(())),
            payout_guard: Arc::new(Mutex::new(())),
        }
    }
}

impl<B> AutoRefundApi<B>
where B: EscrowDatabase
{
    /// Arms the refund deadline on funded escrows that are more than `overdue_threshold_days` past their expected
    /// delivery date and have no deadline yet. The deadline is `refund_grace_days` after `now`.
    ///
    /// Arming is a conditional update on a null deadline, so an escrow is armed, and its parties warned, exactly once.
    pub async fn run_overdue_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, EscrowError> {
        let Ok(_guard) = self.overdue_guard.try_lock() else {
            warn!("🔄️⏰️ The previous overdue sweep is still running. Skipping this one.");
            return Ok(SweepReport::skipped());
        };
        let policy = self.ledger.policy();
        let overdue = self.db.fetch_overdue_escrows(policy.overdue_cutoff(now)).await?;
        let refund_date = policy.refund_date(now);
        let mut report = SweepReport { examined: overdue.len(), ..Default::default() };
        for escrow in overdue {
            let order_id = escrow.order_id.clone();
            match self.db.arm_auto_refund(&order_id, refund_date, now).await {
                Ok(Some(armed)) => {
                    info!(
                        "🔄️⏰️ Order {order_id} was due on {}. Automatic refund scheduled for {refund_date}",
                        armed.expected_delivery_date
                    );
                    self.notifications.notify_all(notices::delivery_overdue(&armed, refund_date)).await;
                    report.processed.push(order_id);
                },
                Ok(None) => debug!("🔄️⏰️ Order {order_id} was armed or resolved by someone else in the meantime"),
                Err(e) => {
                    error!("🔄️⏰️ Could not schedule the refund for order {order_id}. {e}");
                    report.failed.push((order_id, e.to_string()));
                },
            }
        }
        debug!(
            "🔄️⏰️ Overdue sweep complete: {} examined, {} armed, {} failed",
            report.examined,
            report.processed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Refunds every funded escrow whose deadline is on or before today's date (UTC).
    ///
    /// Each refund is independent. One that fails stays `funded` and is retried on the next run.
    pub async fn run_refund_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, EscrowError> {
        let Ok(_guard) = self.refund_guard.try_lock() else {
            warn!("🔄️💸️ The previous refund sweep is still running. Skipping this one.");
            return Ok(SweepReport::skipped());
        };
        let due = self.db.fetch_refund_due_escrows(now.date_naive()).await?;
        let mut report = SweepReport { examined: due.len(), ..Default::default() };
        for escrow in due {
            let order_id = escrow.order_id.clone();
            match self.ledger.refund(&escrow, NON_DELIVERY, now).await {
                Ok(_) => report.processed.push(order_id),
                Err(e) => {
                    error!("🔄️💸️ Automatic refund for order {order_id} failed. It will be retried. {e}");
                    report.failed.push((order_id, e.to_string()));
                },
            }
        }
        info!(
            "🔄️💸️ Refund sweep complete: {} due, {} refunded, {} failed",
            report.examined,
            report.processed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Pays every released escrow whose seller payout has not been confirmed yet.
    ///
    /// A payout that fails again stays unpaid and is retried on the next run.
    pub async fn run_payout_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, EscrowError> {
        let Ok(_guard) = self.payout_guard.try_lock() else {
            warn!("🔄️💰️ The previous payout sweep is still running. Skipping this one.");
            return Ok(SweepReport::skipped());
        };
        let unpaid = self.db.fetch_unpaid_releases().await?;
        let mut report = SweepReport { examined: unpaid.len(), ..Default::default() };
        for escrow in unpaid {
            let order_id = escrow.order_id.clone();
            match self.ledger.pay_out(&escrow, now).await {
                Ok(_) => report.processed.push(order_id),
                Err(e) => {
                    error!("🔄️💰️ Payout for order {order_id} failed again. It will be retried. {e}");
                    report.failed.push((order_id, e.to_string()));
                },
            }
        }
        debug!(
            "🔄️💰️ Payout sweep complete: {} unpaid, {} paid, {} failed",
            report.examined,
            report.processed.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
