use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{
    Cents,
    EscrowStatus,
    EscrowTransaction,
    FulfilmentChannel,
    Order,
    OrderId,
    ShipmentStatus,
    ShippingProvider,
};

//--------------------------------------     EscrowPolicy      ---------------------------------------------------------
/// The business constants that govern fees and the refund clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowPolicy {
    /// The platform's cut of every order, as a whole percentage of the gross amount.
    pub platform_fee_percent: u32,
    /// Days from checkout until delivery is expected.
    pub delivery_sla_days: u32,
    /// Days past the expected delivery date before the refund deadline is armed.
    pub overdue_threshold_days: u32,
    /// Days between arming and executing the refund.
    pub refund_grace_days: u32,
    /// Days added to the refund clock when the buyer opens a dispute.
    pub dispute_extension_days: u32,
}

impl Default for EscrowPolicy {
    fn default() -> Self {
        Self {
            platform_fee_percent: 10,
            delivery_sla_days: 5,
            overdue_threshold_days: 7,
            refund_grace_days: 7,
            dispute_extension_days: 7,
        }
    }
}

impl EscrowPolicy {
    /// Splits a gross amount into `(platform_fee, seller_amount)`. The two always add up to `total`.
    ///
    /// Returns `None` for an amount too large to split without overflowing.
    pub fn split(&self, total: Cents) -> Option<(Cents, Cents)> {
        let fee = total.percent(self.platform_fee_percent)?;
        Some((fee, total.checked_sub(fee)?))
    }

    pub fn expected_delivery_date(&self, now: DateTime<Utc>) -> NaiveDate {
        add_days(now.date_naive(), self.delivery_sla_days)
    }

    /// Escrows expected before this instant are overdue.
    ///
    /// The expected delivery date is compared as midnight UTC, so an escrow due on the 1st is overdue from 00:00 on
    /// the 8th with the default threshold.
    pub fn overdue_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(i64::from(self.overdue_threshold_days))
    }

    pub fn refund_date(&self, now: DateTime<Utc>) -> NaiveDate {
        add_days(now.date_naive(), self.refund_grace_days)
    }
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days))).unwrap_or(NaiveDate::MAX)
}

//--------------------------------------    FundingOutcome     ---------------------------------------------------------
/// What happened when a verified payment notification was applied to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FundingOutcome {
    /// The escrow moved from `pending` to `funded`.
    Funded { order: Order, escrow: EscrowTransaction },
    /// The escrow had already left `pending`. Nothing was written.
    AlreadyProcessed { escrow: EscrowTransaction },
    /// The gateway reported a status other than success. Nothing was written.
    NotCompleted { order_id: OrderId, status: String },
}

//--------------------------------------      SweepReport      ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Rows selected by the sweep.
    pub examined: usize,
    /// Rows that were armed, or refunded, by this run.
    pub processed: Vec<OrderId>,
    /// Rows that failed, with the reason. They are picked up again on the next run.
    pub failed: Vec<(OrderId, String)>,
    /// `true` if another run of the same sweep was still busy, so this one did nothing.
    pub skipped: bool,
}

impl SweepReport {
    pub fn skipped() -> Self {
        Self { skipped: true, ..Default::default() }
    }
}

//--------------------------------------    ShippingUpdate     ---------------------------------------------------------
/// A status update from a courier or locker network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingUpdate {
    pub tracking_number: String,
    pub status: ShipmentStatus,
    pub provider: ShippingProvider,
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

/// What a shipping update means for the escrow holding the buyer's money.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseDecision {
    /// The buyer has the goods. Release the funds to the seller.
    Release,
    /// The parcel is moving. The order advances to `shipped`.
    MarkShipped,
    /// The parcel is in the locker, but the buyer has not collected it yet.
    AwaitCollection,
    Ignore,
}

/// Funds move when the buyer takes possession: on collection for lockers, on delivery for couriers.
pub fn release_decision(channel: FulfilmentChannel, status: ShipmentStatus) -> ReleaseDecision {
    use FulfilmentChannel::*;
    use ShipmentStatus::*;
    match (channel, status) {
        (Locker, Collected) | (Courier, Delivered) => ReleaseDecision::Release,
        (Locker, Delivered) => ReleaseDecision::AwaitCollection,
        (_, Shipped | InTransit) => ReleaseDecision::MarkShipped,
        (Courier, Collected) | (_, Failed) => ReleaseDecision::Ignore,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Released { escrow: EscrowTransaction },
    Advanced { order: Order },
    Ignored { reason: String },
    /// There is no order for the update, or no funded escrow to release.
    NotFound,
}

//--------------------------------------      EscrowView       ---------------------------------------------------------
/// The escrow as shown to buyers and sellers. `status` is the effective status, so a disputed escrow reads `disputed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowView {
    pub order_id: OrderId,
    pub status: EscrowStatus,
    pub total_amount: Cents,
    pub platform_fee: Cents,
    pub seller_amount: Cents,
    pub expected_delivery_date: NaiveDate,
    pub auto_refund_date: Option<NaiveDate>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub paid_out_at: Option<DateTime<Utc>>,
}

impl From<EscrowTransaction> for EscrowView {
    fn from(escrow: EscrowTransaction) -> Self {
        Self {
            status: escrow.effective_status(),
            order_id: escrow.order_id,
            total_amount: escrow.total_amount,
            platform_fee: escrow.platform_fee,
            seller_amount: escrow.seller_amount,
            expected_delivery_date: escrow.expected_delivery_date,
            auto_refund_date: escrow.auto_refund_date,
            released_at: escrow.released_at,
            refunded_at: escrow.refunded_at,
            paid_out_at: escrow.paid_out_at,
        }
    }
}
