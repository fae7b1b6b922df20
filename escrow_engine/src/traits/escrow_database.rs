use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        Cents,
        Dispute,
        EscrowStatus,
        EscrowTransaction,
        NewDispute,
        NewEscrow,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PaymentMethod,
        ShippingProvider,
    },
    traits::{EscrowManagement, NotificationManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the escrow engine.
///
/// Every state-changing method is a conditional update keyed on the current status of the escrow. If the escrow is
/// not in the expected status, the method returns `Ok(None)` and nothing is written. This is what makes repeated
/// webhook deliveries and overlapping sweeps safe without explicit locking.
#[allow(async_fn_in_trait)]
pub trait EscrowDatabase: Clone + EscrowManagement + NotificationManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order along with its `pending` escrow in a single atomic transaction.
    ///
    /// Returns [`EscrowError::OrderAlreadyExists`] if an order with the same order id has been stored before.
    async fn insert_order_with_escrow(
        &self,
        order: NewOrder,
        escrow: NewEscrow,
    ) -> Result<(Order, EscrowTransaction), EscrowError>;

    /// `pending → funded`. The order moves to `paid` and both records take the gateway's payment reference.
    async fn fund_escrow(
        &self,
        order_id: &OrderId,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, EscrowTransaction)>, EscrowError>;

    /// `funded → released`. Stamps `released_at` and marks the order `completed`.
    async fn release_escrow(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, EscrowTransaction)>, EscrowError>;

    /// `funded → refunded`. Stamps `refunded_at` and marks the order `cancelled`.
    ///
    /// Call this only once the funds service has confirmed the refund.
    async fn refund_escrow(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, EscrowTransaction)>, EscrowError>;

    /// Records the funds service's confirmation of the seller payout on a `released` escrow. Returns `None` if the
    /// escrow is not released, or its payout has already been recorded.
    async fn record_payout(
        &self,
        order_id: &OrderId,
        payout_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EscrowTransaction>, EscrowError>;

    /// Released escrows whose seller payout has not been confirmed, oldest release first.
    async fn fetch_unpaid_releases(&self) -> Result<Vec<EscrowTransaction>, EscrowError>;

    /// Funded escrows whose expected delivery date lies before `cutoff` and that have no refund date yet.
    async fn fetch_overdue_escrows(&self, cutoff: DateTime<Utc>) -> Result<Vec<EscrowTransaction>, EscrowError>;

    /// Sets the refund deadline on a funded escrow, but only if no deadline has been set before.
    async fn arm_auto_refund(
        &self,
        order_id: &OrderId,
        refund_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<EscrowTransaction>, EscrowError>;

    /// Funded escrows whose refund deadline is on or before `today`.
    async fn fetch_refund_due_escrows(&self, today: NaiveDate) -> Result<Vec<EscrowTransaction>, EscrowError>;

    /// Stores the dispute, flags the escrow as disputed and pushes the refund clock forward by `extension_days`.
    ///
    /// If the refund deadline has been armed, it moves forward. If not, the expected delivery date moves forward
    /// instead, which defers the arming sweep. Escrows that are already released or refunded are left alone, and `None`
    /// is returned alongside the stored dispute.
    async fn insert_dispute(
        &self,
        dispute: NewDispute,
        extension_days: u32,
        now: DateTime<Utc>,
    ) -> Result<(Dispute, Option<EscrowTransaction>), EscrowError>;

    /// Records the courier and waybill for an order and moves it to `shipped` if it is not there already.
    async fn attach_shipment(
        &self,
        order_id: &OrderId,
        provider: ShippingProvider,
        tracking_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, EscrowError>;

    /// Moves the order status forward. Returns `None` if the move would go backwards, or the order does not exist.
    async fn advance_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, EscrowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), EscrowError>;
}

#[derive(Debug, Clone, Error)]
pub enum EscrowError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The order is not valid. {0}")]
    InvalidOrder(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No escrow in the required state exists for order {0}")]
    EscrowNotFound(OrderId),
    #[error("The escrow for order {order_id} is {status}, so the requested transition is not allowed")]
    InvalidEscrowState { order_id: OrderId, status: EscrowStatus },
    #[error("Only the buyer of order {0} can do that")]
    NotOrderBuyer(OrderId),
    #[error("Only the seller of order {0} can do that")]
    NotOrderSeller(OrderId),
    #[error("Payment for order {order_id} was {received}, but the order total is {expected}")]
    AmountMismatch { order_id: OrderId, expected: Cents, received: Cents },
    #[error("Order {order_id} is paid with {expected}, but the notification came from {received}")]
    ProviderMismatch { order_id: OrderId, expected: PaymentMethod, received: PaymentMethod },
    #[error("The refund for order {0} could not be processed. {1}")]
    RefundFailed(OrderId, String),
    #[error("The payout to the seller of order {0} could not be processed. {1}")]
    PayoutFailed(OrderId, String),
    #[error("Notification {0} does not exist")]
    NotificationNotFound(i64),
}

impl From<sqlx::Error> for EscrowError {
    fn from(e: sqlx::Error) -> Self {
        EscrowError::DatabaseError(e.to_string())
    }
}
