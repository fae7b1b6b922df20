use crate::{
    db_types::{Dispute, EscrowTransaction, Order, OrderId},
    traits::EscrowError,
};

/// Read-only queries over orders, escrows and disputes.
///
/// The storefront and admin console only ever read escrow state, and this is the trait they get.
#[allow(async_fn_in_trait)]
pub trait EscrowManagement {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, EscrowError>;

    /// Looks up an order from the courier's waybill or tracking number.
    async fn fetch_order_by_tracking_reference(&self, tracking: &str) -> Result<Option<Order>, EscrowError>;

    async fn fetch_escrow_for_order(&self, order_id: &OrderId) -> Result<Option<EscrowTransaction>, EscrowError>;

    async fn fetch_disputes_for_order(&self, order_id: &OrderId) -> Result<Vec<Dispute>, EscrowError>;
}
