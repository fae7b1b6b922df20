use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Order, OrderId, OrderStatusType, ShippingProvider},
    escrow_api::{
        escrow_objects::{release_decision, DeliveryOutcome, ReleaseDecision, ShippingUpdate},
        notices,
        EscrowLedgerApi,
        NotificationApi,
    },
    traits::{EscrowDatabase, EscrowError, EscrowManagement},
};

/// `DeliveryConfirmationApi` turns courier and locker status updates into escrow decisions.
///
/// Funds are released when the buyer takes possession of the goods. For a locker network that is when the parcel is
/// collected; for a door-to-door courier it is when the parcel is delivered. See [`release_decision`].
pub struct DeliveryConfirmationApi<B> {
    db: B,
    ledger: EscrowLedgerApi<B>,
    notifications: NotificationApi<B>,
}

impl<B> Debug for DeliveryConfirmationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeliveryConfirmationApi")
    }
}

impl<B: Clone> DeliveryConfirmationApi<B> {
    pub fn new(ledger: EscrowLedgerApi<B>) -> Self {
        let db = ledger.db().clone();
        let notifications = NotificationApi::new(db.clone());
        Self { db, ledger, notifications }
    }
}

impl<B> DeliveryConfirmationApi<B>
where B: EscrowDatabase
{
    pub async fn process_shipping_update(
        &self,
        update: ShippingUpdate,
        now: DateTime<Utc>,
    ) -> Result<DeliveryOutcome, EscrowError> {
        let Some(order) = self.find_order(&update).await? else {
            info!(
                "🔄️🚚️ No order matches the {} update for tracking number {}. Ignoring it.",
                update.provider, update.tracking_number
            );
            return Ok(DeliveryOutcome::NotFound);
        };
        let decision = release_decision(update.provider.channel(), update.status);
        debug!("🔄️🚚️ {} '{}' for order {}: {decision:?}", update.provider, update.status, order.order_id);
        match decision {
            ReleaseDecision::Release => match self.ledger.release(&order.order_id, now).await {
                Ok((_, escrow)) => Ok(DeliveryOutcome::Released { escrow }),
                Err(EscrowError::EscrowNotFound(_)) => Ok(DeliveryOutcome::NotFound),
                Err(e) => Err(e),
            },
            ReleaseDecision::MarkShipped => self.advance(&order, OrderStatusType::Shipped, now).await,
            ReleaseDecision::AwaitCollection => {
                let outcome = self.advance(&order, OrderStatusType::Delivered, now).await?;
                if let DeliveryOutcome::Advanced { order } = &outcome {
                    self.notifications.notify_all([notices::ready_for_collection(order)]).await;
                }
                Ok(outcome)
            },
            ReleaseDecision::Ignore => {
                info!(
                    "🔄️🚚️ {} status '{}' for order {} does not affect the escrow. Ignoring it.",
                    update.provider, update.status, order.order_id
                );
                let reason = format!("{} '{}' does not release funds", update.provider, update.status);
                Ok(DeliveryOutcome::Ignored { reason })
            },
        }
    }

    /// The seller hands the parcel to a courier or locker network. Only the order's seller may do this, and only once
    /// the order has been paid.
    pub async fn register_shipment(
        &self,
        order_id: &OrderId,
        seller_id: &str,
        provider: ShippingProvider,
        tracking_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, EscrowError> {
        let tracking_reference = tracking_reference.trim();
        if tracking_reference.is_empty() {
            return Err(EscrowError::InvalidOrder("A tracking number is required".into()));
        }
        let order = self.ledger.fetch_order(order_id).await?;
        if order.seller_id != seller_id {
            warn!("🔄️🚚️ User {seller_id} tried to register a shipment for order {order_id}, but is not the seller");
            return Err(EscrowError::NotOrderSeller(order_id.clone()));
        }
        let order =
            self.db.attach_shipment(order_id, provider, tracking_reference, now).await?.ok_or_else(|| {
                EscrowError::InvalidOrder(format!("Order {order_id} is {} and cannot be shipped", order.status))
            })?;
        info!("🔄️🚚️ Order {order_id} shipped with {provider}. Tracking number {tracking_reference}");
        self.notifications.notify_all([notices::order_shipped(&order)]).await;
        Ok(order)
    }

    /// By order id if the update carries one, otherwise by tracking number.
    async fn find_order(&self, update: &ShippingUpdate) -> Result<Option<Order>, EscrowError> {
        if let Some(order_id) = &update.order_id {
            if let Some(order) = self.db.fetch_order_by_order_id(order_id).await? {
                return Ok(Some(order));
            }
        }
        self.db.fetch_order_by_tracking_reference(update.tracking_number.trim()).await
    }

    async fn advance(
        &self,
        order: &Order,
        status: OrderStatusType,
        now: DateTime<Utc>,
    ) -> Result<DeliveryOutcome, EscrowError> {
        if order.status == OrderStatusType::PendingPayment {
            let reason = format!("Order {} has not been paid", order.order_id);
            return Ok(DeliveryOutcome::Ignored { reason });
        }
        match self.db.advance_order_status(&order.order_id, status, now).await? {
            Some(order) => {
                debug!("🔄️🚚️ Order {} is now {}", order.order_id, order.status);
                Ok(DeliveryOutcome::Advanced { order })
            },
            None => Ok(DeliveryOutcome::Ignored {
                reason: format!("Order {} is already {}", order.order_id, order.status),
            }),
        }
    }
}
