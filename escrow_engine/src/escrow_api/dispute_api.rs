use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Dispute, EscrowTransaction, NewDispute, OrderId},
    escrow_api::{escrow_objects::EscrowPolicy, notices, NotificationApi},
    events::{DisputeOpenedEvent, EventProducers},
    traits::{EscrowDatabase, EscrowError, EscrowManagement},
};

/// Lets a buyer hold the automatic refund while a problem with their order is investigated.
#[derive(Clone)]
pub struct DisputeApi<B> {
    db: B,
    policy: EscrowPolicy,
    producers: EventProducers,
    notifications: NotificationApi<B>,
}

impl<B> Debug for DisputeApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DisputeApi")
    }
}

impl<B: Clone> DisputeApi<B> {
    pub fn new(db: B, policy: EscrowPolicy, producers: EventProducers) -> Self {
        let notifications = NotificationApi::new(db.clone());
        Self { db, policy, producers, notifications }
    }
}

impl<B> DisputeApi<B>
where B: EscrowDatabase
{
    /// Opens a dispute on behalf of the order's buyer.
    ///
    /// The escrow is flagged as disputed and its refund clock is pushed forward by `dispute_extension_days`. If the
    /// refund deadline has not been armed yet, the expected delivery date moves instead, so the overdue sweep arms
    /// the deadline that much later. The escrow status itself never changes, and a deadline is never brought closer.
    pub async fn open_dispute(
        &self,
        order_id: &OrderId,
        buyer_id: &str,
        dispute_type: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<(Dispute, Option<EscrowTransaction>), EscrowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| EscrowError::OrderNotFound(order_id.clone()))?;
        if order.buyer_id != buyer_id {
            warn!("🔄️⚖️ User {buyer_id} tried to open a dispute on order {order_id}, but is not the buyer");
            return Err(EscrowError::NotOrderBuyer(order_id.clone()));
        }
        let dispute_type = dispute_type.trim();
        if dispute_type.is_empty() {
            return Err(EscrowError::InvalidOrder("A dispute type is required".into()));
        }
        let dispute = NewDispute {
            order_id: order.order_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            dispute_type: dispute_type.to_string(),
            description: description.trim().to_string(),
        };
        let (dispute, escrow) = self.db.insert_dispute(dispute, self.policy.dispute_extension_days, now).await?;
        match &escrow {
            Some(e) => info!(
                "🔄️⚖️ Dispute #{} opened on order {order_id}. Refund date {:?}, expected delivery {}",
                dispute.id, e.auto_refund_date, e.expected_delivery_date
            ),
            None => info!("🔄️⚖️ Dispute #{} opened on order {order_id}. The escrow has already been settled", dispute.id),
        }
        self.notifications.notify_all(notices::dispute_opened(&dispute, escrow.as_ref())).await;
        let event = DisputeOpenedEvent { dispute: dispute.clone(), escrow: escrow.clone() };
        self.producers.publish_dispute_opened(event).await;
        Ok((dispute, escrow))
    }

    pub async fn disputes_for_order(&self, order_id: &OrderId) -> Result<Vec<Dispute>, EscrowError> {
        self.db.fetch_disputes_for_order(order_id).await
    }
}
