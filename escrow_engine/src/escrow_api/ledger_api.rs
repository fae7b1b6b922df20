use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{EscrowStatus, EscrowTransaction, NewEscrow, NewOrder, Order, OrderId, PaymentMethod},
    escrow_api::{
        escrow_objects::{EscrowPolicy, EscrowView, FundingOutcome},
        notices,
        NotificationApi,
    },
    events::{EscrowFundedEvent, EscrowRefundedEvent, EscrowReleasedEvent, EventProducers},
    gateways::NormalizedPaymentEvent,
    traits::{EscrowDatabase, EscrowError, EscrowManagement, FundsGateway, PayoutRequest, RefundRequest},
};

/// `EscrowLedgerApi` is the authoritative record of who holds the money for each order.
///
/// Every method that moves an escrow between states does so with a single conditional update, so it is safe to call
/// the same method twice for the same order (a gateway retrying a notification, say). The second call reports that
/// there was nothing to do rather than moving the money twice.
#[derive(Clone)]
pub struct EscrowLedgerApi<B> {
    db: B,
    policy: EscrowPolicy,
    producers: EventProducers,
    funds: Arc<dyn FundsGateway>,
    notifications: NotificationApi<B>,
}

impl<B> Debug for EscrowLedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscrowLedgerApi ({:?})", self.policy)
    }
}

impl<B: Clone> EscrowLedgerApi<B> {
    pub fn new(db: B, policy: EscrowPolicy, producers: EventProducers, funds: Arc<dyn FundsGateway>) -> Self {
        let notifications = NotificationApi::new(db.clone());
        Self { db, policy, producers, funds, notifications }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn policy(&self) -> &EscrowPolicy {
        &self.policy
    }
}

impl<B> EscrowLedgerApi<B>
where B: EscrowDatabase
{
    /// Creates the order and its `pending` escrow in one transaction.
    ///
    /// The platform fee and seller amount are computed from the policy, and delivery is expected `delivery_sla_days`
    /// after `now`.
    pub async fn open_escrow(
        &self,
        order: NewOrder,
        now: DateTime<Utc>,
    ) -> Result<(Order, EscrowTransaction), EscrowError> {
        validate_new_order(&order)?;
        let (platform_fee, seller_amount) = self.policy.split(order.total_amount).ok_or_else(|| {
            EscrowError::InvalidOrder(format!("The order total of {} is too large", order.total_amount))
        })?;
        let escrow = NewEscrow {
            order_id: order.order_id.clone(),
            buyer_id: order.buyer_id.clone(),
            seller_id: order.seller_id.clone(),
            total_amount: order.total_amount,
            platform_fee,
            seller_amount,
            expected_delivery_date: self.policy.expected_delivery_date(now),
        };
        let (order, escrow) = self.db.insert_order_with_escrow(order, escrow).await?;
        info!(
            "🔄️📦️ Escrow opened for order {}: {} gross, {} fee, {} to the seller. Delivery expected by {}",
            order.order_id, escrow.total_amount, escrow.platform_fee, escrow.seller_amount, escrow.expected_delivery_date
        );
        Ok((order, escrow))
    }

    /// Applies a verified gateway notification to the ledger.
    ///
    /// * A successful payment for the full order amount moves the escrow from `pending` to `funded`, and the order to
    ///   `paid`. Buyer and seller are notified, and an [`EscrowFundedEvent`] is published.
    /// * A repeat of a notification that has already been applied returns [`FundingOutcome::AlreadyProcessed`].
    /// * A payment that does not match the order total is rejected with [`EscrowError::AmountMismatch`].
    /// * Any other gateway status is acknowledged and changes nothing.
    ///
    /// `provider` is the gateway that sent the notification. It must be the payment method chosen at checkout,
    /// otherwise [`EscrowError::ProviderMismatch`] is returned and nothing changes.
    pub async fn process_payment_event(
        &self,
        provider: PaymentMethod,
        event: NormalizedPaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<FundingOutcome, EscrowError> {
        let order = self
            .db
            .fetch_order_by_order_id(event.order_id())
            .await?
            .ok_or_else(|| EscrowError::OrderNotFound(event.order_id().clone()))?;
        if order.payment_method != provider {
            warn!(
                "🔄️💰️ {provider} sent a notification for order {}, which is paid with {}. The notification is rejected.",
                order.order_id, order.payment_method
            );
            return Err(EscrowError::ProviderMismatch {
                order_id: order.order_id,
                expected: order.payment_method,
                received: provider,
            });
        }
        let (amount, provider_ref) = match event {
            NormalizedPaymentEvent::Completed { amount, provider_ref, .. } => (amount, provider_ref),
            NormalizedPaymentEvent::NotCompleted { order_id, status, .. } => {
                info!("🔄️💰️ Payment for order {order_id} was not completed ({status}). Nothing to do.");
                return Ok(FundingOutcome::NotCompleted { order_id, status });
            },
        };
        if amount != order.total_amount {
            warn!(
                "🔄️💰️ Payment of {amount} received for order {}, but the order total is {}. The payment is rejected.",
                order.order_id, order.total_amount
            );
            return Err(EscrowError::AmountMismatch {
                order_id: order.order_id,
                expected: order.total_amount,
                received: amount,
            });
        }
        match self.db.fund_escrow(&order.order_id, &provider_ref, now).await? {
            Some((order, escrow)) => {
                info!("🔄️💰️ Order {} is paid ({provider_ref}). {} is held in escrow", order.order_id, escrow.total_amount);
                self.notifications.notify_all(notices::payment_received(&order)).await;
                self.producers.publish_escrow_funded(EscrowFundedEvent::new(order.clone(), escrow.clone())).await;
                Ok(FundingOutcome::Funded { order, escrow })
            },
            None => {
                let escrow = self
                    .db
                    .fetch_escrow_for_order(&order.order_id)
                    .await?
                    .ok_or_else(|| EscrowError::EscrowNotFound(order.order_id.clone()))?;
                debug!(
                    "🔄️💰️ Payment notification for order {} ignored. The escrow is already {}",
                    order.order_id, escrow.status
                );
                Ok(FundingOutcome::AlreadyProcessed { escrow })
            },
        }
    }

    /// Releases the held funds to the seller.
    ///
    /// Only a `funded` escrow can be released. Anything else, including an escrow that has already been released,
    /// gives [`EscrowError::EscrowNotFound`] and changes nothing.
    ///
    /// The release is committed before the seller is paid, so that a refund can no longer win the race for the same
    /// money. The payout is then attempted straight away. If the funds service fails, the release stands, the escrow
    /// stays unpaid, and [`crate::AutoRefundApi::run_payout_sweep_at`] retries it.
    pub async fn release(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<(Order, EscrowTransaction), EscrowError> {
        let (order, escrow) = self.db.release_escrow(order_id, now).await?.ok_or_else(|| {
            debug!("🔄️✅️ There is no funded escrow to release for order {order_id}");
            EscrowError::EscrowNotFound(order_id.clone())
        })?;
        info!("🔄️✅️ Escrow for order {order_id} released. {} is due to seller {}", escrow.seller_amount, escrow.seller_id);
        self.notifications.notify_all(notices::funds_released(&escrow)).await;
        self.producers.publish_escrow_released(EscrowReleasedEvent::new(order.clone(), escrow.clone())).await;
        let escrow = match self.pay_out(&escrow, now).await {
            Ok(paid) => paid,
            Err(e) => {
                warn!("🔄️💸️ Order {order_id} is released but the seller has not been paid yet. It will be retried. {e}");
                escrow
            },
        };
        Ok((order, escrow))
    }

    /// Pays the seller their share of a released escrow and records the funds service's reference.
    ///
    /// The request is keyed on the payment reference, so calling this again for the same escrow never pays twice. An
    /// escrow whose payout is already recorded is returned as is. On failure nothing is recorded and
    /// [`EscrowError::PayoutFailed`] is returned.
    pub async fn pay_out(
        &self,
        escrow: &EscrowTransaction,
        now: DateTime<Utc>,
    ) -> Result<EscrowTransaction, EscrowError> {
        let order_id = &escrow.order_id;
        if escrow.status != EscrowStatus::Released {
            return Err(EscrowError::InvalidEscrowState { order_id: order_id.clone(), status: escrow.status });
        }
        if escrow.paid_out_at.is_some() {
            return Ok(escrow.clone());
        }
        let request = PayoutRequest {
            order_id: order_id.clone(),
            seller_id: escrow.seller_id.clone(),
            amount: escrow.seller_amount,
            idempotency_key: escrow.idempotency_key(),
        };
        let receipt = self
            .funds
            .payout(request)
            .await
            .map_err(|e| EscrowError::PayoutFailed(order_id.clone(), e.to_string()))?;
        match self.db.record_payout(order_id, &receipt.reference, now).await? {
            Some(paid) => {
                info!(
                    "🔄️💸️ {} paid out to seller {} for order {order_id} ({})",
                    paid.seller_amount, paid.seller_id, receipt.reference
                );
                Ok(paid)
            },
            None => {
                debug!("🔄️💸️ The payout for order {order_id} was recorded by someone else in the meantime");
                self.fetch_escrow(order_id).await
            },
        }
    }

    /// The buyer confirms that they have received the goods.
    pub async fn confirm_receipt(
        &self,
        order_id: &OrderId,
        buyer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Order, EscrowTransaction), EscrowError> {
        let order = self.fetch_order(order_id).await?;
        if order.buyer_id != buyer_id {
            warn!("🔄️✅️ User {buyer_id} tried to release the escrow for order {order_id}, but is not the buyer");
            return Err(EscrowError::NotOrderBuyer(order_id.clone()));
        }
        self.release(order_id, now).await
    }

    /// Returns the buyer's money.
    ///
    /// The funds service is asked to refund the buyer first, keyed on the payment reference so that a retry never
    /// refunds twice. Only once it has confirmed is the escrow moved to `refunded` and the order to `cancelled`. If
    /// the funds service fails, the escrow stays `funded` and [`EscrowError::RefundFailed`] is returned.
    pub async fn refund(
        &self,
        escrow: &EscrowTransaction,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Order, EscrowTransaction), EscrowError> {
        let order_id = &escrow.order_id;
        if escrow.status != EscrowStatus::Funded {
            return Err(EscrowError::InvalidEscrowState { order_id: order_id.clone(), status: escrow.status });
        }
        let request = RefundRequest {
            order_id: order_id.clone(),
            buyer_id: escrow.buyer_id.clone(),
            amount: escrow.total_amount,
            idempotency_key: escrow.idempotency_key(),
            reason: reason.to_string(),
        };
        let receipt = self.funds.refund(request).await.map_err(|e| {
            warn!("🔄️💸️ Refund of {} for order {order_id} failed. The escrow stays funded. {e}", escrow.total_amount);
            EscrowError::RefundFailed(order_id.clone(), e.to_string())
        })?;
        let (order, escrow) = self.db.refund_escrow(order_id, now).await?.ok_or_else(|| {
            error!(
                "🔄️💸️ The funds service refunded order {order_id} (ref {}), but the escrow was no longer funded. This \
                 needs manual reconciliation.",
                receipt.reference
            );
            EscrowError::EscrowNotFound(order_id.clone())
        })?;
        info!("🔄️💸️ Order {order_id} refunded ({}). {} returned to the buyer", receipt.reference, escrow.total_amount);
        self.notifications.notify_all(notices::refund_processed(&escrow)).await;
        let event =
            EscrowRefundedEvent { order: order.clone(), escrow: escrow.clone(), refund_reference: receipt.reference };
        self.producers.publish_escrow_refunded(event).await;
        Ok((order, escrow))
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, EscrowError> {
        self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| EscrowError::OrderNotFound(order_id.clone()))
    }

    pub async fn fetch_escrow(&self, order_id: &OrderId) -> Result<EscrowTransaction, EscrowError> {
        self.db.fetch_escrow_for_order(order_id).await?.ok_or_else(|| EscrowError::EscrowNotFound(order_id.clone()))
    }

    /// The escrow as seen by one of the parties to the order. Anyone else gets [`EscrowError::OrderNotFound`].
    pub async fn escrow_for_party(&self, order_id: &OrderId, user_id: &str) -> Result<EscrowView, EscrowError> {
        let escrow = self.fetch_escrow(order_id).await?;
        if escrow.buyer_id != user_id && escrow.seller_id != user_id {
            return Err(EscrowError::OrderNotFound(order_id.clone()));
        }
        Ok(EscrowView::from(escrow))
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), EscrowError> {
    if order.order_id.as_str().trim().is_empty() {
        return Err(EscrowError::InvalidOrder("The order id is empty".into()));
    }
    if order.buyer_id.trim().is_empty() || order.seller_id.trim().is_empty() {
        return Err(EscrowError::InvalidOrder("Both a buyer and a seller are required".into()));
    }
    if order.buyer_id == order.seller_id {
        return Err(EscrowError::InvalidOrder("A seller cannot buy their own item".into()));
    }
    if !order.total_amount.is_positive() {
        return Err(EscrowError::InvalidOrder(format!("The order total must be positive, not {}", order.total_amount)));
    }
    Ok(())
}
