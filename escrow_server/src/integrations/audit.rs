use escrow_engine::events::{EventHandlers, EventHooks};
use log::*;

pub const AUDIT_EVENT_BUFFER_SIZE: usize = 25;

/// Logs the ledger's committed decisions.
///
/// Money never moves here: the ledger calls the funds service itself for refunds and payouts, so that it can record
/// what the funds service confirmed.
pub fn create_audit_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_escrow_released(|ev| {
        Box::pin(async move {
            info!(
                "💸️ Order {} released. {} due to seller {}",
                ev.escrow.order_id, ev.escrow.seller_amount, ev.escrow.seller_id
            );
        })
    });
    hooks.on_escrow_refunded(|ev| {
        Box::pin(async move {
            debug!("💸️ Order {} refunded with reference {}", ev.order.order_id, ev.refund_reference);
        })
    });
    hooks.on_dispute_opened(|ev| {
        Box::pin(async move {
            info!(
                "⚖️ Dispute #{} ({}) opened on order {}. Support should follow up with both parties.",
                ev.dispute.id, ev.dispute.dispute_type, ev.dispute.order_id
            );
        })
    });
    EventHandlers::new(AUDIT_EVENT_BUFFER_SIZE, hooks)
}
