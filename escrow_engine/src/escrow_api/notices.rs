//! The wording of every notification the escrow engine sends.
use chrono::NaiveDate;

use crate::db_types::{Dispute, EscrowTransaction, NewNotification, NotificationType, Order, ShippingProvider};

fn date(d: NaiveDate) -> String {
    d.format("%-d %B %Y").to_string()
}

pub fn payment_received(order: &Order) -> [NewNotification; 2] {
    [
        NewNotification::new(
            order.buyer_id.as_str(),
            "Payment Received",
            format!(
                "Your payment of {} for {} is held securely in escrow until delivery is confirmed.",
                order.total_amount, order.item_name
            ),
            NotificationType::Payment,
        ),
        NewNotification::new(
            order.seller_id.as_str(),
            "New Paid Order",
            format!(
                "Order {} has been paid. Please ship the item. {} will be released to you once delivery is confirmed.",
                order.order_id, order.seller_amount
            ),
            NotificationType::Payment,
        ),
    ]
}

pub fn funds_released(escrow: &EscrowTransaction) -> [NewNotification; 2] {
    [
        NewNotification::new(
            escrow.buyer_id.as_str(),
            "Order Completed",
            format!("Payment for order {} has been released to the seller. Thank you!", escrow.order_id),
            NotificationType::OrderUpdate,
        ),
        NewNotification::new(
            escrow.seller_id.as_str(),
            "Payment Released",
            format!("{} for order {} has been released to your account.", escrow.seller_amount, escrow.order_id),
            NotificationType::Payment,
        ),
    ]
}

pub fn delivery_overdue(escrow: &EscrowTransaction, refund_date: NaiveDate) -> [NewNotification; 2] {
    [
        NewNotification::new(
            escrow.buyer_id.as_str(),
            "Delivery Overdue - Refund Protection Active",
            format!(
                "Your order is overdue. If not delivered by {}, you'll receive an automatic refund. Contact support if \
                 needed.",
                date(refund_date)
            ),
            NotificationType::OrderUpdate,
        ),
        NewNotification::new(
            escrow.seller_id.as_str(),
            "Urgent: Delivery Overdue",
            format!(
                "Order {} is overdue for delivery. Automatic refund will occur on {} if not resolved.",
                escrow.order_id,
                date(refund_date)
            ),
            NotificationType::OrderUpdate,
        ),
    ]
}

pub fn refund_processed(escrow: &EscrowTransaction) -> [NewNotification; 2] {
    [
        NewNotification::new(
            escrow.buyer_id.as_str(),
            "Automatic Refund Processed",
            format!(
                "Your refund of {} has been processed due to non-delivery. Funds will reflect in 3-5 business days.",
                escrow.total_amount
            ),
            NotificationType::Payment,
        ),
        NewNotification::new(
            escrow.seller_id.as_str(),
            "Order Refunded - Non-Delivery",
            format!(
                "Order {} has been automatically refunded due to non-delivery. Please contact support if you believe \
                 this is an error.",
                escrow.order_id
            ),
            NotificationType::OrderUpdate,
        ),
    ]
}

pub fn order_shipped(order: &Order) -> NewNotification {
    let tracking = order.tracking_reference.as_deref().unwrap_or("not available");
    let provider = match order.shipping_provider {
        Some(ShippingProvider::Pudo) => "Pudo",
        Some(ShippingProvider::CourierGuy) => "The Courier Guy",
        None => "the courier",
    };
    NewNotification::new(
        order.buyer_id.as_str(),
        "Order Shipped",
        format!("Order {} is on its way with {provider}. Tracking number: {tracking}.", order.order_id),
        NotificationType::OrderUpdate,
    )
}

pub fn ready_for_collection(order: &Order) -> NewNotification {
    NewNotification::new(
        order.buyer_id.as_str(),
        "Ready for Collection",
        format!("Your parcel for order {} is waiting in the locker. Please collect it.", order.order_id),
        NotificationType::OrderUpdate,
    )
}

pub fn dispute_opened(dispute: &Dispute, escrow: Option<&EscrowTransaction>) -> [NewNotification; 2] {
    let deadline = escrow
        .and_then(|e| e.auto_refund_date)
        .map(|d| format!(" The automatic refund date is now {}.", date(d)))
        .unwrap_or_default();
    [
        NewNotification::new(
            dispute.buyer_id.as_str(),
            "Dispute Opened",
            format!("We have received your dispute for order {}. Our team will be in touch.{deadline}", dispute.order_id),
            NotificationType::Dispute,
        ),
        NewNotification::new(
            dispute.seller_id.as_str(),
            "Dispute Opened",
            format!(
                "The buyer has opened a dispute ({}) for order {}. Funds stay in escrow while it is investigated.",
                dispute.dispute_type, dispute.order_id
            ),
            NotificationType::Dispute,
        ),
    ]
}
