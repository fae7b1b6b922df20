use std::fmt::Display;

use escrow_engine::{
    db_types::{Dispute, OrderId, PaymentMethod, ShippingProvider},
    escrow_objects::EscrowView,
};
use serde::{Deserialize, Serialize};

use crate::config::EftDetails;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Sent by the storefront when the buyer clicks "Pay". The buyer is the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub order_id: OrderId,
    pub seller_id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub item_name: String,
    /// The gross amount in Rand, e.g. `"250.00"`.
    pub amount: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub buyer_email: String,
    #[serde(default)]
    pub buyer_first_name: String,
    #[serde(default)]
    pub buyer_last_name: String,
}

/// Where to send the buyer next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutPayment {
    /// The gateway's hosted payment page.
    Redirect { provider: PaymentMethod, url: String },
    /// Manual bank transfer. The buyer must use `reference` so that the payment can be matched to the order.
    Eft {
        #[serde(flatten)]
        details: EftDetails,
        reference: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub escrow: EscrowView,
    pub payment: CheckoutPayment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRequest {
    pub provider: ShippingProvider,
    pub tracking_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeRequest {
    pub order_id: OrderId,
    pub dispute_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeResponse {
    pub dispute: Dispute,
    /// `None` if the escrow had already been released or refunded.
    pub escrow: Option<EscrowView>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}
