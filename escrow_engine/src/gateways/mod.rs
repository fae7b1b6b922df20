//! # Payment gateway adapters
//!
//! Each supported gateway (PayFast, Ozow and PayGate) names its fields differently, signs them differently and uses a
//! different sentinel for "paid". The adapters in this module hide those differences:
//!
//! * [`PaymentGateway::build_payment_request`] produces the signed payload that the buyer's browser is redirected
//!   (or posted) to.
//! * [`PaymentGateway::verify`] checks the signature on an inbound notification. It never fails loudly: a missing or
//!   malformed field just means the signature does not match.
//! * [`PaymentGateway::parse_notification`] turns a verified notification into a [`NormalizedPaymentEvent`], so that
//!   the escrow ledger never has to know which gateway the money came through.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Cents, Order, OrderId, PaymentMethod};

mod ozow;
mod payfast;
mod payload;
mod paygate;
pub mod signature;

pub use ozow::{OzowConfig, OzowGateway};
pub use payfast::{PayFastConfig, PayFastGateway};
pub use payload::GatewayPayload;
pub use paygate::{PayGateConfig, PayGateGateway};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The notification signature is invalid")]
    InvalidSignature,
    #[error("Required field '{0}' is missing")]
    MissingField(&'static str),
    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("Could not read the payload. {0}")]
    MalformedPayload(String),
    #[error("{0} is not handled by a payment gateway")]
    UnsupportedProvider(PaymentMethod),
}

/// Everything a gateway needs to know about the buyer and the site that is not part of the order itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutContext {
    pub buyer_email: String,
    pub buyer_first_name: String,
    pub buyer_last_name: String,
    pub return_url: String,
    pub cancel_url: String,
    pub error_url: String,
    pub notify_url: String,
    pub requested_at: DateTime<Utc>,
}

/// A signed request that sends the buyer to the gateway's hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub provider: PaymentMethod,
    pub redirect_target: String,
    pub signed_payload: GatewayPayload,
}

/// The outcome of a verified gateway notification, with the gateway-specific details stripped away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NormalizedPaymentEvent {
    Completed { order_id: OrderId, amount: Cents, provider_ref: String },
    NotCompleted { order_id: OrderId, status: String, provider_ref: Option<String> },
}

impl NormalizedPaymentEvent {
    pub fn order_id(&self) -> &OrderId {
        match self {
            Self::Completed { order_id, .. } => order_id,
            Self::NotCompleted { order_id, .. } => order_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

pub trait PaymentGateway {
    fn provider(&self) -> PaymentMethod;

    fn build_payment_request(&self, order: &Order, ctx: &CheckoutContext) -> Result<PaymentRequest, GatewayError>;

    fn verify(&self, payload: &GatewayPayload) -> bool;

    fn parse_notification(&self, payload: &GatewayPayload) -> Result<NormalizedPaymentEvent, GatewayError>;
}

/// The set of configured gateways, dispatching on the payment method.
#[derive(Debug, Clone)]
pub struct PaymentGateways {
    payfast: PayFastGateway,
    ozow: OzowGateway,
    paygate: PayGateGateway,
}

impl PaymentGateways {
    pub fn new(payfast: PayFastConfig, ozow: OzowConfig, paygate: PayGateConfig) -> Self {
        Self {
            payfast: PayFastGateway::new(payfast),
            ozow: OzowGateway::new(ozow),
            paygate: PayGateGateway::new(paygate),
        }
    }

    pub fn gateway(&self, provider: PaymentMethod) -> Option<&dyn PaymentGateway> {
        match provider {
            PaymentMethod::PayFast => Some(&self.payfast),
            PaymentMethod::Ozow => Some(&self.ozow),
            PaymentMethod::PayGate => Some(&self.paygate),
            PaymentMethod::Eft => None,
        }
    }

    /// Ozow payment requests are posted server-side, with the API key as a header.
    pub fn ozow(&self) -> &OzowGateway {
        &self.ozow
    }

    /// `true` only if `provider` is a gateway and the payload carries a valid signature for it.
    pub fn verify(&self, provider: PaymentMethod, payload: &GatewayPayload) -> bool {
        self.gateway(provider).map(|g| g.verify(payload)).unwrap_or(false)
    }

    pub fn build_payment_request(&self, order: &Order, ctx: &CheckoutContext) -> Result<PaymentRequest, GatewayError> {
        let gateway =
            self.gateway(order.payment_method).ok_or(GatewayError::UnsupportedProvider(order.payment_method))?;
        gateway.build_payment_request(order, ctx)
    }

    /// Verifies the signature and, only if it is valid, normalizes the notification.
    pub fn verify_and_parse(
        &self,
        provider: PaymentMethod,
        payload: &GatewayPayload,
    ) -> Result<NormalizedPaymentEvent, GatewayError> {
        let gateway = self.gateway(provider).ok_or(GatewayError::UnsupportedProvider(provider))?;
        if !gateway.verify(payload) {
            return Err(GatewayError::InvalidSignature);
        }
        gateway.parse_notification(payload)
    }
}
