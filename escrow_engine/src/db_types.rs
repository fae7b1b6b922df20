use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
pub use escrow_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// Order statuses only ever move forward through this list, except for `Cancelled`, which is reached on refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been created at checkout, and is waiting for the gateway to confirm payment.
    PendingPayment,
    /// Payment has been confirmed and the funds are held in escrow.
    Paid,
    /// The seller has handed the parcel to the courier or locker network.
    Shipped,
    /// The parcel has arrived. For locker deliveries this means it is waiting to be collected.
    Delivered,
    /// The buyer has the goods and the seller has been paid out.
    Completed,
    /// The order was refunded.
    Cancelled,
}

impl OrderStatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether `next` is a legal forward move from this status, for the shipping progress updates.
    pub fn can_advance_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        match (self, next) {
            (Completed | Cancelled, _) => false,
            (_, Cancelled | Completed) => false,
            (from, to) => to > *from,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    PayFast,
    Ozow,
    PayGate,
    /// Manual bank transfer. There is no gateway notification for EFT payments.
    Eft,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PayFast => write!(f, "payfast"),
            Self::Ozow => write!(f, "ozow"),
            Self::PayGate => write!(f, "paygate"),
            Self::Eft => write!(f, "eft"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "payfast" => Ok(Self::PayFast),
            "ozow" => Ok(Self::Ozow),
            "paygate" => Ok(Self::PayGate),
            "eft" => Ok(Self::Eft),
            s => Err(ConversionError(format!("Unsupported payment method: {s}"))),
        }
    }
}

//--------------------------------------   ShippingProvider    ---------------------------------------------------------
/// How the buyer takes possession of the parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfilmentChannel {
    /// The parcel is dropped at a locker, and the buyer collects it.
    Locker,
    /// The parcel is delivered to the buyer's door.
    Courier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShippingProvider {
    Pudo,
    #[serde(alias = "courier_guy", alias = "the_courier_guy")]
    CourierGuy,
}

impl ShippingProvider {
    pub fn channel(&self) -> FulfilmentChannel {
        match self {
            Self::Pudo => FulfilmentChannel::Locker,
            Self::CourierGuy => FulfilmentChannel::Courier,
        }
    }
}

impl Display for ShippingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pudo => write!(f, "pudo"),
            Self::CourierGuy => write!(f, "courierguy"),
        }
    }
}

impl FromStr for ShippingProvider {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pudo" => Ok(Self::Pudo),
            "courierguy" | "courier_guy" | "the_courier_guy" => Ok(Self::CourierGuy),
            s => Err(ConversionError(format!("Unknown shipping provider: {s}"))),
        }
    }
}

//--------------------------------------    ShipmentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Shipped,
    InTransit,
    Collected,
    Delivered,
    Failed,
}

impl Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shipped => write!(f, "shipped"),
            Self::InTransit => write!(f, "in_transit"),
            Self::Collected => write!(f, "collected"),
            Self::Delivered => write!(f, "delivered"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub item_id: String,
    pub item_name: String,
    pub total_amount: Cents,
    pub platform_fee: Cents,
    pub seller_amount: Cents,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub shipping_provider: Option<ShippingProvider>,
    pub tracking_reference: Option<String>,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The data captured at checkout. Fee and seller amount are derived by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub item_id: String,
    pub item_name: String,
    pub total_amount: Cents,
    pub payment_method: PaymentMethod,
}

impl NewOrder {
    pub fn new(order_id: OrderId, buyer_id: String, seller_id: String, total_amount: Cents) -> Self {
        Self {
            order_id,
            buyer_id,
            seller_id,
            item_id: String::default(),
            item_name: String::default(),
            total_amount,
            payment_method: PaymentMethod::PayFast,
        }
    }

    pub fn with_item<S: Into<String>>(mut self, item_id: S, item_name: S) -> Self {
        self.item_id = item_id.into();
        self.item_name = item_name.into();
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }
}

//--------------------------------------     EscrowStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    /// Escrow opened at checkout. No money has been received yet.
    Pending,
    /// The gateway confirmed payment. Funds are held.
    Funded,
    /// Funds were paid out to the seller.
    Released,
    /// Funds were returned to the buyer.
    Refunded,
    /// A funded escrow with an open dispute. This is never stored; see [`EscrowTransaction::effective_status`].
    Disputed,
}

impl Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Funded => write!(f, "funded"),
            Self::Released => write!(f, "released"),
            Self::Refunded => write!(f, "refunded"),
            Self::Disputed => write!(f, "disputed"),
        }
    }
}

//--------------------------------------   EscrowTransaction   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub total_amount: Cents,
    pub platform_fee: Cents,
    pub seller_amount: Cents,
    pub payment_reference: Option<String>,
    pub status: EscrowStatus,
    pub expected_delivery_date: NaiveDate,
    pub auto_refund_date: Option<NaiveDate>,
    pub disputed_at: Option<DateTime<Utc>>,
    pub funded_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// The funds service's reference for the seller payout. Set once the payout has been confirmed.
    pub payout_reference: Option<String>,
    pub paid_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscrowTransaction {
    /// True for a released escrow whose seller payout has not been confirmed yet.
    pub fn awaits_payout(&self) -> bool {
        self.status == EscrowStatus::Released && self.paid_out_at.is_none()
    }

    pub fn is_disputed(&self) -> bool {
        self.disputed_at.is_some()
    }

    /// The status as reported to users: a funded escrow under dispute reports `Disputed`.
    pub fn effective_status(&self) -> EscrowStatus {
        match (self.status, self.is_disputed()) {
            (EscrowStatus::Funded, true) => EscrowStatus::Disputed,
            (status, _) => status,
        }
    }

    /// The key handed to the funds service so that repeated refund or payout attempts are not applied twice.
    /// Unfunded escrows have no payment reference, so the order id is used instead.
    pub fn idempotency_key(&self) -> String {
        self.payment_reference.clone().unwrap_or_else(|| self.order_id.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEscrow {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub total_amount: Cents,
    pub platform_fee: Cents,
    pub seller_amount: Cents,
    pub expected_delivery_date: NaiveDate,
}

//--------------------------------------        Dispute        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Dispute {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub dispute_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDispute {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,
    pub dispute_type: String,
    pub description: String,
}

//--------------------------------------     Notification      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderUpdate,
    Payment,
    Dispute,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
}

impl NewNotification {
    pub fn new<S: Into<String>>(user_id: S, title: S, message: String, notification_type: NotificationType) -> Self {
        Self { user_id: user_id.into(), title: title.into(), message, notification_type }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_status_only_moves_forward() {
        use OrderStatusType::*;
        assert!(Paid.can_advance_to(Shipped));
        assert!(Paid.can_advance_to(Delivered));
        assert!(Shipped.can_advance_to(Delivered));
        assert!(!Delivered.can_advance_to(Shipped));
        assert!(!Shipped.can_advance_to(Shipped));
        assert!(!Completed.can_advance_to(Delivered));
        assert!(!Cancelled.can_advance_to(Shipped));
        assert!(!Paid.can_advance_to(Cancelled));
    }

    #[test]
    fn parse_enums() {
        assert_eq!("pending_payment".parse::<OrderStatusType>().unwrap(), OrderStatusType::PendingPayment);
        assert_eq!("PayFast".parse::<PaymentMethod>().unwrap(), PaymentMethod::PayFast);
        assert_eq!("courierguy".parse::<ShippingProvider>().unwrap(), ShippingProvider::CourierGuy);
        assert_eq!(ShippingProvider::Pudo.channel(), FulfilmentChannel::Locker);
        assert!("dhl".parse::<ShippingProvider>().is_err());
        assert!("  ".parse::<OrderId>().is_err());
    }

    #[test]
    fn shipment_status_wire_format() {
        let status: ShipmentStatus = serde_json::from_str("\"in_transit\"").unwrap();
        assert_eq!(status, ShipmentStatus::InTransit);
        assert_eq!(serde_json::to_string(&ShipmentStatus::Collected).unwrap(), "\"collected\"");
        let provider: ShippingProvider = serde_json::from_str("\"courierguy\"").unwrap();
        assert_eq!(provider, ShippingProvider::CourierGuy);
    }
}
