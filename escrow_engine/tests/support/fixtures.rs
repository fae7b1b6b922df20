use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use escrow_engine::{
    db_types::{Cents, NewOrder, OrderId, PaymentMethod},
    escrow_objects::EscrowPolicy,
    events::EventProducers,
    gateways::NormalizedPaymentEvent,
    traits::FundsGateway,
    EscrowLedgerApi,
    SqliteDatabase,
};

pub const BUYER: &str = "buyer-3";
pub const SELLER: &str = "seller-7";

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn ledger<F: FundsGateway + 'static>(db: &SqliteDatabase, funds: Arc<F>) -> EscrowLedgerApi<SqliteDatabase> {
    EscrowLedgerApi::new(db.clone(), EscrowPolicy::default(), EventProducers::default(), funds)
}

/// A R250 school blazer order.
pub fn blazer_order(order_id: &str) -> NewOrder {
    NewOrder::new(OrderId::from(order_id), BUYER.into(), SELLER.into(), Cents::from_rand(250))
        .with_item("item-42", "School blazer")
        .with_payment_method(PaymentMethod::PayFast)
}

pub fn payment_complete(order_id: &str, rand: i64) -> NormalizedPaymentEvent {
    NormalizedPaymentEvent::Completed {
        order_id: OrderId::from(order_id),
        amount: Cents::from_rand(rand),
        provider_ref: format!("pf-{order_id}"),
    }
}
