use std::{str::FromStr, sync::Arc};

use actix_web::{
    body::to_bytes,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use escrow_common::Secret;
use escrow_engine::{
    db_types::{Cents, NewOrder, Order, OrderId, PaymentMethod},
    escrow_objects::EscrowPolicy,
    events::EventProducers,
    gateways::{NormalizedPaymentEvent, OzowConfig, PayFastConfig, PayGateConfig, PaymentGateways},
    traits::FundsGateway,
    DeliveryConfirmationApi,
    DisputeApi,
    EscrowLedgerApi,
    SqliteDatabase,
};
use log::debug;

use crate::{
    auth::USER_ID_HEADER,
    config::{CheckoutUrls, EftDetails, ServerOptions},
    integrations::{checkout::GatewayCheckout, funds::SimulatedFundsGateway},
    routes::{
        health,
        CheckoutRoute,
        EscrowStateRoute,
        OpenDisputeRoute,
        PayfastNotifyRoute,
        RegisterShipmentRoute,
        ReleaseEscrowRoute,
    },
};

pub const BUYER: &str = "buyer-3";
pub const SELLER: &str = "seller-7";
pub const PAYFAST_PASSPHRASE: &str = "jt7NOE43FZPn";

// Sandbox credentials from the PayFast developer docs. Never use these anywhere else.
pub fn payfast_config() -> PayFastConfig {
    PayFastConfig {
        merchant_id: "10000100".into(),
        merchant_key: Secret::new("46f0cd694581a".to_string()),
        passphrase: Some(Secret::new(PAYFAST_PASSPHRASE.to_string())),
        sandbox: true,
    }
}

pub fn test_gateways() -> PaymentGateways {
    PaymentGateways::new(payfast_config(), OzowConfig::default(), PayGateConfig::default())
}

pub fn test_ledger(db: &SqliteDatabase) -> EscrowLedgerApi<SqliteDatabase> {
    let funds: Arc<dyn FundsGateway> = Arc::new(SimulatedFundsGateway);
    test_ledger_with_funds(db, funds)
}

pub fn test_ledger_with_funds(db: &SqliteDatabase, funds: Arc<dyn FundsGateway>) -> EscrowLedgerApi<SqliteDatabase> {
    EscrowLedgerApi::new(db.clone(), EscrowPolicy::default(), EventProducers::default(), funds)
}

/// Registers the escrow routes, and everything they need, against a real database.
pub fn configure_escrow_app(ledger: EscrowLedgerApi<SqliteDatabase>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let db = ledger.db().clone();
        let policy = *ledger.policy();
        let urls = CheckoutUrls {
            frontend_url: "https://shop.example.com".into(),
            backend_url: "https://api.example.com".into(),
        };
        cfg.app_data(web::Data::new(DeliveryConfirmationApi::new(ledger.clone())))
            .app_data(web::Data::new(DisputeApi::new(db, policy, EventProducers::default())))
            .app_data(web::Data::new(ledger))
            .app_data(web::Data::new(test_gateways()))
            .app_data(web::Data::new(GatewayCheckout::new()))
            .app_data(web::Data::new(urls))
            .app_data(web::Data::new(EftDetails::default()))
            .app_data(web::Data::new(ServerOptions::default()))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(PayfastNotifyRoute::<SqliteDatabase>::new())
            .service(RegisterShipmentRoute::<SqliteDatabase>::new())
            .service(ReleaseEscrowRoute::<SqliteDatabase>::new())
            .service(EscrowStateRoute::<SqliteDatabase>::new())
            .service(OpenDisputeRoute::<SqliteDatabase>::new());
    }
}

pub fn new_order(order_id: &str, amount: &str, payment_method: PaymentMethod) -> NewOrder {
    NewOrder {
        order_id: OrderId::from(order_id),
        buyer_id: BUYER.into(),
        seller_id: SELLER.into(),
        item_id: "item-42".into(),
        item_name: "School blazer".into(),
        total_amount: Cents::from_str(amount).unwrap(),
        payment_method,
    }
}

/// Opens an escrow and marks it paid, the way a verified PayFast notification would.
pub async fn funded_order(ledger: &EscrowLedgerApi<SqliteDatabase>, order_id: &str, amount: &str) -> Order {
    let now = Utc::now();
    let (order, _) = ledger.open_escrow(new_order(order_id, amount, PaymentMethod::PayFast), now).await.unwrap();
    let event = NormalizedPaymentEvent::Completed {
        order_id: order.order_id.clone(),
        amount: order.total_amount,
        provider_ref: format!("pf-{order_id}"),
    };
    ledger.process_payment_event(PaymentMethod::PayFast, event, now).await.unwrap();
    ledger.fetch_order(&order.order_id).await.unwrap()
}

pub async fn get_request(
    caller: &str,
    path: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = with_caller(TestRequest::get().uri(path), caller);
    send(req, configure).await
}

pub async fn post_request(
    caller: &str,
    path: &str,
    body: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = TestRequest::post().uri(path).insert_header(ContentType::json()).set_payload(body.to_string());
    send(with_caller(req, caller), configure).await
}

pub async fn put_request(
    caller: &str,
    path: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = with_caller(TestRequest::put().uri(path), caller);
    send(req, configure).await
}

fn with_caller(req: TestRequest, caller: &str) -> TestRequest {
    if caller.is_empty() {
        req
    } else {
        req.insert_header((USER_ID_HEADER, caller))
    }
}

/// Runs the request against a fresh app. Errors raised by middleware are turned into their responses, so callers
/// only ever have to look at the status and body.
pub async fn send(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> Result<(StatusCode, String), String> {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("🚀️ Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = to_bytes(res.into_body()).await.map_err(|e| e.to_string())?;
            Ok((status, String::from_utf8_lossy(&body).into_owned()))
        },
        Err(e) => Ok((e.as_response_error().status_code(), e.to_string())),
    }
}
