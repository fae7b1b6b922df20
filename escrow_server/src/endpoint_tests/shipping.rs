use actix_web::{
    http::{header::ContentType, StatusCode},
    test::TestRequest,
    web,
    web::ServiceConfig,
};
use chrono::Utc;
use escrow_common::Secret;
use escrow_engine::{
    db_types::{EscrowStatus, OrderId, OrderStatusType, ShippingProvider},
    test_utils::prepare_env::{prepare_test_env, random_db_path, tear_down},
    DeliveryConfirmationApi,
    EscrowLedgerApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::helpers::{configure_escrow_app, funded_order, post_request, send, test_ledger, BUYER, SELLER};
use crate::{helpers::calculate_hmac, middleware::HmacMiddlewareFactory, routes::ShippingWebhookRoute};

const HMAC_HEADER: &str = "X-Shipping-Hmac-Sha256";
const SECRET: &str = "courier-shared-secret";

fn configure_shipping(
    ledger: EscrowLedgerApi<SqliteDatabase>,
    secret: &str,
    checks: bool,
) -> impl FnOnce(&mut ServiceConfig) {
    let secret = Secret::new(secret.to_string());
    move |cfg| {
        let scope = web::scope("/shipping")
            .wrap(HmacMiddlewareFactory::new(HMAC_HEADER, secret, checks))
            .service(ShippingWebhookRoute::<SqliteDatabase>::new());
        cfg.app_data(web::Data::new(DeliveryConfirmationApi::new(ledger))).service(scope);
    }
}

fn update(tracking_number: &str, status: &str, provider: &str) -> String {
    json!({ "trackingNumber": tracking_number, "status": status, "provider": provider }).to_string()
}

fn webhook(body: &str, signature: Option<&str>) -> TestRequest {
    let req = TestRequest::post()
        .uri("/shipping/webhook")
        .insert_header(ContentType::json())
        .set_payload(body.to_string());
    match signature {
        Some(sig) => req.insert_header((HMAC_HEADER, sig)),
        None => req,
    }
}

async fn ship(ledger: &EscrowLedgerApi<SqliteDatabase>, order_id: &str, provider: ShippingProvider, tracking: &str) {
    let api = DeliveryConfirmationApi::new(ledger.clone());
    api.register_shipment(&OrderId::from(order_id), SELLER, provider, tracking, Utc::now()).await.unwrap();
}

#[actix_web::test]
async fn unsigned_webhooks_are_refused() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let body = update("TCG-0001", "delivered", "courierguy");

    let (status, _) = send(webhook(&body, None), configure_shipping(ledger.clone(), SECRET, true)).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = calculate_hmac("not-the-secret", body.as_bytes());
    let (status, _) =
        send(webhook(&body, Some(&wrong)), configure_shipping(ledger.clone(), SECRET, true)).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Without a configured secret nothing can be authenticated
    let sig = calculate_hmac("", body.as_bytes());
    let (status, _) = send(webhook(&body, Some(&sig)), configure_shipping(ledger.clone(), "", true)).await.unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    tear_down(db).await;
}

#[actix_web::test]
async fn updates_for_unknown_parcels_are_acknowledged() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let body = update("TCG-9999", "delivered", "courierguy");
    let sig = calculate_hmac(SECRET, body.as_bytes());
    let (status, response) =
        send(webhook(&body, Some(&sig)), configure_shipping(ledger.clone(), SECRET, true)).await.unwrap();
    assert_eq!(status, StatusCode::OK, "{response}");
    let outcome: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(outcome["result"], "not_found");

    // With checks switched off the signature is not needed at all
    let (status, _) = send(webhook(&body, None), configure_shipping(ledger, "", false)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    tear_down(db).await;
}

#[actix_web::test]
async fn courier_delivery_releases_the_escrow() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    funded_order(&ledger, "SHIP-1", "250.00").await;
    ship(&ledger, "SHIP-1", ShippingProvider::CourierGuy, "TCG-0001").await;

    let body = update("TCG-0001", "delivered", "courierguy");
    let sig = calculate_hmac(SECRET, body.as_bytes());
    let (status, response) =
        send(webhook(&body, Some(&sig)), configure_shipping(ledger.clone(), SECRET, true)).await.unwrap();
    assert_eq!(status, StatusCode::OK, "{response}");
    let outcome: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(outcome["result"], "released");
    let order_id = OrderId::from("SHIP-1");
    assert_eq!(ledger.fetch_escrow(&order_id).await.unwrap().status, EscrowStatus::Released);

    // The courier sends the same update again
    let (status, response) =
        send(webhook(&body, Some(&sig)), configure_shipping(ledger.clone(), SECRET, true)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let outcome: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(outcome["result"], "not_found");
    tear_down(db).await;
}

#[actix_web::test]
async fn locker_parcels_release_on_collection() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    funded_order(&ledger, "SHIP-2", "99.99").await;
    ship(&ledger, "SHIP-2", ShippingProvider::Pudo, "PUDO-77").await;
    let order_id = OrderId::from("SHIP-2");

    let body = update("PUDO-77", "delivered", "pudo");
    let sig = calculate_hmac(SECRET, body.as_bytes());
    let (status, _) =
        send(webhook(&body, Some(&sig)), configure_shipping(ledger.clone(), SECRET, true)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.fetch_order(&order_id).await.unwrap().status, OrderStatusType::Delivered);
    assert_eq!(ledger.fetch_escrow(&order_id).await.unwrap().status, EscrowStatus::Funded);

    let body = update("PUDO-77", "collected", "pudo");
    let sig = calculate_hmac(SECRET, body.as_bytes());
    let (status, _) =
        send(webhook(&body, Some(&sig)), configure_shipping(ledger.clone(), SECRET, true)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.fetch_escrow(&order_id).await.unwrap().status, EscrowStatus::Released);
    tear_down(db).await;
}

#[actix_web::test]
async fn only_the_seller_registers_a_shipment() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    funded_order(&ledger, "SHIP-3", "250.00").await;
    let body = json!({ "provider": "pudo", "trackingNumber": "PUDO-12" }).to_string();

    let (status, _) = post_request(BUYER, "/orders/SHIP-3/shipment", &body, configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, response) =
        post_request(SELLER, "/orders/SHIP-3/shipment", &body, configure_escrow_app(ledger.clone()))
            .await
            .expect("Failed to make request");
    assert_eq!(status, StatusCode::OK, "{response}");
    let order = ledger.fetch_order(&OrderId::from("SHIP-3")).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Shipped);
    assert_eq!(order.tracking_reference.as_deref(), Some("PUDO-12"));
    tear_down(db).await;
}
