use actix_web::{
    http::{header::ContentType, StatusCode},
    test::TestRequest,
};
use escrow_engine::{
    db_types::{EscrowStatus, OrderId, OrderStatusType, PaymentMethod},
    gateways::{signature::payfast_signature, GatewayPayload},
    test_utils::prepare_env::{prepare_test_env, random_db_path, tear_down},
    EscrowLedgerApi,
    SqliteDatabase,
};

use super::helpers::{configure_escrow_app, new_order, send, test_ledger, PAYFAST_PASSPHRASE};

// The fields this test ITN carries, in the order PayFast signs them.
const ITN_FIELDS: [&str; 5] = ["m_payment_id", "pf_payment_id", "payment_status", "amount_gross", "merchant_id"];

fn itn(order_id: &str, amount: &str, status: &str) -> GatewayPayload {
    let mut payload = GatewayPayload::new();
    payload
        .insert("m_payment_id", order_id)
        .insert("pf_payment_id", "1089250")
        .insert("payment_status", status)
        .insert("amount_gross", amount)
        .insert("merchant_id", "10000100");
    payload
}

fn signed_form(payload: &GatewayPayload) -> String {
    let signature = payfast_signature(payload, &ITN_FIELDS, Some(PAYFAST_PASSPHRASE));
    form_body(payload, &signature)
}

fn form_body(payload: &GatewayPayload, signature: &str) -> String {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in payload.iter() {
        form.append_pair(key, value);
    }
    form.append_pair("signature", signature);
    form.finish()
}

async fn notify(ledger: &EscrowLedgerApi<SqliteDatabase>, form: String) -> (StatusCode, String) {
    let req = TestRequest::post()
        .uri("/payfast/notify")
        .insert_header(ContentType::form_url_encoded())
        .set_payload(form);
    send(req, configure_escrow_app(ledger.clone())).await.expect("Failed to make request")
}

#[actix_web::test]
async fn a_signed_payment_funds_the_escrow() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    ledger.open_escrow(new_order("PF-1", "250.00", PaymentMethod::PayFast), chrono::Utc::now()).await.unwrap();

    let (status, body) = notify(&ledger, signed_form(&itn("PF-1", "250.00", "COMPLETE"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, "OK");
    let order_id = OrderId::from("PF-1");
    let escrow = ledger.fetch_escrow(&order_id).await.unwrap();
    assert_eq!(escrow.status, EscrowStatus::Funded);
    assert_eq!(escrow.payment_reference.as_deref(), Some("1089250"));
    assert!(escrow.funded_at.is_some());
    assert_eq!(ledger.fetch_order(&order_id).await.unwrap().status, OrderStatusType::Paid);

    // PayFast retries until it sees a 200, so a repeat must be harmless
    let (status, _) = notify(&ledger, signed_form(&itn("PF-1", "250.00", "COMPLETE"))).await;
    assert_eq!(status, StatusCode::OK);
    let again = ledger.fetch_escrow(&order_id).await.unwrap();
    assert_eq!(again.status, EscrowStatus::Funded);
    assert_eq!(again.funded_at, escrow.funded_at);
    tear_down(db).await;
}

#[actix_web::test]
async fn a_tampered_notification_is_rejected() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    ledger.open_escrow(new_order("PF-2", "250.00", PaymentMethod::PayFast), chrono::Utc::now()).await.unwrap();

    let signature = payfast_signature(&itn("PF-2", "250.00", "COMPLETE"), &ITN_FIELDS, Some(PAYFAST_PASSPHRASE));
    let tampered = form_body(&itn("PF-2", "2.50", "COMPLETE"), &signature);
    let (status, _) = notify(&ledger, tampered).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = notify(&ledger, form_body(&itn("PF-2", "250.00", "COMPLETE"), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let escrow = ledger.fetch_escrow(&OrderId::from("PF-2")).await.unwrap();
    assert_eq!(escrow.status, EscrowStatus::Pending);
    tear_down(db).await;
}

#[actix_web::test]
async fn payment_for_an_unknown_order() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let (status, _) = notify(&ledger, signed_form(&itn("NOPE", "250.00", "COMPLETE"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    tear_down(db).await;
}

#[actix_web::test]
async fn underpayment_leaves_the_escrow_pending() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    ledger.open_escrow(new_order("PF-3", "250.00", PaymentMethod::PayFast), chrono::Utc::now()).await.unwrap();
    let (status, body) = notify(&ledger, signed_form(&itn("PF-3", "100.00", "COMPLETE"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    let escrow = ledger.fetch_escrow(&OrderId::from("PF-3")).await.unwrap();
    assert_eq!(escrow.status, EscrowStatus::Pending);
    tear_down(db).await;
}

#[actix_web::test]
async fn a_cancelled_payment_is_acknowledged() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    ledger.open_escrow(new_order("PF-4", "250.00", PaymentMethod::PayFast), chrono::Utc::now()).await.unwrap();
    let (status, _) = notify(&ledger, signed_form(&itn("PF-4", "250.00", "CANCELLED"))).await;
    assert_eq!(status, StatusCode::OK);
    let escrow = ledger.fetch_escrow(&OrderId::from("PF-4")).await.unwrap();
    assert_eq!(escrow.status, EscrowStatus::Pending);
    tear_down(db).await;
}

#[actix_web::test]
async fn a_notification_from_the_wrong_gateway_is_rejected() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    ledger.open_escrow(new_order("OZ-1", "250.00", PaymentMethod::Ozow), chrono::Utc::now()).await.unwrap();
    ledger.open_escrow(new_order("EFT-1", "250.00", PaymentMethod::Eft), chrono::Utc::now()).await.unwrap();

    for order in ["OZ-1", "EFT-1"] {
        let (status, body) = notify(&ledger, signed_form(&itn(order, "250.00", "COMPLETE"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        let escrow = ledger.fetch_escrow(&OrderId::from(order)).await.unwrap();
        assert_eq!(escrow.status, EscrowStatus::Pending);
        assert_eq!(escrow.payment_reference, None);
    }
    tear_down(db).await;
}
