use actix_web::http::StatusCode;
use escrow_engine::{
    db_types::{EscrowStatus, OrderId},
    test_utils::prepare_env::{prepare_test_env, random_db_path, tear_down},
};
use serde_json::{json, Value};

use super::helpers::{configure_escrow_app, get_request, post_request, test_ledger, BUYER, SELLER};

fn eft_checkout(order_id: &str) -> String {
    json!({
        "orderId": order_id,
        "sellerId": SELLER,
        "itemId": "item-42",
        "itemName": "Grade 8 maths textbook",
        "amount": "250.00",
        "paymentMethod": "eft",
    })
    .to_string()
}

#[actix_web::test]
async fn health_check() {
    let (status, body) = get_request("", "/health", |cfg| {
        cfg.service(crate::routes::health);
    })
    .await
    .expect("Failed to make request");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn eft_checkout_opens_a_pending_escrow() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let (status, body) = post_request(BUYER, "/checkout", &eft_checkout("EFT-1"), configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["orderId"], "EFT-1");
    assert_eq!(response["payment"]["type"], "eft");
    assert_eq!(response["payment"]["reference"], "EFT-1");
    assert_eq!(response["escrow"]["status"], "pending");

    let escrow = ledger.fetch_escrow(&OrderId::from("EFT-1")).await.unwrap();
    assert_eq!(escrow.status, EscrowStatus::Pending);
    assert_eq!(escrow.buyer_id, BUYER);
    assert_eq!(escrow.platform_fee.value(), 2500);
    assert_eq!(escrow.seller_amount.value(), 22500);
    tear_down(db).await;
}

#[actix_web::test]
async fn checking_out_the_same_order_twice_is_a_conflict() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let (status, _) = post_request(BUYER, "/checkout", &eft_checkout("EFT-2"), configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post_request(BUYER, "/checkout", &eft_checkout("EFT-2"), configure_escrow_app(ledger))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::CONFLICT);
    tear_down(db).await;
}

#[actix_web::test]
async fn checkout_needs_a_caller() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let (status, _) = post_request("", "/checkout", &eft_checkout("EFT-3"), configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(ledger.fetch_escrow(&OrderId::from("EFT-3")).await.is_err());
    tear_down(db).await;
}

#[actix_web::test]
async fn checkout_rejects_bad_amounts() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let body = json!({ "orderId": "EFT-4", "sellerId": SELLER, "amount": "twelve", "paymentMethod": "eft" });
    let (status, body) = post_request(BUYER, "/checkout", &body.to_string(), configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("twelve"), "{body}");

    let body = json!({ "orderId": "EFT-5", "sellerId": SELLER, "amount": "0.00", "paymentMethod": "eft" });
    let (status, _) = post_request(BUYER, "/checkout", &body.to_string(), configure_escrow_app(ledger))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(db).await;
}

#[actix_web::test]
async fn the_largest_amounts_split_without_overflowing() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let body = json!({
        "orderId": "EFT-6",
        "sellerId": SELLER,
        "amount": "92233720368547758.07",
        "paymentMethod": "eft",
    });
    let (status, body) = post_request(BUYER, "/checkout", &body.to_string(), configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let escrow = ledger.fetch_escrow(&OrderId::from("EFT-6")).await.unwrap();
    assert_eq!(escrow.total_amount.value(), i64::MAX);
    assert_eq!(escrow.platform_fee.value(), 922_337_203_685_477_581);
    assert_eq!(escrow.platform_fee.value() + escrow.seller_amount.value(), i64::MAX);

    let body = json!({
        "orderId": "EFT-7",
        "sellerId": SELLER,
        "amount": "92233720368547758.08",
        "paymentMethod": "eft",
    });
    let (status, _) = post_request(BUYER, "/checkout", &body.to_string(), configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(ledger.fetch_escrow(&OrderId::from("EFT-7")).await.is_err());
    tear_down(db).await;
}
