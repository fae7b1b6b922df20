use std::sync::Arc;

use actix_web::http::StatusCode;
use escrow_engine::{
    db_types::{EscrowStatus, OrderId, OrderStatusType, PaymentMethod},
    test_utils::prepare_env::{prepare_test_env, random_db_path, tear_down},
    traits::{FundsError, FundsReceipt},
};
use serde_json::{json, Value};

use super::{
    helpers::{
        configure_escrow_app,
        funded_order,
        get_request,
        new_order,
        post_request,
        test_ledger,
        test_ledger_with_funds,
        BUYER,
        SELLER,
    },
    mocks::MockFunds,
};

#[actix_web::test]
async fn the_buyer_releases_the_escrow() {
    let db = prepare_test_env(&random_db_path()).await;
    let mut funds = MockFunds::new();
    funds.expect_refund().never();
    funds.expect_payout().times(1).returning(|req| {
        assert_eq!(req.seller_id, SELLER);
        Box::pin(async move { Ok(FundsReceipt { reference: format!("po-{}", req.idempotency_key) }) })
    });
    let ledger = test_ledger_with_funds(&db, Arc::new(funds));
    funded_order(&ledger, "ESC-1", "250.00").await;

    let (status, body) = post_request(BUYER, "/escrow/release/ESC-1", "", configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::OK, "{body}");
    let view: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(view["status"], "released");
    assert!(!view["released_at"].is_null());
    assert!(!view["paid_out_at"].is_null());
    let order_id = OrderId::from("ESC-1");
    assert_eq!(ledger.fetch_order(&order_id).await.unwrap().status, OrderStatusType::Completed);

    // Only a funded escrow can be released
    let (status, _) = post_request(BUYER, "/escrow/release/ESC-1", "", configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(ledger.fetch_escrow(&order_id).await.unwrap().status, EscrowStatus::Released);
    tear_down(db).await;
}

#[actix_web::test]
async fn the_release_stands_when_the_payout_fails() {
    let db = prepare_test_env(&random_db_path()).await;
    let mut funds = MockFunds::new();
    funds.expect_refund().never();
    funds
        .expect_payout()
        .times(1)
        .returning(|_| Box::pin(async { Err(FundsError::Unavailable("bank is offline".into())) }));
    let ledger = test_ledger_with_funds(&db, Arc::new(funds));
    funded_order(&ledger, "ESC-6", "250.00").await;

    let (status, body) = post_request(BUYER, "/escrow/release/ESC-6", "", configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::OK, "{body}");
    let view: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(view["status"], "released");
    assert!(view["paid_out_at"].is_null());
    let escrow = ledger.fetch_escrow(&OrderId::from("ESC-6")).await.unwrap();
    assert!(escrow.awaits_payout());
    tear_down(db).await;
}

#[actix_web::test]
async fn only_the_buyer_can_release() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    funded_order(&ledger, "ESC-2", "120.00").await;
    let (status, _) = post_request(SELLER, "/escrow/release/ESC-2", "", configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = post_request("", "/escrow/release/ESC-2", "", configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ledger.fetch_escrow(&OrderId::from("ESC-2")).await.unwrap().status, EscrowStatus::Funded);
    tear_down(db).await;
}

#[actix_web::test]
async fn releasing_unknown_or_unpaid_escrows() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    let (status, _) = post_request(BUYER, "/escrow/release/NOPE", "", configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::NOT_FOUND);

    ledger.open_escrow(new_order("ESC-3", "80.00", PaymentMethod::Ozow), chrono::Utc::now()).await.unwrap();
    let (status, _) = post_request(BUYER, "/escrow/release/ESC-3", "", configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(ledger.fetch_escrow(&OrderId::from("ESC-3")).await.unwrap().status, EscrowStatus::Pending);
    tear_down(db).await;
}

#[actix_web::test]
async fn only_the_parties_can_see_the_escrow() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    funded_order(&ledger, "ESC-4", "250.00").await;
    for caller in [BUYER, SELLER] {
        let (status, body) = get_request(caller, "/escrow/ESC-4", configure_escrow_app(ledger.clone()))
            .await
            .expect("Failed to make request");
        assert_eq!(status, StatusCode::OK);
        let view: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(view["order_id"], "ESC-4");
        assert_eq!(view["status"], "funded");
    }
    let (status, _) = get_request("nosy-parker", "/escrow/ESC-4", configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::NOT_FOUND);
    tear_down(db).await;
}

#[actix_web::test]
async fn a_dispute_marks_the_escrow_disputed() {
    let db = prepare_test_env(&random_db_path()).await;
    let ledger = test_ledger(&db);
    funded_order(&ledger, "ESC-5", "250.00").await;
    let before = ledger.fetch_escrow(&OrderId::from("ESC-5")).await.unwrap();
    let body = json!({
        "orderId": "ESC-5",
        "disputeType": "item_not_received",
        "description": "The tracking says delivered but the locker was empty",
    })
    .to_string();

    let (status, _) = post_request(SELLER, "/disputes", &body, configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, response) = post_request(BUYER, "/disputes", &body, configure_escrow_app(ledger.clone()))
        .await
        .expect("Failed to make request");
    assert_eq!(status, StatusCode::CREATED, "{response}");
    let response: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(response["dispute"]["dispute_type"], "item_not_received");
    assert_eq!(response["escrow"]["status"], "disputed");

    let after = ledger.fetch_escrow(&OrderId::from("ESC-5")).await.unwrap();
    assert_eq!(after.status, EscrowStatus::Funded);
    assert!(after.disputed_at.is_some());
    assert!(after.expected_delivery_date > before.expected_delivery_date);
    tear_down(db).await;
}
