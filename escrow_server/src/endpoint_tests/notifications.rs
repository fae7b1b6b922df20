use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use escrow_engine::{
    db_types::{Notification, NotificationType},
    EscrowError,
    NotificationApi,
};
use serde_json::Value;

use super::{
    helpers::{get_request, put_request, BUYER},
    mocks::MockNotificationManager,
};
use crate::routes::{MarkNotificationReadRoute, MyNotificationsRoute};

fn configure(mock: MockNotificationManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(NotificationApi::new(mock)))
            .service(MyNotificationsRoute::<MockNotificationManager>::new())
            .service(MarkNotificationReadRoute::<MockNotificationManager>::new());
    }
}

fn payment_received() -> Notification {
    Notification {
        id: 12,
        user_id: BUYER.into(),
        title: "Payment Received".into(),
        message: "Your payment of R250.00 for School blazer is being held securely.".into(),
        notification_type: NotificationType::Payment,
        is_read: false,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap(),
    }
}

#[actix_web::test]
async fn fetch_my_unread_notifications() {
    let mut mock = MockNotificationManager::new();
    mock.expect_fetch_notifications_for_user()
        .withf(|user_id, unread_only| user_id == BUYER && *unread_only)
        .times(1)
        .returning(|_, _| Ok(vec![payment_received()]));
    let (status, body) =
        get_request(BUYER, "/notifications?unread=true", configure(mock)).await.expect("Failed to make request");
    assert_eq!(status, StatusCode::OK, "{body}");
    let notifications: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(notifications.as_array().map(Vec::len), Some(1));
    assert_eq!(notifications[0]["title"], "Payment Received");
    assert_eq!(notifications[0]["notification_type"], "payment");
    assert_eq!(notifications[0]["is_read"], false);
}

#[actix_web::test]
async fn all_notifications_by_default() {
    let mut mock = MockNotificationManager::new();
    mock.expect_fetch_notifications_for_user()
        .withf(|user_id, unread_only| user_id == BUYER && !*unread_only)
        .times(1)
        .returning(|_, _| Ok(vec![]));
    let (status, body) = get_request(BUYER, "/notifications", configure(mock)).await.expect("Failed to make request");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn notifications_need_a_caller() {
    let mut mock = MockNotificationManager::new();
    mock.expect_fetch_notifications_for_user().never();
    let (status, _) = get_request("", "/notifications", configure(mock)).await.expect("Failed to make request");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn mark_notification_read() {
    let mut mock = MockNotificationManager::new();
    mock.expect_mark_notification_read()
        .withf(|id, user_id| *id == 12 && user_id == BUYER)
        .times(1)
        .returning(|_, _| Ok(true));
    let (status, body) =
        put_request(BUYER, "/notifications/12/read", configure(mock)).await.expect("Failed to make request");
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("\"success\":true"));
}

#[actix_web::test]
async fn someone_elses_notification_is_not_found() {
    let mut mock = MockNotificationManager::new();
    mock.expect_mark_notification_read().times(1).returning(|_, _| Ok(false));
    let (status, _) =
        put_request("seller-7", "/notifications/12/read", configure(mock)).await.expect("Failed to make request");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn backend_failures_are_server_errors() {
    let mut mock = MockNotificationManager::new();
    mock.expect_fetch_notifications_for_user()
        .returning(|_, _| Err(EscrowError::DatabaseError("disk full".into())));
    let (status, _) = get_request(BUYER, "/notifications", configure(mock)).await.expect("Failed to make request");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
