use escrow_engine::{
    db_types::{NewNotification, Notification},
    traits::{
        EscrowError,
        FundsError,
        FundsGateway,
        FundsReceipt,
        NotificationManagement,
        PayoutRequest,
        RefundRequest,
    },
};
use futures::future::BoxFuture;
use mockall::mock;

mock! {
    pub Funds {}
    impl FundsGateway for Funds {
        fn refund(&self, request: RefundRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>>;
        fn payout(&self, request: PayoutRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>>;
    }
}

mock! {
    pub NotificationManager {}
    impl NotificationManagement for NotificationManager {
        async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, EscrowError>;
        async fn fetch_notifications_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>, EscrowError>;
        async fn mark_notification_read(&self, id: i64, user_id: &str) -> Result<bool, EscrowError>;
    }
}
