use crate::{
    db_types::{NewNotification, Notification},
    traits::EscrowError,
};

#[allow(async_fn_in_trait)]
pub trait NotificationManagement {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, EscrowError>;

    /// Notifications for the user, newest first.
    async fn fetch_notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, EscrowError>;

    /// Marks the notification as read. Returns `false` if the notification does not exist or belongs to someone else.
    async fn mark_notification_read(&self, id: i64, user_id: &str) -> Result<bool, EscrowError>;
}
