use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewNotification, Notification},
    traits::{EscrowError, NotificationManagement},
};

/// Sends and reads user notifications.
///
/// Sending is best-effort: a failure to store a notification is logged and never reported to the caller, because by
/// the time a notification is sent the transition it describes has already been committed.
#[derive(Clone)]
pub struct NotificationApi<B> {
    db: B,
}

impl<B> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi")
    }
}

impl<B> NotificationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> NotificationApi<B>
where B: NotificationManagement
{
    /// Stores each notification, logging (and otherwise ignoring) failures. Returns the number stored.
    pub async fn notify_all<I: IntoIterator<Item = NewNotification>>(&self, notifications: I) -> usize {
        let mut sent = 0;
        for notification in notifications {
            let user_id = notification.user_id.clone();
            match self.db.insert_notification(notification).await {
                Ok(n) => {
                    trace!("🔄️🔔️ Notification #{} '{}' sent to {user_id}", n.id, n.title);
                    sent += 1;
                },
                Err(e) => warn!("🔄️🔔️ Could not send a notification to {user_id}. {e}"),
            }
        }
        sent
    }

    pub async fn notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, EscrowError> {
        self.db.fetch_notifications_for_user(user_id, unread_only).await
    }

    pub async fn mark_read(&self, id: i64, user_id: &str) -> Result<(), EscrowError> {
        if self.db.mark_notification_read(id, user_id).await? {
            Ok(())
        } else {
            Err(EscrowError::NotificationNotFound(id))
        }
    }
}
