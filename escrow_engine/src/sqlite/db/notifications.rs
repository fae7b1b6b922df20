use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{NewNotification, Notification};

/// The most recent notifications are all a user ever sees.
const MAX_NOTIFICATIONS: i64 = 50;

pub async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, sqlx::Error> {
    let notification = sqlx::query_as(
        r#"
            INSERT INTO notifications (user_id, title, message, notification_type)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.title)
    .bind(notification.message)
    .bind(notification.notification_type)
    .fetch_one(conn)
    .await?;
    Ok(notification)
}

pub async fn fetch_notifications_for_user(
    user_id: &str,
    unread_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM notifications WHERE user_id = ");
    builder.push_bind(user_id);
    if unread_only {
        builder.push(" AND is_read = 0");
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(MAX_NOTIFICATIONS);
    let notifications = builder.build_query_as::<Notification>().fetch_all(conn).await?;
    Ok(notifications)
}

pub async fn mark_read(id: i64, user_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
