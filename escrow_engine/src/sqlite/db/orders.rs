use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{Cents, NewOrder, Order, OrderId, OrderStatusType, ShippingProvider};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(
    order: NewOrder,
    platform_fee: Cents,
    seller_amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                seller_id,
                item_id,
                item_name,
                total_amount,
                platform_fee,
                seller_amount,
                payment_method,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending_payment')
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.buyer_id)
    .bind(order.seller_id)
    .bind(order.item_id)
    .bind(order.item_name)
    .bind(order.total_amount)
    .bind(platform_fee)
    .bind(seller_amount)
    .bind(order.payment_method)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} inserted with id {}", order.order_id, order.id);
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Returns the most recent order carrying the given tracking reference.
pub async fn fetch_order_by_tracking_reference(
    tracking: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE tracking_reference = $1 ORDER BY id DESC LIMIT 1")
        .bind(tracking)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Sets the status of the order unconditionally. Callers are responsible for having checked that the move is legal,
/// usually by having won a conditional update on the escrow in the same transaction.
pub async fn update_order_status(
    order_id: &OrderId,
    status: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE order_id = $3 RETURNING *")
        .bind(status)
        .bind(now)
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    trace!("🗃️ Order {order_id} status set to {status}");
    Ok(order)
}

/// Sets the status of the order only if it is currently `from`.
pub async fn swap_order_status(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE order_id = $3 AND status = $4 RETURNING *",
    )
    .bind(to)
    .bind(now)
    .bind(order_id.as_str())
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn mark_order_paid(
    order_id: &OrderId,
    payment_reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'paid', payment_reference = $1, updated_at = $2
        WHERE order_id = $3 AND status = 'pending_payment'
        RETURNING *
        "#,
    )
    .bind(payment_reference)
    .bind(now)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn set_shipment(
    order_id: &OrderId,
    provider: ShippingProvider,
    tracking_reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            shipping_provider = $1,
            tracking_reference = $2,
            status = CASE WHEN status = 'paid' THEN 'shipped' ELSE status END,
            updated_at = $3
        WHERE order_id = $4 AND status IN ('paid', 'shipped', 'delivered')
        RETURNING *
        "#,
    )
    .bind(provider)
    .bind(tracking_reference)
    .bind(now)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
