use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Dispute, NewDispute, OrderId};

pub async fn insert_dispute(dispute: NewDispute, conn: &mut SqliteConnection) -> Result<Dispute, sqlx::Error> {
    let dispute: Dispute = sqlx::query_as(
        r#"
            INSERT INTO disputes (order_id, buyer_id, seller_id, dispute_type, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(dispute.order_id)
    .bind(dispute.buyer_id)
    .bind(dispute.seller_id)
    .bind(dispute.dispute_type)
    .bind(dispute.description)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Dispute #{} opened for order {}", dispute.id, dispute.order_id);
    Ok(dispute)
}

pub async fn fetch_disputes_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Dispute>, sqlx::Error> {
    let disputes = sqlx::query_as("SELECT * FROM disputes WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(disputes)
}
