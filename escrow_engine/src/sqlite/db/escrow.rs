//! Escrow rows. Every transition here is a conditional `UPDATE … WHERE status = … RETURNING *`, so a transition that
//! loses a race, or is attempted from the wrong status, simply returns `None`.
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{EscrowTransaction, NewEscrow, OrderId};

pub async fn insert_escrow(escrow: NewEscrow, conn: &mut SqliteConnection) -> Result<EscrowTransaction, sqlx::Error> {
    let escrow: EscrowTransaction = sqlx::query_as(
        r#"
            INSERT INTO escrow_transactions (
                order_id,
                buyer_id,
                seller_id,
                total_amount,
                platform_fee,
                seller_amount,
                status,
                expected_delivery_date
            ) VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING *;
        "#,
    )
    .bind(escrow.order_id)
    .bind(escrow.buyer_id)
    .bind(escrow.seller_id)
    .bind(escrow.total_amount)
    .bind(escrow.platform_fee)
    .bind(escrow.seller_amount)
    .bind(escrow.expected_delivery_date)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Escrow for order {} opened with id {}", escrow.order_id, escrow.id);
    Ok(escrow)
}

pub async fn fetch_escrow_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<EscrowTransaction>, sqlx::Error> {
    let escrow = sqlx::query_as("SELECT * FROM escrow_transactions WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(escrow)
}

pub async fn fund(
    order_id: &OrderId,
    payment_reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<EscrowTransaction>, sqlx::Error> {
    let escrow = sqlx::query_as(
        r#"
        UPDATE escrow_transactions SET status = 'funded', payment_reference = $1, funded_at = $2, updated_at = $2
        WHERE order_id = $3 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(payment_reference)
    .bind(now)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Fund escrow for {order_id}: {}", if escrow.is_some() { "ok" } else { "no pending escrow" });
    Ok(escrow)
}

pub async fn release(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<EscrowTransaction>, sqlx::Error> {
    let escrow = sqlx::query_as(
        r#"
        UPDATE escrow_transactions SET status = 'released', released_at = $1, updated_at = $1
        WHERE order_id = $2 AND status = 'funded'
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Release escrow for {order_id}: {}", if escrow.is_some() { "ok" } else { "no funded escrow" });
    Ok(escrow)
}

pub async fn refund(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<EscrowTransaction>, sqlx::Error> {
    let escrow = sqlx::query_as(
        r#"
        UPDATE escrow_transactions SET status = 'refunded', refunded_at = $1, updated_at = $1
        WHERE order_id = $2 AND status = 'funded'
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Refund escrow for {order_id}: {}", if escrow.is_some() { "ok" } else { "no funded escrow" });
    Ok(escrow)
}

/// Stamps the confirmed seller payout on a released escrow. Only the first confirmation is recorded.
pub async fn record_payout(
    order_id: &OrderId,
    payout_reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<EscrowTransaction>, sqlx::Error> {
    let escrow = sqlx::query_as(
        r#"
        UPDATE escrow_transactions SET payout_reference = $1, paid_out_at = $2, updated_at = $2
        WHERE order_id = $3 AND status = 'released' AND paid_out_at IS NULL
        RETURNING *
        "#,
    )
    .bind(payout_reference)
    .bind(now)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Record payout for {order_id}: {}", if escrow.is_some() { "ok" } else { "nothing awaiting payout" });
    Ok(escrow)
}

pub async fn fetch_unpaid_releases(conn: &mut SqliteConnection) -> Result<Vec<EscrowTransaction>, sqlx::Error> {
    let escrows = sqlx::query_as(
        r#"
        SELECT * FROM escrow_transactions
        WHERE status = 'released' AND paid_out_at IS NULL
        ORDER BY released_at ASC, id ASC
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(escrows)
}

/// Funded, unarmed escrows whose expected delivery date is before `cutoff`.
///
/// The delivery date is a calendar date, and it is compared as midnight at the start of that day.
pub async fn fetch_overdue(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<EscrowTransaction>, sqlx::Error> {
    let escrows = sqlx::query_as(
        r#"
        SELECT * FROM escrow_transactions
        WHERE status = 'funded'
          AND auto_refund_date IS NULL
          AND datetime(expected_delivery_date) < datetime($1)
        ORDER BY expected_delivery_date ASC, id ASC
        "#,
    )
    .bind(cutoff.naive_utc())
    .fetch_all(conn)
    .await?;
    Ok(escrows)
}

pub async fn arm_auto_refund(
    order_id: &OrderId,
    refund_date: NaiveDate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<EscrowTransaction>, sqlx::Error> {
    let escrow = sqlx::query_as(
        r#"
        UPDATE escrow_transactions SET auto_refund_date = $1, updated_at = $2
        WHERE order_id = $3 AND status = 'funded' AND auto_refund_date IS NULL
        RETURNING *
        "#,
    )
    .bind(refund_date)
    .bind(now)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(escrow)
}

pub async fn fetch_refund_due(
    today: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<Vec<EscrowTransaction>, sqlx::Error> {
    let escrows = sqlx::query_as(
        r#"
        SELECT * FROM escrow_transactions
        WHERE status = 'funded'
          AND auto_refund_date IS NOT NULL
          AND auto_refund_date <= $1
        ORDER BY auto_refund_date ASC, id ASC
        "#,
    )
    .bind(today)
    .fetch_all(conn)
    .await?;
    Ok(escrows)
}

/// Flags the escrow as disputed and moves the refund clock forward. An armed deadline is pushed back; an unarmed
/// escrow has its expected delivery date pushed back instead, which delays the arming sweep by the same amount.
/// Released and refunded escrows are not touched.
pub async fn extend_for_dispute(
    order_id: &OrderId,
    extension_days: u32,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<EscrowTransaction>, sqlx::Error> {
    let modifier = format!("+{extension_days} days");
    let escrow = sqlx::query_as(
        r#"
        UPDATE escrow_transactions SET
            disputed_at = COALESCE(disputed_at, $1),
            auto_refund_date = CASE
                WHEN auto_refund_date IS NULL THEN NULL
                ELSE date(auto_refund_date, $2)
            END,
            expected_delivery_date = CASE
                WHEN auto_refund_date IS NULL THEN date(expected_delivery_date, $2)
                ELSE expected_delivery_date
            END,
            updated_at = $1
        WHERE order_id = $3 AND status IN ('pending', 'funded')
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(modifier)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(escrow)
}
