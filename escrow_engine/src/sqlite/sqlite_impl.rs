//! `SqliteDatabase` is a concrete implementation of an escrow engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, NaiveDate, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, disputes, escrow, new_pool, notifications, orders};
use crate::{
    db_types::{
        Dispute,
        EscrowTransaction,
        NewDispute,
        NewEscrow,
        NewNotification,
        NewOrder,
        Notification,
        Order,
        OrderId,
        OrderStatusType,
        ShippingProvider,
    },
    traits::{EscrowDatabase, EscrowError, EscrowManagement, NotificationManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl EscrowDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order_with_escrow(
        &self,
        order: NewOrder,
        escrow: NewEscrow,
    ) -> Result<(Order, EscrowTransaction), EscrowError> {
        let mut tx = self.pool.begin().await?;
        if orders::fetch_order_by_order_id(&order.order_id, &mut tx).await?.is_some() {
            debug!("🗃️ Order {} already exists. Not opening a second escrow.", order.order_id);
            return Err(EscrowError::OrderAlreadyExists(order.order_id));
        }
        let order_id = order.order_id.clone();
        let order = orders::insert_order(order, escrow.platform_fee, escrow.seller_amount, &mut tx)
            .await
            .map_err(|e| map_unique_violation(e, &order_id))?;
        let escrow = escrow::insert_escrow(escrow, &mut tx).await.map_err(|e| map_unique_violation(e, &order_id))?;
        tx.commit().await?;
        Ok((order, escrow))
    }

    async fn fund_escrow(
        &self,
        order_id: &OrderId,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, EscrowTransaction)>, EscrowError> {
        let mut tx = self.pool.begin().await?;
        let Some(escrow) = escrow::fund(order_id, payment_reference, now, &mut tx).await? else {
            return Ok(None);
        };
        let order = orders::mark_order_paid(order_id, payment_reference, now, &mut tx)
            .await?
            .ok_or_else(|| EscrowError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Escrow for order {order_id} is funded. Payment reference: {payment_reference}");
        Ok(Some((order, escrow)))
    }

    async fn release_escrow(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, EscrowTransaction)>, EscrowError> {
        let mut tx = self.pool.begin().await?;
        let Some(escrow) = escrow::release(order_id, now, &mut tx).await? else {
            return Ok(None);
        };
        let order = orders::update_order_status(order_id, OrderStatusType::Completed, now, &mut tx)
            .await?
            .ok_or_else(|| EscrowError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Escrow for order {order_id} released");
        Ok(Some((order, escrow)))
    }

    async fn refund_escrow(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, EscrowTransaction)>, EscrowError> {
        let mut tx = self.pool.begin().await?;
        let Some(escrow) = escrow::refund(order_id, now, &mut tx).await? else {
            return Ok(None);
        };
        let order = orders::update_order_status(order_id, OrderStatusType::Cancelled, now, &mut tx)
            .await?
            .ok_or_else(|| EscrowError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Escrow for order {order_id} refunded");
        Ok(Some((order, escrow)))
    }

    async fn record_payout(
        &self,
        order_id: &OrderId,
        payout_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EscrowTransaction>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let escrow = escrow::record_payout(order_id, payout_reference, now, &mut conn).await?;
        Ok(escrow)
    }

    async fn fetch_unpaid_releases(&self) -> Result<Vec<EscrowTransaction>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let escrows = escrow::fetch_unpaid_releases(&mut conn).await?;
        trace!("🗃️ {} released escrows are still waiting for their payout", escrows.len());
        Ok(escrows)
    }

    async fn fetch_overdue_escrows(&self, cutoff: DateTime<Utc>) -> Result<Vec<EscrowTransaction>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let escrows = escrow::fetch_overdue(cutoff, &mut conn).await?;
        trace!("🗃️ {} overdue escrows with expected delivery before {cutoff}", escrows.len());
        Ok(escrows)
    }

    async fn arm_auto_refund(
        &self,
        order_id: &OrderId,
        refund_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<EscrowTransaction>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let escrow = escrow::arm_auto_refund(order_id, refund_date, now, &mut conn).await?;
        Ok(escrow)
    }

    async fn fetch_refund_due_escrows(&self, today: NaiveDate) -> Result<Vec<EscrowTransaction>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let escrows = escrow::fetch_refund_due(today, &mut conn).await?;
        trace!("🗃️ {} escrows are due for refund on {today}", escrows.len());
        Ok(escrows)
    }

    async fn insert_dispute(
        &self,
        dispute: NewDispute,
        extension_days: u32,
        now: DateTime<Utc>,
    ) -> Result<(Dispute, Option<EscrowTransaction>), EscrowError> {
        let mut tx = self.pool.begin().await?;
        let order_id = dispute.order_id.clone();
        let dispute = disputes::insert_dispute(dispute, &mut tx).await?;
        let escrow = escrow::extend_for_dispute(&order_id, extension_days, now, &mut tx).await?;
        tx.commit().await?;
        Ok((dispute, escrow))
    }

    async fn attach_shipment(
        &self,
        order_id: &OrderId,
        provider: ShippingProvider,
        tracking_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::set_shipment(order_id, provider, tracking_reference, now, &mut conn).await?;
        Ok(order)
    }

    async fn advance_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, EscrowError> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = orders::fetch_order_by_order_id(order_id, &mut tx).await? else {
            return Ok(None);
        };
        if !current.status.can_advance_to(status) {
            trace!("🗃️ Order {order_id} is {}. Not moving it to {status}.", current.status);
            return Ok(None);
        }
        let order = orders::swap_order_status(order_id, current.status, status, now, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn close(&mut self) -> Result<(), EscrowError> {
        self.pool.close().await;
        Ok(())
    }
}

impl EscrowManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_tracking_reference(&self, tracking: &str) -> Result<Option<Order>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_tracking_reference(tracking, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_escrow_for_order(&self, order_id: &OrderId) -> Result<Option<EscrowTransaction>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let escrow = escrow::fetch_escrow_for_order(order_id, &mut conn).await?;
        Ok(escrow)
    }

    async fn fetch_disputes_for_order(&self, order_id: &OrderId) -> Result<Vec<Dispute>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let disputes = disputes::fetch_disputes_for_order(order_id, &mut conn).await?;
        Ok(disputes)
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let notification = notifications::insert_notification(notification, &mut conn).await?;
        trace!("🗃️ Notification #{} stored for {}", notification.id, notification.user_id);
        Ok(notification)
    }

    async fn fetch_notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::fetch_notifications_for_user(user_id, unread_only, &mut conn).await?;
        Ok(result)
    }

    async fn mark_notification_read(&self, id: i64, user_id: &str) -> Result<bool, EscrowError> {
        let mut conn = self.pool.acquire().await?;
        let updated = notifications::mark_read(id, user_id, &mut conn).await?;
        Ok(updated)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date using the migrations embedded in this crate.
    pub async fn run_migrations(&self) -> Result<(), EscrowError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EscrowError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_unique_violation(e: sqlx::Error, order_id: &OrderId) -> EscrowError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => EscrowError::OrderAlreadyExists(order_id.clone()),
        _ => EscrowError::from(e),
    }
}
