//! # Escrow engine public API
//!
//! The `escrow_api` module exposes the programmatic API of the escrow engine. Each API is constructed from a storage
//! backend that implements [`EscrowDatabase`](crate::traits::EscrowDatabase), so the same flows run against SQLite in
//! production and in tests.
//!
//! * [`EscrowLedgerApi`] opens escrows at checkout, applies verified gateway notifications and moves escrows to
//!   released or refunded.
//! * [`DeliveryConfirmationApi`] maps courier and locker webhooks onto release decisions.
//! * [`AutoRefundApi`] runs the overdue and refund sweeps.
//! * [`DisputeApi`] lets a buyer hold the refund clock.
//! * [`NotificationApi`] sends and reads user notifications.
//!
//! ```rust,ignore
//! use escrow_engine::{EscrowLedgerApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/escrow_store.db", 5).await?;
//! let ledger = EscrowLedgerApi::new(db, EscrowPolicy::default(), EventProducers::default(), funds);
//! let (order, escrow) = ledger.open_escrow(new_order, Utc::now()).await?;
//! ```
mod delivery_api;
mod dispute_api;
pub mod escrow_objects;
mod ledger_api;
pub mod notices;
mod notification_api;
mod refund_api;

pub use delivery_api::DeliveryConfirmationApi;
pub use dispute_api::DisputeApi;
pub use ledger_api::EscrowLedgerApi;
pub use notification_api::NotificationApi;
pub use refund_api::AutoRefundApi;
