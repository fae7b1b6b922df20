//! EduThrift Escrow Engine
//!
//! The escrow engine holds a buyer's payment for a second-hand school item until the buyer has the goods, then pays
//! the seller. If the goods never arrive, the buyer is refunded automatically. This library contains the core logic
//! and is independent of the HTTP server that drives it.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@traits`] and [`mod@sqlite`]). The traits describe what a backend must provide; SQLite is the
//!    supported backend. The data types stored in the database are defined in [`mod@db_types`].
//! 2. Payment gateways ([`mod@gateways`]). Builds signed payment requests for PayFast, Ozow and PayGate, verifies their
//!    notifications and normalizes them into a single event shape.
//! 3. The engine APIs ([`mod@escrow_api`]): the escrow ledger, delivery confirmation, the auto-refund sweeps, disputes
//!    and notifications.
//!
//! The engine also publishes events when escrows are funded, released or refunded, and when disputes are opened. See
//! [`mod@events`] for how to hook into them.
pub mod db_types;
pub mod escrow_api;
pub mod events;
pub mod gateways;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(all(feature = "test_utils", feature = "sqlite"))]
pub mod test_utils;

pub use escrow_api::{
    escrow_objects,
    AutoRefundApi,
    DeliveryConfirmationApi,
    DisputeApi,
    EscrowLedgerApi,
    NotificationApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{EscrowDatabase, EscrowError, EscrowManagement, FundsGateway, NotificationManagement};
