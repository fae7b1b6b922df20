//! # Storage and collaborator contracts.
//!
//! This module defines the behaviour that backends need to expose in order to be used by the escrow engine.
//!
//! * [`EscrowDatabase`] defines the state-changing operations on orders and escrows. Every transition is a
//!   compare-and-swap on the current status.
//! * [`EscrowManagement`] provides read-only queries over orders, escrows and disputes.
//! * [`NotificationManagement`] stores and reads user notifications.
//! * [`FundsGateway`] is the external service that performs refunds and seller payouts.
mod escrow_database;
mod escrow_management;
mod funds_gateway;
mod notification_management;

pub use escrow_database::{EscrowDatabase, EscrowError};
pub use escrow_management::EscrowManagement;
pub use funds_gateway::{FundsError, FundsGateway, FundsReceipt, PayoutRequest, RefundRequest};
pub use notification_management::NotificationManagement;
