use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Cents, OrderId};

/// Returns the buyer's money. The funds service must treat repeated requests with the same idempotency key (the
/// escrow's payment reference) as a single refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub amount: Cents,
    pub idempotency_key: String,
    pub reason: String,
}

/// Pays the seller their share of a released escrow into their registered bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub order_id: OrderId,
    pub seller_id: String,
    pub amount: Cents,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsReceipt {
    pub reference: String,
}

#[derive(Debug, Clone, Error)]
pub enum FundsError {
    #[error("The funds service rejected the request. {0}")]
    Rejected(String),
    #[error("The funds service could not be reached. {0}")]
    Unavailable(String),
}

/// The external service that actually moves money.
///
/// The futures are boxed and `'static` so that implementations can be shared as `Arc<dyn FundsGateway>` between the
/// HTTP workers and the scheduler tasks.
pub trait FundsGateway: Send + Sync {
    fn refund(&self, request: RefundRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>>;

    fn payout(&self, request: PayoutRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>>;
}
