use serde::{Deserialize, Serialize};

use crate::db_types::{Dispute, EscrowTransaction, Order};

/// The gateway confirmed payment and the escrow now holds the buyer's funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowFundedEvent {
    pub order: Order,
    pub escrow: EscrowTransaction,
}

/// Funds were released to the seller. The seller payout is attempted after this event is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowReleasedEvent {
    pub order: Order,
    pub escrow: EscrowTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRefundedEvent {
    pub order: Order,
    pub escrow: EscrowTransaction,
    /// The reference issued by the funds service for the refund.
    pub refund_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeOpenedEvent {
    pub dispute: Dispute,
    pub escrow: Option<EscrowTransaction>,
}

macro_rules! event_ctor {
    ($name:ident) => {
        impl $name {
            pub fn new(order: Order, escrow: EscrowTransaction) -> Self {
                Self { order, escrow }
            }
        }
    };
}

event_ctor!(EscrowFundedEvent);
event_ctor!(EscrowReleasedEvent);
