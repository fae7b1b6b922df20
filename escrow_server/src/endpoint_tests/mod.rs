mod helpers;
mod mocks;

mod checkout;
mod escrow;
mod notifications;
mod payments;
mod shipping;
