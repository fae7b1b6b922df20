pub mod audit;
pub mod checkout;
pub mod funds;
