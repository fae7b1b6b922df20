//! SQLite database module for the escrow engine.
//!
//! The schema lives in `migrations/` and is embedded into the binary. Call [`SqliteDatabase::run_migrations`] on
//! start-up to bring a database up to date.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
