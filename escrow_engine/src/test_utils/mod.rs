//! Helpers for tests that need a real, migrated database. Enable the `test_utils` feature to use them from other
//! crates.
pub mod prepare_env;
