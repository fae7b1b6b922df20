#![allow(dead_code)]

pub mod fixtures;
pub mod funds;
pub mod prepare_env;
