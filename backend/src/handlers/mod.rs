//! HTTP handlers

pub mod health;
pub mod ledger;

pub use health::*;
pub use ledger::*;
