//! Stock ledger replay engine for the rice mill management console
//!
//! Turns an unordered collection of inventory movements (paddy purchases,
//! shifts, productions, sales, palti conversions) into a day-by-day running
//! balance. The crate is a pure in-memory transform shared by the HTTP
//! backend and the WASM bindings.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod effects;
pub mod error;
pub mod keys;
pub mod models;
pub mod normalizer;
pub mod replay;
pub mod seed;
pub mod types;
pub mod validation;

pub use aggregate::Dimension;
pub use cache::{ReplayCache, ReplayCacheKey};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use models::*;
pub use normalizer::{LedgerInput, NormalizedInput, Normalizer};
pub use replay::Replayer;
pub use types::*;
