//! Error types for the stock ledger
//!
//! Replay itself never fails; these cover the edges around it (ranges,
//! configuration and the JSON envelope carrying raw records).

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {field}: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Malformed input: {0}")]
    MalformedInput(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
