//! Business logic services for the stock ledger server

pub mod ledger;
