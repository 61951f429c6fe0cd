//! Domain models for the stock ledger

mod bucket;
mod diagnostic;
mod ledger;
mod movement;

pub use bucket::*;
pub use diagnostic::*;
pub use ledger::*;
pub use movement::*;
