//! Day-by-day ledger snapshots and the terminal events that shape them

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Buckets, Diagnostic, Movement, StockBucket};
use crate::error::LedgerResult;
use crate::types::{DateRange, Quantity};

/// A location taken out of service from `closed_date` onward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationClosure {
    /// Normalized location code; every location starting with it is closed
    pub location_code: String,
    pub closed_date: NaiveDate,
}

/// A production batch closed out on `cleared_date`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutturnClearing {
    /// Normalized outturn code
    pub outturn_code: String,
    pub cleared_date: NaiveDate,
}

/// Why stock left the ledger without a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOffReason {
    /// Paddy left in an outturn when it was cleared
    OutturnCleared,
    /// Stock in a location on its closure
    LocationClosed,
}

/// Stock dropped from the running map; reported, never re-added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOff {
    pub reason: WriteOffReason,
    pub bucket: StockBucket,
}

/// Everything a replay consumes, already normalized
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvents {
    pub movements: Vec<Movement>,
    pub closures: Vec<LocationClosure>,
    pub clearings: Vec<OutturnClearing>,
}

impl LedgerEvents {
    pub fn new(movements: Vec<Movement>) -> Self {
        Self {
            movements,
            ..Self::default()
        }
    }

    /// Every date carried by a movement, closure or clearing
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.movements
            .iter()
            .map(|m| m.date)
            .chain(self.closures.iter().map(|c| c.closed_date))
            .chain(self.clearings.iter().map(|c| c.cleared_date))
    }

    /// Replay range for optional bounds.
    ///
    /// No bounds gives `None` (replay the events' own span). A single open
    /// end is filled from that span, or collapses onto the given bound when
    /// the events lie wholly on its other side.
    pub fn resolve_range(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<Option<DateRange>> {
        let span = DateRange::spanning(self.dates());
        let range = match (start, end) {
            (None, None) => return Ok(None),
            (Some(start), Some(end)) => DateRange::new(start, end)?,
            (Some(start), None) => DateRange::new(start, span.map_or(start, |s| s.end.max(start)))?,
            (None, Some(end)) => DateRange::new(span.map_or(end, |s| s.start.min(end)), end)?,
        };
        Ok(Some(range))
    }
}

/// One calendar day of the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayLedger {
    pub date: NaiveDate,
    /// Previous day's closing buckets
    pub opening: Buckets,
    /// Movements applied on this day, in application order
    pub movements: Vec<Movement>,
    /// Pending or rejected movements dated this day; never applied
    pub pending: Vec<Movement>,
    /// Unknown-kind or unplaceable movements dated this day
    pub ignored: Vec<Movement>,
    pub write_offs: Vec<WriteOff>,
    pub closing: Buckets,
}

impl DayLedger {
    /// Net change in totals from opening to closing
    pub fn net_change(&self) -> Quantity {
        self.closing.total() - self.opening.total()
    }
}

/// Output of one replay pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub days: Vec<DayLedger>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LedgerReport {
    /// Closing buckets of the last day, if any day was replayed
    pub fn final_closing(&self) -> Option<&Buckets> {
        self.days.last().map(|d| &d.closing)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayLedger> {
        self.days
            .binary_search_by_key(&date, |d| d.date)
            .ok()
            .map(|i| &self.days[i])
    }
}
