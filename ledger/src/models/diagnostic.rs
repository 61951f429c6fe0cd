//! Out-of-band diagnostics returned alongside a ledger

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// Field absent; a default was used
    MissingField,
    /// Field present but unparseable; a default was used
    UnparseableField,
    /// Record could not be placed on a day and was dropped
    SkippedRecord,
    /// Movement kind not recognised; retained for audit only
    UnknownKind,
    /// Category resolved by substring guess
    GuessedCategory,
    /// Palti named different source and target categories
    CategoryMismatch,
    /// Movement lacks a location or outturn its kind needs
    UnplacedMovement,
    /// Outward movement drove a bucket negative
    InsufficientStock,
    /// Unconsumed outturn stock dropped at clearing
    OutturnWriteOff,
    /// Stock dropped by a location closure
    ClosureWriteOff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub code: DiagnosticCode,
    /// Id of the record concerned, when it has one
    pub record_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub message: String,
}

/// Collects diagnostics and mirrors them to the tracing log
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(
        &mut self,
        code: DiagnosticCode,
        record_id: Option<&str>,
        date: Option<NaiveDate>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        tracing::warn!(?code, record_id, ?date, "{}", message);
        self.push(DiagnosticLevel::Warning, code, record_id, date, message);
    }

    pub fn info(
        &mut self,
        code: DiagnosticCode,
        record_id: Option<&str>,
        date: Option<NaiveDate>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        tracing::debug!(?code, record_id, ?date, "{}", message);
        self.push(DiagnosticLevel::Info, code, record_id, date, message);
    }

    fn push(
        &mut self,
        level: DiagnosticLevel,
        code: DiagnosticCode,
        record_id: Option<&str>,
        date: Option<NaiveDate>,
        message: String,
    ) {
        self.entries.push(Diagnostic {
            level,
            code,
            record_id: record_id.map(str::to_string),
            date,
            message,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
