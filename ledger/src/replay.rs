//! Ledger replayer
//!
//! A strict chronological fold over calendar days. The only mutable state is
//! the running bucket map, which each replay call owns; a day's closing map
//! is the next day's opening map.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::LedgerConfig;
use crate::effects::plan_effect;
use crate::keys::normalize_label;
use crate::models::{
    Buckets, DayLedger, DiagnosticCode, Diagnostics, LedgerEvents, LedgerReport, Movement,
    MovementKind, WriteOff, WriteOffReason,
};
use crate::normalizer::{LedgerInput, Normalizer};
use crate::seed;
use crate::types::DateRange;

/// What one day did to the running map
#[derive(Debug, Default)]
pub(crate) struct DayActivity {
    pub movements: Vec<Movement>,
    pub pending: Vec<Movement>,
    pub ignored: Vec<Movement>,
    pub write_offs: Vec<WriteOff>,
}

/// Replays movements into day-by-day ledgers
#[derive(Debug, Clone, Copy)]
pub struct Replayer<'a> {
    config: &'a LedgerConfig,
}

impl<'a> Replayer<'a> {
    pub fn new(config: &'a LedgerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LedgerConfig {
        self.config
    }

    /// Normalize raw records and replay them
    pub fn replay_input(&self, input: &LedgerInput, range: Option<DateRange>) -> LedgerReport {
        let normalized = Normalizer::new(self.config).normalize(input);
        let mut report = self.replay(&normalized.events, range);
        let mut diagnostics = normalized.diagnostics.into_vec();
        diagnostics.append(&mut report.diagnostics);
        report.diagnostics = diagnostics;
        report
    }

    /// Replay from an empty map.
    ///
    /// With a range, everything before `range.start` is folded into the
    /// opening balance first and only the range's days are reported. Without
    /// one, every day spanned by the events is reported.
    pub fn replay(&self, events: &LedgerEvents, range: Option<DateRange>) -> LedgerReport {
        match range {
            Some(range) => {
                let mut diagnostics = Diagnostics::new();
                let opening = seed::fold_before(self, events, range.start, &mut diagnostics);
                let mut report = self.replay_from(opening, events, range);
                let mut all = diagnostics.into_vec();
                all.append(&mut report.diagnostics);
                report.diagnostics = all;
                report
            }
            None => match DateRange::spanning(events.dates()) {
                Some(span) => self.replay_from(Buckets::new(), events, span),
                None => LedgerReport::default(),
            },
        }
    }

    /// Replay `range` on top of `seed`.
    ///
    /// Movements dated before the range are assumed to be in the seed and
    /// are skipped; closures and clearings dated before it still apply.
    pub fn replay_from(&self, seed: Buckets, events: &LedgerEvents, range: DateRange) -> LedgerReport {
        let mut diagnostics = Diagnostics::new();
        let by_day = group_by_day(events, |d| range.contains(d));
        let mut running = seed;
        let mut days = Vec::new();

        for date in range.days() {
            let opening = running.clone();
            let todays = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            let activity = self.advance(&mut running, date, todays, events, &mut diagnostics);
            days.push(DayLedger {
                date,
                opening,
                movements: activity.movements,
                pending: activity.pending,
                ignored: activity.ignored,
                write_offs: activity.write_offs,
                closing: running.clone(),
            });
        }

        tracing::debug!(
            start = %range.start,
            end = %range.end,
            days = days.len(),
            buckets = running.len(),
            diagnostics = diagnostics.len(),
            "ledger replayed"
        );

        LedgerReport {
            days,
            diagnostics: diagnostics.into_vec(),
        }
    }

    /// Apply one day's movements, then any terminal events in force by `date`
    pub(crate) fn advance(
        &self,
        running: &mut Buckets,
        date: NaiveDate,
        movements: &[&Movement],
        events: &LedgerEvents,
        diagnostics: &mut Diagnostics,
    ) -> DayActivity {
        let epsilon = self.config.epsilon;
        let mut activity = DayActivity::default();

        for &movement in movements {
            if movement.kind == MovementKind::Unknown {
                activity.ignored.push(movement.clone());
                continue;
            }
            if !movement.participates() {
                activity.pending.push(movement.clone());
                continue;
            }

            let effect = match plan_effect(running, movement, self.config) {
                Ok(effect) => effect,
                Err(reason) => {
                    diagnostics.warn(
                        DiagnosticCode::UnplacedMovement,
                        Some(movement.id.as_str()),
                        Some(date),
                        reason.to_string(),
                    );
                    activity.ignored.push(movement.clone());
                    continue;
                }
            };

            for delta in &effect.deltas {
                running.apply(delta);
            }
            for delta in effect.deltas.iter().filter(|d| d.change.is_short(Decimal::ZERO)) {
                let balance = running.quantity(&delta.key);
                if balance.is_short(epsilon) {
                    diagnostics.warn(
                        DiagnosticCode::InsufficientStock,
                        Some(movement.id.as_str()),
                        Some(date),
                        format!(
                            "{} left {} at {} bags / {} quintals",
                            movement.kind, delta.key, balance.bags, balance.quintals
                        ),
                    );
                }
            }
            running.sweep(epsilon);
            activity.movements.push(movement.clone());
        }

        for clearing in events.clearings.iter().filter(|c| c.cleared_date <= date) {
            let code = normalize_label(&clearing.outturn_code);
            let removed = running.remove_where(|b| b.dimensions.outturn.as_deref() == Some(code.as_str()));
            for bucket in removed {
                diagnostics.info(
                    DiagnosticCode::OutturnWriteOff,
                    Some(code.as_str()),
                    Some(date),
                    format!("{} bags / {} quintals written off at clearing", bucket.bags, bucket.quintals),
                );
                activity.write_offs.push(WriteOff {
                    reason: WriteOffReason::OutturnCleared,
                    bucket,
                });
            }
        }

        for closure in events.closures.iter().filter(|c| c.closed_date <= date) {
            let code = normalize_label(&closure.location_code);
            if code.is_empty() {
                continue;
            }
            let removed = running.remove_where(|b| {
                b.dimensions
                    .location
                    .as_deref()
                    .is_some_and(|location| location.starts_with(code.as_str()))
            });
            for bucket in removed {
                diagnostics.info(
                    DiagnosticCode::ClosureWriteOff,
                    Some(code.as_str()),
                    Some(date),
                    format!("{} bags / {} quintals dropped by closure", bucket.bags, bucket.quintals),
                );
                activity.write_offs.push(WriteOff {
                    reason: WriteOffReason::LocationClosed,
                    bucket,
                });
            }
        }

        activity
    }
}

/// Movements grouped by day and put in application order: inward kinds,
/// then transfers, then sales; input order within a rank
pub(crate) fn group_by_day<F>(events: &LedgerEvents, mut keep: F) -> BTreeMap<NaiveDate, Vec<&Movement>>
where
    F: FnMut(NaiveDate) -> bool,
{
    let mut by_day: BTreeMap<NaiveDate, Vec<&Movement>> = BTreeMap::new();
    for movement in events.movements.iter().filter(|m| keep(m.date)) {
        by_day.entry(movement.date).or_default().push(movement);
    }
    for day in by_day.values_mut() {
        day.sort_by_key(|m| m.kind.apply_rank());
    }
    by_day
}
