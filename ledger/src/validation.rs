//! Invariant checks over replay output

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::aggregate::{aggregate, Dimension};
use crate::config::LedgerConfig;
use crate::effects::plan_effect;
use crate::models::{Buckets, LedgerReport, Movement, MovementKind, StockBucket};
use crate::types::Quantity;

/// Slack allowed when comparing sums of derived quantities
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("{date} does not follow {previous}")]
    DayGap { previous: NaiveDate, date: NaiveDate },

    #[error("opening of {date} differs from closing of {previous}")]
    CarryForward { previous: NaiveDate, date: NaiveDate },

    #[error("palti {id} removes {removed} quintals for {added} added and {shortage_kg} kg shortage")]
    PaltiConservation {
        id: String,
        removed: Decimal,
        added: Decimal,
        shortage_kg: Decimal,
    },

    #[error("category rollup of {total:?} does not match bucket total {expected:?}")]
    AggregationMismatch { expected: Quantity, total: Quantity },
}

/// Each day opens on the previous day's closing, with no day skipped
pub fn check_carry_forward(report: &LedgerReport) -> Result<(), InvariantViolation> {
    for pair in report.days.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if previous.date.succ_opt() != Some(current.date) {
            return Err(InvariantViolation::DayGap {
                previous: previous.date,
                date: current.date,
            });
        }
        if previous.closing != current.opening {
            return Err(InvariantViolation::CarryForward {
                previous: previous.date,
                date: current.date,
            });
        }
    }
    Ok(())
}

/// Source removal equals target addition plus shortage
pub fn check_palti_conservation(
    buckets: &Buckets,
    movement: &Movement,
    config: &LedgerConfig,
) -> Result<(), InvariantViolation> {
    if movement.kind != MovementKind::Palti {
        return Ok(());
    }
    let Ok(effect) = plan_effect(buckets, movement, config) else {
        return Ok(());
    };
    let removed = effect.removed().quintals;
    let added = effect.added().quintals;
    let lost = effect.shortage_kg / Decimal::ONE_HUNDRED;
    if removed.saturating_sub(added).saturating_sub(lost).abs() > TOLERANCE {
        return Err(InvariantViolation::PaltiConservation {
            id: movement.id.clone(),
            removed,
            added,
            shortage_kg: effect.shortage_kg,
        });
    }
    Ok(())
}

/// Category totals account for every bucket but direct-load ones
pub fn check_aggregation_consistency(buckets: &Buckets) -> Result<(), InvariantViolation> {
    let expected: Quantity = buckets
        .iter()
        .filter(|b| !b.dimensions.direct_load)
        .map(StockBucket::quantity)
        .sum();
    let total: Quantity = aggregate(buckets, Dimension::ProductCategory).into_values().sum();
    let drift = total - expected;
    if drift.bags.abs() > TOLERANCE || drift.quintals.abs() > TOLERANCE {
        return Err(InvariantViolation::AggregationMismatch { expected, total });
    }
    Ok(())
}

/// Run every check over a report, collecting all violations
pub fn check_report(report: &LedgerReport, config: &LedgerConfig) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    if let Err(violation) = check_carry_forward(report) {
        violations.push(violation);
    }
    for day in &report.days {
        for movement in &day.movements {
            if let Err(violation) = check_palti_conservation(&day.opening, movement, config) {
                violations.push(violation);
            }
        }
        if let Err(violation) = check_aggregation_consistency(&day.closing) {
            violations.push(violation);
        }
    }
    if !violations.is_empty() {
        tracing::warn!(count = violations.len(), "ledger invariants violated");
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LedgerEvents, MovementStatus, ProductCategory};
    use crate::replay::Replayer;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_tolerance_is_one_millionth() {
        assert_eq!(TOLERANCE, dec("0.000001"));
    }

    #[test]
    fn test_detects_broken_carry_forward() {
        let config = LedgerConfig::default();
        let events = LedgerEvents::new(vec![
            Movement::new("p1", day(1), MovementKind::Loose)
                .with_bags(10, dec("26"))
                .to_location("A1"),
            Movement::new("p2", day(2), MovementKind::Loose)
                .with_bags(10, dec("26"))
                .to_location("A1"),
        ]);
        let mut report = Replayer::new(&config).replay(&events, None);
        assert!(check_report(&report, &config).is_empty());

        report.days[1].opening = Buckets::new();
        assert_eq!(
            check_carry_forward(&report),
            Err(InvariantViolation::CarryForward {
                previous: day(1),
                date: day(2)
            })
        );

        report.days.remove(0);
        report.days.push(report.days[0].clone());
        assert!(matches!(
            check_carry_forward(&report),
            Err(InvariantViolation::DayGap { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn replayed_reports_hold_every_invariant(
            paltis in prop::collection::vec(
                (1u32..8, 0usize..4, 1u32..80, 0u32..40, prop::sample::select(vec!["25", "26", "30", "50"])),
                0..25,
            )
        ) {
            let config = LedgerConfig::default();
            let movements = paltis
                .into_iter()
                .enumerate()
                .map(|(i, (d, kind, bags, shortage, size))| {
                    let kind = [MovementKind::Purchase, MovementKind::Palti, MovementKind::Sale, MovementKind::Shift][kind];
                    Movement::new(i.to_string(), day(d), kind)
                        .with_variety("Sona")
                        .with_category(ProductCategory::Rice)
                        .with_bags(bags, dec(size))
                        .from_location("A1")
                        .to_location(if i % 2 == 0 { "A2" } else { "direct load" })
                        .with_source_packaging("plain", dec("26"))
                        .with_shortage_kg(Decimal::from(shortage))
                        .with_status(MovementStatus::Approved)
                })
                .collect();
            let report = Replayer::new(&config).replay(&LedgerEvents::new(movements), None);
            prop_assert!(check_report(&report, &config).is_empty());
        }
    }
}
