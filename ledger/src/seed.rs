//! Historical seed loader
//!
//! Opening balances for bounded replays. [`opening_balance`] folds every
//! movement before a cutoff through the same day step the replayer uses, so a
//! seeded replay matches a full replay sliced at the cutoff.
//! [`opening_balance_from_records`] builds a seed from pre-aggregated balance
//! rows instead.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::LedgerConfig;
use crate::keys::{location_bucket, outturn_bucket};
use crate::models::{Buckets, DiagnosticCode, Diagnostics, LedgerEvents, ProductCategory, StockBucket};
use crate::normalizer::{capped, usable_bag_size, Field, RawRecord};
use crate::replay::{group_by_day, Replayer};
use crate::types::quintals_for;

/// Running buckets at the start of `cutoff`
pub fn opening_balance(config: &LedgerConfig, events: &LedgerEvents, cutoff: NaiveDate) -> Buckets {
    let mut diagnostics = Diagnostics::new();
    fold_before(&Replayer::new(config), events, cutoff, &mut diagnostics)
}

/// Fold every event dated before `cutoff` into a bucket map.
///
/// Only days that carry an event are stepped; an empty day changes nothing.
pub(crate) fn fold_before(
    replayer: &Replayer<'_>,
    events: &LedgerEvents,
    cutoff: NaiveDate,
    diagnostics: &mut Diagnostics,
) -> Buckets {
    let by_day = group_by_day(events, |d| d < cutoff);
    let mut dates: Vec<NaiveDate> = events.dates().filter(|d| *d < cutoff).collect();
    dates.sort_unstable();
    dates.dedup();

    let mut running = Buckets::new();
    for date in dates {
        let todays = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
        replayer.advance(&mut running, date, todays, events, diagnostics);
    }

    tracing::debug!(%cutoff, buckets = running.len(), "opening balance folded");
    running
}

const VARIETY_FIELDS: &[&str] = &["variety", "varietyname"];
const LOCATION_FIELDS: &[&str] = &["location", "locationcode", "kunchinittu", "kunchinittucode", "warehouse"];
const OUTTURN_FIELDS: &[&str] = &["outturncode", "outturn"];
const CATEGORY_FIELDS: &[&str] = &["productcategory", "producttype", "product", "category"];
const PACKAGING_FIELDS: &[&str] = &["packaging", "packagingbrand", "brand"];
const BAG_SIZE_FIELDS: &[&str] = &["bagsizekg", "bagsize"];
const BAGS_FIELDS: &[&str] = &["bags", "balancebags", "closingbags"];
const QUINTAL_FIELDS: &[&str] = &["quintals", "quantityquintals", "balancequintals", "closingquintals"];

/// Seed from pre-aggregated balance rows.
///
/// Each row names a variety and either a location or an outturn, plus bags
/// and optionally quintals; rows keyed alike merge. Rows that name neither a
/// location nor an outturn are skipped with a warning.
pub fn opening_balance_from_records(config: &LedgerConfig, rows: &[Value]) -> (Buckets, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut buckets = Buckets::new();

    for (index, row) in rows.iter().enumerate() {
        let id = format!("balance #{}", index);
        let Some(object) = row.as_object() else {
            diagnostics.warn(DiagnosticCode::SkippedRecord, Some(id.as_str()), None, "balance row is not an object");
            continue;
        };
        let record = RawRecord::new(object);

        let variety = record.text(VARIETY_FIELDS).unwrap_or_default();
        let category = record
            .text(CATEGORY_FIELDS)
            .map(|raw| ProductCategory::resolve(&raw).category)
            .unwrap_or(ProductCategory::Other);
        let bag_size_kg = record
            .decimal(BAG_SIZE_FIELDS)
            .ok()
            .filter(|size| usable_bag_size(*size))
            .unwrap_or(config.default_bag_size_kg);
        let bags = match record.decimal(BAGS_FIELDS) {
            Field::Present(bags) => capped(bags, "bags", Some(id.as_str()), None, &mut diagnostics),
            Field::Missing => Decimal::ZERO,
            Field::Invalid => {
                diagnostics.warn(DiagnosticCode::UnparseableField, Some(id.as_str()), None, "bags unparseable, using 0");
                Decimal::ZERO
            }
        };
        let quintals = match record.decimal(QUINTAL_FIELDS).ok().filter(|q| !q.is_zero()) {
            Some(q) => capped(q, "quintals", Some(id.as_str()), None, &mut diagnostics),
            None => quintals_for(bags, bag_size_kg),
        };

        let (key, dimensions) = match (record.text(OUTTURN_FIELDS), record.text(LOCATION_FIELDS)) {
            (Some(code), _) => outturn_bucket(&variety, &code, category),
            (None, Some(location)) => location_bucket(
                &variety,
                &location,
                category,
                &record.text(PACKAGING_FIELDS).unwrap_or_default(),
                bag_size_kg,
                &config.direct_load_markers,
            ),
            (None, None) => {
                diagnostics.warn(
                    DiagnosticCode::SkippedRecord,
                    Some(id.as_str()),
                    None,
                    "balance row names neither a location nor an outturn",
                );
                continue;
            }
        };

        buckets.insert(StockBucket {
            key,
            dimensions,
            bags,
            quintals,
        });
    }

    buckets.sweep(config.epsilon);
    (buckets, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{build_key, build_outturn_key};
    use crate::models::{LocationClosure, Movement, MovementKind, MovementStatus, OutturnClearing};
    use crate::types::DateRange;
    use proptest::prelude::*;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_opening_balance_excludes_cutoff_day() {
        let config = LedgerConfig::default();
        let events = LedgerEvents::new(vec![
            Movement::new("p1", day(1), MovementKind::Purchase)
                .with_variety("Sona")
                .with_bags(10, dec("26"))
                .to_location("A1"),
            Movement::new("p2", day(3), MovementKind::Purchase)
                .with_variety("Sona")
                .with_bags(5, dec("26"))
                .to_location("A1"),
        ]);
        let key = build_key("Sona", "A1", ProductCategory::Other, "", dec("26"));

        assert!(opening_balance(&config, &events, day(1)).is_empty());
        assert_eq!(opening_balance(&config, &events, day(3)).quantity(&key).bags, dec("10"));
        assert_eq!(opening_balance(&config, &events, day(4)).quantity(&key).bags, dec("15"));
    }

    #[test]
    fn test_balance_rows_merge_and_route() {
        let config = LedgerConfig::default();
        let rows = vec![
            json!({"variety": "Sona", "location": "A1", "bags": 10}),
            json!({"Variety": "sona", "Location": " a1 ", "Bags": "5", "bagSizeKg": 26}),
            json!({"variety": "Sona", "outturnCode": "OT-1", "bags": 40, "quintals": 10.4}),
            json!({"variety": "Sona", "bags": 1}),
            json!("nonsense"),
        ];
        let (buckets, diagnostics) = opening_balance_from_records(&config, &rows);

        let location = build_key("Sona", "A1", ProductCategory::Other, "", dec("26"));
        assert_eq!(buckets.quantity(&location).bags, dec("15"));
        assert_eq!(buckets.quantity(&location).quintals, dec("3.9"));
        assert_eq!(buckets.quantity(&build_outturn_key("Sona", "OT-1")).quintals, dec("10.4"));
        assert_eq!(buckets.len(), 2);
        assert_eq!(diagnostics.len(), 2);
    }

    fn arb_movement() -> impl Strategy<Value = Movement> {
        (
            1u32..15,
            0usize..7,
            prop::sample::select(vec!["K1 A", "K1 B", "K2"]),
            prop::sample::select(vec!["K1 A", "K1 B", "K2"]),
            1u32..40,
            prop::option::of(prop::sample::select(vec!["OT-1", "OT-2"])),
            prop::bool::weighted(0.8),
        )
            .prop_map(|(d, kind, from, to, bags, outturn, approved)| {
                let kind = [
                    MovementKind::Purchase,
                    MovementKind::Loose,
                    MovementKind::Shift,
                    MovementKind::Sale,
                    MovementKind::Palti,
                    MovementKind::ProductionShift,
                    MovementKind::Production,
                ][kind];
                let status = if approved {
                    MovementStatus::Approved
                } else {
                    MovementStatus::Rejected
                };
                let movement = Movement::new(format!("m{}-{}", d, bags), day(d), kind)
                    .with_variety("Sona")
                    .with_bags(bags, dec("26"))
                    .from_location(from)
                    .to_location(to)
                    .with_source_packaging("plain", dec("50"))
                    .with_shortage_kg(Decimal::from(bags % 5))
                    .with_status(status);
                match (kind, outturn) {
                    // paddy bought straight into a batch, or shifted into one
                    (MovementKind::Purchase, Some(code)) => movement.with_outturn(code),
                    (MovementKind::ProductionShift, code) => movement.with_outturn(code.unwrap_or("OT-1")),
                    (MovementKind::Production, code) => movement
                        .with_category(ProductCategory::Rice)
                        .with_outturn(code.unwrap_or("OT-1")),
                    _ => movement,
                }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn seeded_replay_matches_full_replay(
            movements in prop::collection::vec(arb_movement(), 1..40),
            closed_on in prop::option::of(2u32..14),
            cleared_on in prop::option::of(2u32..14),
            cutoff in 2u32..14,
        ) {
            let config = LedgerConfig::default();
            let mut events = LedgerEvents::new(movements);
            if let Some(d) = closed_on {
                events.closures.push(LocationClosure { location_code: "k1".to_string(), closed_date: day(d) });
            }
            if let Some(d) = cleared_on {
                events.clearings.push(OutturnClearing { outturn_code: "ot 1".to_string(), cleared_date: day(d) });
            }
            let replayer = Replayer::new(&config);

            let span = DateRange::spanning(events.dates()).unwrap();
            let end = span.end.max(day(cutoff));
            let full = replayer.replay_from(Buckets::new(), &events, DateRange::new(span.start.min(day(cutoff)), end).unwrap());

            let range = DateRange::new(day(cutoff), end).unwrap();
            let seeded = replayer.replay_from(opening_balance(&config, &events, day(cutoff)), &events, range);
            let bounded = replayer.replay(&events, Some(range));

            let sliced: Vec<_> = full.days.iter().filter(|d| range.contains(d.date)).cloned().collect();
            prop_assert_eq!(&sliced, &seeded.days);
            prop_assert_eq!(&sliced, &bounded.days);
        }
    }
}
