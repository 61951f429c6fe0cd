//! End-to-end replay scenarios
//!
//! Drives the public API from raw JSON records through to day ledgers and
//! rollups.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use stock_ledger::aggregate::{aggregate, summarize_day, Dimension};
use stock_ledger::keys::build_key;
use stock_ledger::validation::check_report;
use stock_ledger::{
    DateRange, DiagnosticCode, LedgerConfig, LedgerEvents, LedgerInput, Movement, MovementKind, MovementStatus,
    ProductCategory, Quantity, Replayer, MAX_QUANTITY,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

// ============================================================================
// Purchase then palti
// ============================================================================

fn purchase_then_palti() -> LedgerInput {
    serde_json::from_value(json!({
        "movements": [
            {
                "id": "pur-1",
                "date": "2024-06-01",
                "movementType": "purchase",
                "status": "approved",
                "variety": "RawVarietyX",
                "productCategory": "Rice",
                "bags": 100,
                "bagSizeKg": 26,
                "toLocation": "A1"
            },
            {
                "id": "pal-1",
                "date": "2024-06-02",
                "movementType": "palti",
                "status": "approved",
                "variety": "RawVarietyX",
                "productCategory": "Rice",
                "fromLocation": "A1",
                "toLocation": "A2",
                "sourceBagSizeKg": 26,
                "targetBags": 43,
                "targetBagSizeKg": 30,
                "shortageKg": 20
            }
        ]
    }))
    .unwrap()
}

#[test]
fn test_purchase_then_palti() {
    let config = LedgerConfig::default();
    let report = Replayer::new(&config).replay_input(&purchase_then_palti(), None);

    let a1 = build_key("RawVarietyX", "A1", ProductCategory::Rice, "", dec("26"));
    let a2 = build_key("RawVarietyX", "A2", ProductCategory::Rice, "", dec("30"));

    assert_eq!(report.days.len(), 2);
    let (first, second) = (&report.days[0], &report.days[1]);

    assert!(first.opening.is_empty());
    assert_eq!(first.closing.quantity(&a1), Quantity::new(dec("100"), dec("26")));
    assert_eq!(second.opening, first.closing);

    let source = second.closing.quantity(&a1);
    assert_eq!(source.quintals, dec("12.9"));
    let consumed_bags = dec("100") - source.bags;
    assert!((consumed_bags - dec("50.384615")).abs() < dec("0.00001"));

    assert_eq!(second.closing.quantity(&a2), Quantity::new(dec("43"), dec("12.9")));
    assert_eq!(summarize_day(second, &config).palti_shortage_kg, dec("20"));
    assert!(check_report(&report, &config).is_empty());
}

#[test]
fn test_palti_key_keeps_variety_process() {
    let config = LedgerConfig::default();
    let report = Replayer::new(&config).replay_input(&purchase_then_palti(), None);
    let closing = report.final_closing().unwrap();
    assert!(closing.keys().all(|k| k.starts_with("varietyx|raw|")));
}

// ============================================================================
// Paddy through an outturn
// ============================================================================

fn mill_week() -> LedgerInput {
    serde_json::from_value(json!({
        "movements": [
            {"id": 1, "date": "2024-06-01", "type": "purchase", "status": "approved", "variety": "Sona Steam", "product": "Paddy", "bags": 200, "kunchinittu": {"code": "K1"}},
            {"id": 2, "date": "2024-06-02", "type": "production-shift", "status": "approved", "variety": "Sona Steam", "product": "Paddy", "bags": 120, "fromKunchinittu": "K1", "outturnCode": "OT-7"},
            {"id": 3, "date": "2024-06-02", "type": "sale", "status": "pending", "variety": "Sona Steam", "product": "Paddy", "bags": 50, "location": "K1"},
            {"id": 4, "date": "2024-06-03", "type": "mystery", "status": "approved", "bags": 5}
        ],
        "riceProductions": [
            {"id": "r1", "productionDate": "2024-06-03", "status": "approved", "variety": "Sona Steam", "product": "Rice", "bags": 40, "bagSize": 25, "location": "R1", "outturnCode": "OT-7"},
            {"id": "r2", "productionDate": "2024-06-03", "status": "approved", "variety": "Sona Steam", "product": "Bran", "bags": 10, "bagSize": 50, "location": "R2", "outturnCode": "OT-7"}
        ],
        "outturnClearings": [
            {"outturnCode": "OT-7", "clearedAt": "2024-06-05T10:00:00Z"}
        ],
        "locationClosures": [
            {"code": "R2", "closedAt": "2024-06-04"}
        ]
    }))
    .unwrap()
}

#[test]
fn test_mill_week() {
    let config = LedgerConfig::default();
    let report = Replayer::new(&config).replay_input(&mill_week(), None);
    assert_eq!(report.days.len(), 5);

    let second = report.day(day(2)).unwrap();
    assert_eq!(second.pending.len(), 1);
    let paddy = aggregate(&second.closing, Dimension::Location);
    assert_eq!(paddy["k1"].bags, dec("80"));
    assert_eq!(paddy["outturn ot 7"].bags, dec("120"));

    // 10 quintals of rice consume 21 paddy bags; bran consumes none
    let third = report.day(day(3)).unwrap();
    assert_eq!(third.ignored.len(), 1);
    let locations = aggregate(&third.closing, Dimension::Location);
    assert_eq!(locations["outturn ot 7"].bags, dec("99"));
    assert_eq!(locations["r1"].quintals, dec("10"));
    assert_eq!(locations["r2"].quintals, dec("5"));

    let fourth = report.day(day(4)).unwrap();
    assert!(!aggregate(&fourth.closing, Dimension::Location).contains_key("r2"));
    assert_eq!(fourth.write_offs.len(), 1);

    let last = report.day(day(5)).unwrap();
    assert!(last.closing.iter().all(|b| !b.is_outturn()));
    assert_eq!(last.write_offs[0].bucket.bags, dec("99"));

    let varieties = aggregate(&last.closing, Dimension::Variety);
    assert_eq!(varieties.keys().collect::<Vec<_>>(), vec!["sona (steam)"]);
    assert!(check_report(&report, &config).is_empty());
}

#[test]
fn test_bounded_range_matches_full_slice() {
    let config = LedgerConfig::default();
    let replayer = Replayer::new(&config);
    let input = mill_week();

    let full = replayer.replay_input(&input, None);
    let range = DateRange::new(day(3), day(4)).unwrap();
    let bounded = replayer.replay_input(&input, Some(range));

    let sliced: Vec<_> = full.days.into_iter().filter(|d| range.contains(d.date)).collect();
    assert_eq!(sliced, bounded.days);
}

#[test]
fn test_malformed_records_never_fail() {
    let config = LedgerConfig::default();
    let input: LedgerInput = serde_json::from_value(json!({
        "movements": [
            null,
            "garbage",
            {"date": "not a date"},
            {"date": "2024-06-01", "type": "loose", "status": "approved", "bags": "many", "location": "A1"},
            {"date": "2024-06-01", "type": "shift", "status": "approved", "bags": 3}
        ]
    }))
    .unwrap();
    let report = Replayer::new(&config).replay_input(&input, None);

    assert_eq!(report.days.len(), 1);
    assert_eq!(report.days[0].ignored.len(), 1);
    assert!(report.days[0].closing.is_empty());
    assert!(report.diagnostics.len() >= 4);
}

// ============================================================================
// Out-of-range quantities
// ============================================================================

#[test]
fn test_extreme_quantities_are_capped() {
    let config = LedgerConfig::default();
    let input: LedgerInput = serde_json::from_value(json!({
        "movements": [
            {"id": "p1", "date": "2024-06-01", "type": "purchase", "status": "approved", "variety": "Sona",
             "bags": 1000, "bagSizeKg": "79228162514264337593543950335", "location": "A1"},
            {"id": "p2", "date": "2024-06-01", "type": "purchase", "status": "approved", "variety": "Sona",
             "bags": "90000000000000000000", "bagSizeKg": 26, "location": "A2"}
        ],
        "productions": [
            {"id": "r1", "date": "2024-06-01", "status": "approved", "variety": "Sona", "productCategory": "Rice",
             "quantityQuintals": "50000000000000000000000000000", "outturnCode": "OT-9", "location": "R1"}
        ]
    }))
    .unwrap();
    let report = Replayer::new(&config).replay_input(&input, None);

    let closing = &report.days[0].closing;
    let default_size = build_key("Sona", "A1", ProductCategory::Other, "", dec("26"));
    assert_eq!(closing.quantity(&default_size), Quantity::new(dec("1000"), dec("260")));
    let capped_bags = build_key("Sona", "A2", ProductCategory::Other, "", dec("26"));
    assert_eq!(closing.quantity(&capped_bags).bags, MAX_QUANTITY);
    let rice = build_key("Sona", "R1", ProductCategory::Rice, "", dec("26"));
    assert_eq!(closing.quantity(&rice).quintals, MAX_QUANTITY);

    let capped = report
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::UnparseableField)
        .count();
    assert!(capped >= 3);
}

#[test]
fn test_hand_built_extremes_saturate() {
    let config = LedgerConfig::default();
    let events = LedgerEvents::new(vec![
        Movement::new("p1", day(1), MovementKind::Purchase)
            .with_variety("Sona")
            .with_bags(1000, Decimal::MAX)
            .to_location("A1")
            .with_status(MovementStatus::Approved),
        Movement::new("p2", day(1), MovementKind::Purchase)
            .with_variety("Sona")
            .with_bags(1000, Decimal::MAX)
            .to_location("A1")
            .with_status(MovementStatus::Approved),
        Movement::new("r1", day(2), MovementKind::Production)
            .with_variety("Sona")
            .with_category(ProductCategory::Rice)
            .with_quintals(Decimal::MAX)
            .with_outturn("OT-9")
            .to_location("R1")
            .with_status(MovementStatus::Approved),
    ]);
    let report = Replayer::new(&config).replay(&events, None);

    assert_eq!(report.days.len(), 2);
    let a1 = build_key("Sona", "A1", ProductCategory::Other, "", Decimal::MAX);
    let held = report.days[0].closing.quantity(&a1);
    assert_eq!(held.bags, dec("2000"));
    assert!(held.quintals > Decimal::ZERO);
    let rice = build_key("Sona", "R1", ProductCategory::Rice, "", dec("26"));
    assert_eq!(report.days[1].closing.quantity(&rice).quintals, Decimal::MAX);
}
