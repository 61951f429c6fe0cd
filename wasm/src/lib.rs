//! WebAssembly bindings for the stock ledger
//!
//! Lets the browser console replay records it already holds:
//! - Day-by-day ledger replay
//! - Closing balance rollups and category bifurcation
//! - Paddy deduction and stock key helpers for forms

use chrono::NaiveDate;
use rust_decimal::prelude::*;
use serde::Serialize;
use stock_ledger::aggregate::{aggregate, bifurcate};
use stock_ledger::effects;
use stock_ledger::keys::build_key;
use stock_ledger::{
    Diagnostic, DiagnosticLevel, Dimension, LedgerConfig, LedgerInput, LedgerReport, NormalizedInput, Normalizer,
    ProductCategory, Replayer,
};
use wasm_bindgen::prelude::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::debug_1(&JsValue::from_str("[stock-ledger] module ready"));
}

/// Replay raw records; `start`/`end` are optional `YYYY-MM-DD` bounds
#[wasm_bindgen]
pub fn replay_ledger(input_json: &str, start: Option<String>, end: Option<String>) -> Result<String, JsValue> {
    run_replay(input_json, start.as_deref(), end.as_deref())
        .and_then(|report| to_json(&report))
        .map_err(|e| JsValue::from_str(&e))
}

/// Roll up the final closing balance by `dimension`
#[wasm_bindgen]
pub fn aggregate_closing(input_json: &str, dimension: &str) -> Result<String, JsValue> {
    closing_totals(input_json, dimension).map_err(|e| JsValue::from_str(&e))
}

/// Break one category of the final closing balance into lines
#[wasm_bindgen]
pub fn bifurcate_closing(input_json: &str, category: &str) -> Result<String, JsValue> {
    closing_lines(input_json, category).map_err(|e| JsValue::from_str(&e))
}

/// Paddy bags a production of `quintals` consumes
#[wasm_bindgen]
pub fn deduct_paddy_bags(quintals: f64, category: &str) -> f64 {
    let config = LedgerConfig::default();
    let quintals = Decimal::try_from(quintals).unwrap_or(Decimal::ZERO);
    let category = ProductCategory::resolve(category).category;
    effects::deduct_paddy_bags(quintals, category, config.quintals_per_paddy_bag)
        .to_f64()
        .unwrap_or(0.0)
}

/// Bucket key a location movement would post to
#[wasm_bindgen]
pub fn stock_key(variety: &str, location: &str, category: &str, packaging: &str, bag_size_kg: f64) -> String {
    let bag_size = Decimal::try_from(bag_size_kg).unwrap_or_else(|_| LedgerConfig::default().default_bag_size_kg);
    build_key(
        variety,
        location,
        ProductCategory::resolve(category).category,
        packaging,
        bag_size,
    )
}

fn run_replay(input_json: &str, start: Option<&str>, end: Option<&str>) -> Result<LedgerReport, String> {
    let input: LedgerInput =
        serde_json::from_str(input_json).map_err(|e| format!("Invalid input JSON: {}", e))?;
    let config = LedgerConfig::default();
    let NormalizedInput { events, diagnostics } = Normalizer::new(&config).normalize(&input);
    let range = events
        .resolve_range(parse_day(start)?, parse_day(end)?)
        .map_err(|e| e.to_string())?;

    let mut report = Replayer::new(&config).replay(&events, range);
    let mut all = diagnostics.into_vec();
    all.append(&mut report.diagnostics);
    report.diagnostics = all;
    forward_warnings(&report.diagnostics);
    Ok(report)
}

fn closing_totals(input_json: &str, dimension: &str) -> Result<String, String> {
    let dimension = dimension.parse::<Dimension>().map_err(|e| e.to_string())?;
    let report = run_replay(input_json, None, None)?;
    let totals = report
        .final_closing()
        .map(|closing| aggregate(closing, dimension))
        .unwrap_or_default();
    to_json(&totals)
}

fn closing_lines(input_json: &str, category: &str) -> Result<String, String> {
    let category = ProductCategory::resolve(category).category;
    let report = run_replay(input_json, None, None)?;
    let lines = report
        .final_closing()
        .map(|closing| bifurcate(closing, category))
        .unwrap_or_default();
    to_json(&lines)
}

fn parse_day(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| format!("Invalid date '{}': {}", s, e)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization failed: {}", e))
}

/// Mirror warning diagnostics to the browser console
fn forward_warnings(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics.iter().filter(|d| d.level == DiagnosticLevel::Warning) {
        let line = match &diagnostic.record_id {
            Some(id) => format!("[stock-ledger] {}: {}", id, diagnostic.message),
            None => format!("[stock-ledger] {}", diagnostic.message),
        };
        console_warn(&line);
    }
}

#[cfg(target_arch = "wasm32")]
fn console_warn(line: &str) {
    web_sys::console::warn_1(&JsValue::from_str(line));
}

#[cfg(not(target_arch = "wasm32"))]
fn console_warn(_line: &str) {}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn replay_round_trips_through_js() {
        let json = replay_ledger(r#"{"movements": []}"#, None, None).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(report["days"].as_array().unwrap().is_empty());
    }
}
