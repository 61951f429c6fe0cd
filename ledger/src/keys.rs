//! Composite stock keys
//!
//! Every free-text dimension passes through [`normalize_label`] exactly once,
//! here, so that case and separator variance never produces two buckets for
//! the same stock. Raw and steam grades of a variety are distinct stock and
//! always key apart.

use rust_decimal::Decimal;

use crate::models::{BucketDimensions, ProductCategory, Process};

/// Field separator; [`normalize_label`] strips it from every field
pub const KEY_SEPARATOR: char = '|';

/// Prefix distinguishing outturn-keyed buckets from location buckets
const OUTTURN_PREFIX: &str = "outturn";

/// Trim, lower-case and collapse runs of space, underscore or hyphen into one space
pub fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.trim().chars() {
        if c.is_whitespace() || c == '_' || c == '-' || c == KEY_SEPARATOR {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Split a variety into its base name and process marker.
///
/// A standalone `raw`/`steam` token is preferred; otherwise an embedded
/// occurrence is cut out (`RawVarietyX` -> `varietyx`, raw). Steam wins when
/// both appear. Defaults to raw.
pub fn split_variety(variety: &str) -> (String, Process) {
    let label = normalize_label(variety);
    let tokens: Vec<&str> = label.split(' ').filter(|t| !t.is_empty()).collect();

    let has_steam = tokens.contains(&"steam");
    let has_raw = tokens.contains(&"raw");
    if has_steam || has_raw {
        let base = tokens
            .iter()
            .filter(|t| **t != "steam" && **t != "raw")
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        let process = if has_steam { Process::Steam } else { Process::Raw };
        return (non_empty_or(base, &label), process);
    }

    for (marker, process) in [("steam", Process::Steam), ("raw", Process::Raw)] {
        if let Some(pos) = label.find(marker) {
            let mut base = String::with_capacity(label.len());
            base.push_str(&label[..pos]);
            base.push_str(&label[pos + marker.len()..]);
            let base = normalize_label(&base);
            return (non_empty_or(base, &label), process);
        }
    }

    (label, Process::Raw)
}

fn non_empty_or(base: String, fallback: &str) -> String {
    if base.is_empty() {
        fallback.to_string()
    } else {
        base
    }
}

/// Bag size rounded to two decimals, trailing zeros dropped
pub fn bag_size_label(bag_size_kg: Decimal) -> String {
    bag_size_kg.round_dp(2).normalize().to_string()
}

/// Key of a physical-location bucket
pub fn build_key(
    variety: &str,
    location: &str,
    category: ProductCategory,
    packaging: &str,
    bag_size_kg: Decimal,
) -> String {
    let (base, process) = split_variety(variety);
    [
        base.as_str(),
        process.as_str(),
        &normalize_label(location),
        category.as_str(),
        &normalize_label(packaging),
        &bag_size_label(bag_size_kg),
    ]
    .join(&KEY_SEPARATOR.to_string())
}

/// Key of a production-batch bucket
pub fn build_outturn_key(variety: &str, outturn_code: &str) -> String {
    let (base, process) = split_variety(variety);
    [
        OUTTURN_PREFIX,
        base.as_str(),
        process.as_str(),
        &normalize_label(outturn_code),
    ]
    .join(&KEY_SEPARATOR.to_string())
}

/// Location is a pass-through "direct load" point rather than storage
pub fn is_direct_load(location: &str, markers: &[String]) -> bool {
    let location = normalize_label(location);
    markers
        .iter()
        .map(|m| normalize_label(m))
        .any(|m| !m.is_empty() && location.contains(&m))
}

/// Key and dimensions of a physical-location bucket
pub fn location_bucket(
    variety: &str,
    location: &str,
    category: ProductCategory,
    packaging: &str,
    bag_size_kg: Decimal,
    direct_load_markers: &[String],
) -> (String, BucketDimensions) {
    let (base, process) = split_variety(variety);
    let key = build_key(variety, location, category, packaging, bag_size_kg);
    let dimensions = BucketDimensions {
        variety: base,
        process,
        location: Some(normalize_label(location)),
        outturn: None,
        product_category: category,
        packaging: normalize_label(packaging),
        bag_size_kg: bag_size_kg.round_dp(2).normalize(),
        direct_load: is_direct_load(location, direct_load_markers),
    };
    (key, dimensions)
}

/// Key and dimensions of an outturn bucket
pub fn outturn_bucket(
    variety: &str,
    outturn_code: &str,
    category: ProductCategory,
) -> (String, BucketDimensions) {
    let (base, process) = split_variety(variety);
    let key = build_outturn_key(variety, outturn_code);
    let dimensions = BucketDimensions {
        variety: base,
        process,
        location: None,
        outturn: Some(normalize_label(outturn_code)),
        product_category: category,
        packaging: String::new(),
        bag_size_kg: Decimal::ZERO,
        direct_load: false,
    };
    (key, dimensions)
}
