//! Rollups over bucket maps and day ledgers
//!
//! All functions here are read-only over their input.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::keys::is_direct_load;
use crate::models::{Buckets, DayLedger, MovementKind, Process, ProductCategory, StockBucket};
use crate::types::Quantity;

/// Bucket dimension a rollup groups by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    ProductCategory,
    Variety,
    Location,
    Packaging,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::ProductCategory,
        Dimension::Variety,
        Dimension::Location,
        Dimension::Packaging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::ProductCategory => "product_category",
            Dimension::Variety => "variety",
            Dimension::Location => "location",
            Dimension::Packaging => "packaging",
        }
    }

    /// Group label of `bucket` under this dimension
    pub fn label(&self, bucket: &StockBucket) -> String {
        let dims = &bucket.dimensions;
        match self {
            Dimension::ProductCategory => dims.product_category.as_str().to_string(),
            Dimension::Variety => variety_label(&dims.variety, dims.process),
            Dimension::Location => location_label(bucket),
            Dimension::Packaging => {
                if dims.packaging.is_empty() {
                    "unbranded".to_string()
                } else {
                    dims.packaging.clone()
                }
            }
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised dimension name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dimension '{0}'")]
pub struct UnknownDimension(pub String);

impl FromStr for Dimension {
    type Err = UnknownDimension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match compact.as_str() {
            "productcategory" | "category" | "product" => Ok(Dimension::ProductCategory),
            "variety" => Ok(Dimension::Variety),
            "location" => Ok(Dimension::Location),
            "packaging" | "brand" => Ok(Dimension::Packaging),
            _ => Err(UnknownDimension(s.to_string())),
        }
    }
}

fn variety_label(variety: &str, process: Process) -> String {
    format!("{} ({})", variety, process.as_str())
}

fn location_label(bucket: &StockBucket) -> String {
    match (&bucket.dimensions.location, &bucket.dimensions.outturn) {
        (Some(location), _) => location.clone(),
        (None, Some(code)) => format!("outturn {}", code),
        (None, None) => String::new(),
    }
}

/// Totals per value of `dimension`.
///
/// Category totals leave out direct-load buckets; the other dimensions cover
/// every bucket.
pub fn aggregate(buckets: &Buckets, dimension: Dimension) -> BTreeMap<String, Quantity> {
    let mut totals: BTreeMap<String, Quantity> = BTreeMap::new();
    for bucket in buckets.iter() {
        if dimension == Dimension::ProductCategory && bucket.dimensions.direct_load {
            continue;
        }
        *totals.entry(dimension.label(bucket)).or_default() += bucket.quantity();
    }
    totals
}

/// One line of a category breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BifurcationLine {
    pub variety: String,
    pub process: Process,
    /// Location, or `outturn <code>` for batch stock
    pub location: String,
    pub packaging: String,
    pub bag_size_kg: Decimal,
    pub direct_load: bool,
    pub quantity: Quantity,
}

/// Break a category's stock into variety/location/packaging lines, in key order
pub fn bifurcate(buckets: &Buckets, category: ProductCategory) -> Vec<BifurcationLine> {
    buckets
        .iter()
        .filter(|b| b.dimensions.product_category == category)
        .map(|b| BifurcationLine {
            variety: b.dimensions.variety.clone(),
            process: b.dimensions.process,
            location: location_label(b),
            packaging: b.dimensions.packaging.clone(),
            bag_size_kg: b.dimensions.bag_size_kg,
            direct_load: b.dimensions.direct_load,
            quantity: b.quantity(),
        })
        .collect()
}

/// Movement totals for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    /// Purchases, loose inward and production, per category
    pub inward: BTreeMap<String, Quantity>,
    /// Sales per category
    pub outward: BTreeMap<String, Quantity>,
    pub palti_count: usize,
    /// Weight lost to palti conversions
    pub palti_shortage_kg: Decimal,
    pub pending_count: usize,
    pub net_change: Quantity,
}

/// Summarize the movements applied on `day`.
///
/// Movements touching a direct-load location on their counted side are left
/// out of the category totals.
pub fn summarize_day(day: &DayLedger, config: &LedgerConfig) -> DaySummary {
    let markers = &config.direct_load_markers;
    let passes_through = |location: Option<&String>| {
        location.is_some_and(|l| is_direct_load(l, markers))
    };

    let mut inward: BTreeMap<String, Quantity> = BTreeMap::new();
    let mut outward: BTreeMap<String, Quantity> = BTreeMap::new();
    let mut palti_count = 0;
    let mut palti_shortage_kg = Decimal::ZERO;

    for movement in &day.movements {
        let category = movement.product_category.as_str().to_string();
        match movement.kind {
            MovementKind::Purchase | MovementKind::Loose | MovementKind::Production => {
                if !passes_through(movement.target_location.as_ref()) {
                    *inward.entry(category).or_default() += movement.quantity();
                }
            }
            MovementKind::Sale => {
                if !passes_through(movement.source_location.as_ref()) {
                    *outward.entry(category).or_default() += movement.quantity();
                }
            }
            MovementKind::Palti => {
                palti_count += 1;
                palti_shortage_kg = palti_shortage_kg.saturating_add(movement.shortage_kg);
            }
            MovementKind::Shift | MovementKind::ProductionShift | MovementKind::Unknown => {}
        }
    }

    DaySummary {
        date: day.date,
        inward,
        outward,
        palti_count,
        palti_shortage_kg,
        pending_count: day.pending.len(),
        net_change: day.net_change(),
    }
}
