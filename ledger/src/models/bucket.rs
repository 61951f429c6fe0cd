//! Stock buckets: the atomic unit of the ledger

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ProductCategory, Process};
use crate::types::Quantity;

/// Dimensions a bucket was keyed on, kept for rollups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDimensions {
    pub variety: String,
    pub process: Process,
    /// Physical location; `None` for outturn buckets
    pub location: Option<String>,
    /// Production batch; `None` for location buckets
    pub outturn: Option<String>,
    pub product_category: ProductCategory,
    pub packaging: String,
    pub bag_size_kg: Decimal,
    /// Pass-through location, left out of category totals
    pub direct_load: bool,
}

/// A keyed running balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBucket {
    pub key: String,
    pub dimensions: BucketDimensions,
    pub bags: Decimal,
    pub quintals: Decimal,
}

impl StockBucket {
    pub fn empty(key: String, dimensions: BucketDimensions) -> Self {
        Self {
            key,
            dimensions,
            bags: Decimal::ZERO,
            quintals: Decimal::ZERO,
        }
    }

    pub fn quantity(&self) -> Quantity {
        Quantity::new(self.bags, self.quintals)
    }

    pub fn is_outturn(&self) -> bool {
        self.dimensions.outturn.is_some()
    }

    fn absorb(&mut self, change: Quantity) {
        let updated = self.quantity() + change;
        self.bags = updated.bags;
        self.quintals = updated.quintals;
    }
}

/// A signed change to one bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delta {
    pub key: String,
    pub dimensions: BucketDimensions,
    pub change: Quantity,
}

/// Running bucket map, ordered by key so snapshots compare and serialize stably
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Buckets {
    entries: BTreeMap<String, StockBucket>,
}

impl Buckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StockBucket> {
        self.entries.get(key)
    }

    /// Current quantity under `key`, zero when absent
    pub fn quantity(&self, key: &str) -> Quantity {
        self.get(key).map(StockBucket::quantity).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StockBucket> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Sum over every bucket
    pub fn total(&self) -> Quantity {
        self.iter().map(StockBucket::quantity).sum()
    }

    /// Apply one delta, creating the bucket on first reference
    pub fn apply(&mut self, delta: &Delta) {
        let bucket = self
            .entries
            .entry(delta.key.clone())
            .or_insert_with(|| StockBucket::empty(delta.key.clone(), delta.dimensions.clone()));
        bucket.absorb(delta.change);
    }

    /// Insert a bucket wholesale, merging into an existing one with the same key
    pub fn insert(&mut self, bucket: StockBucket) {
        match self.entries.get_mut(&bucket.key) {
            Some(existing) => existing.absorb(bucket.quantity()),
            None => {
                self.entries.insert(bucket.key.clone(), bucket);
            }
        }
    }

    /// Drop buckets whose bags and quintals both fall under `epsilon`
    pub fn sweep(&mut self, epsilon: Decimal) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, bucket| !bucket.quantity().is_negligible(epsilon));
        before - self.entries.len()
    }

    /// Remove and return every bucket matching `predicate`
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<StockBucket>
    where
        F: FnMut(&StockBucket) -> bool,
    {
        let keys: Vec<String> = self
            .entries
            .values()
            .filter(|b| predicate(b))
            .map(|b| b.key.clone())
            .collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k))
            .collect()
    }

    /// Buckets belonging to an outturn, in key order
    pub fn outturn_buckets(&self, code: &str) -> Vec<&StockBucket> {
        self.iter()
            .filter(|b| b.dimensions.outturn.as_deref() == Some(code))
            .collect()
    }
}

impl FromIterator<StockBucket> for Buckets {
    fn from_iter<I: IntoIterator<Item = StockBucket>>(iter: I) -> Self {
        let mut buckets = Buckets::new();
        for bucket in iter {
            buckets.insert(bucket);
        }
        buckets
    }
}
