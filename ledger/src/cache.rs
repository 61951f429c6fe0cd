//! Replay memoization
//!
//! Replay is a pure function of (events, seed, range), so a report can be
//! reused whenever those hash alike.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::LedgerResult;
use crate::models::{Buckets, LedgerEvents, LedgerReport};
use crate::types::DateRange;

/// Content hash of one replay request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplayCacheKey(String);

#[derive(Serialize)]
struct KeyMaterial<'a> {
    events: &'a LedgerEvents,
    seed: Option<&'a Buckets>,
    range: Option<DateRange>,
}

impl ReplayCacheKey {
    pub fn new(events: &LedgerEvents, seed: Option<&Buckets>, range: Option<DateRange>) -> LedgerResult<Self> {
        let material = serde_json::to_vec(&KeyMaterial { events, seed, range })?;
        let digest = Sha256::digest(&material);
        Ok(Self(URL_SAFE_NO_PAD.encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bounded map of finished reports, evicting the oldest entry first
#[derive(Debug)]
pub struct ReplayCache {
    capacity: usize,
    entries: HashMap<ReplayCacheKey, Arc<LedgerReport>>,
    order: VecDeque<ReplayCacheKey>,
    hits: u64,
    misses: u64,
}

impl ReplayCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Peek without touching the hit counters
    pub fn get(&self, key: &ReplayCacheKey) -> Option<Arc<LedgerReport>> {
        self.entries.get(key).cloned()
    }

    /// Fetch and count the outcome as a hit or a miss
    pub fn lookup(&mut self, key: &ReplayCacheKey) -> Option<Arc<LedgerReport>> {
        let found = self.get(key);
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    pub fn insert(&mut self, key: ReplayCacheKey, report: Arc<LedgerReport>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), report).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}
