//! Ledger service: range resolution, cached replay and rollups

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stock_ledger::aggregate::{aggregate, summarize_day, DaySummary};
use stock_ledger::seed::{opening_balance, opening_balance_from_records};
use stock_ledger::{
    Buckets, DateRange, Diagnostic, Diagnostics, Dimension, LedgerConfig, LedgerEvents, LedgerInput,
    LedgerReport, NormalizedInput, Normalizer, Quantity, ReplayCache, ReplayCacheKey, Replayer,
};

use crate::error::{AppError, AppResult};

/// Replay request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayRequest {
    #[serde(default)]
    pub input: LedgerInput,
    /// Pre-aggregated balance rows standing at the start of the range
    #[serde(default, alias = "openingBalance", alias = "opening_balance")]
    pub seed: Vec<Value>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Opening balance request body
#[derive(Debug, Clone, Deserialize)]
pub struct OpeningBalanceRequest {
    #[serde(default)]
    pub input: LedgerInput,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    pub dimension: Dimension,
    /// Day whose closing buckets were rolled up
    pub date: Option<NaiveDate>,
    pub totals: BTreeMap<String, Quantity>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub days: Vec<DaySummary>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpeningBalanceResponse {
    pub as_of: NaiveDate,
    pub buckets: Buckets,
    pub total: Quantity,
    pub diagnostics: Vec<Diagnostic>,
}

/// Stateless façade over the engine, sharing one replay cache
#[derive(Clone)]
pub struct LedgerService {
    config: Arc<LedgerConfig>,
    cache: Arc<Mutex<ReplayCache>>,
    max_range_days: u32,
}

impl LedgerService {
    pub fn new(config: Arc<LedgerConfig>, cache: Arc<Mutex<ReplayCache>>, max_range_days: u32) -> Self {
        Self {
            config,
            cache,
            max_range_days,
        }
    }

    /// Normalize and replay, reusing a cached report when the events repeat.
    ///
    /// With seed rows, movements before the range are taken to be in the seed.
    pub fn replay(&self, request: &ReplayRequest) -> AppResult<LedgerReport> {
        let NormalizedInput {
            events,
            mut diagnostics,
        } = Normalizer::new(&self.config).normalize(&request.input);
        let seed = self.seed(&request.seed, &mut diagnostics);
        let range = match events.resolve_range(request.start, request.end)? {
            None if seed.is_some() => DateRange::spanning(events.dates()),
            range => range,
        };
        self.check_span(&events, range)?;

        let report = self.cached_replay(&events, seed.as_ref(), range)?;
        let mut report = LedgerReport::clone(&report);
        let mut all = diagnostics.into_vec();
        all.append(&mut report.diagnostics);
        report.diagnostics = all;
        Ok(report)
    }

    /// Roll up the closing buckets of the last replayed day
    pub fn aggregate(&self, request: &ReplayRequest, dimension: Dimension) -> AppResult<AggregateResponse> {
        let report = self.replay(request)?;
        let last = report.days.last();
        let totals = last
            .map(|day| aggregate(&day.closing, dimension))
            .unwrap_or_default();
        Ok(AggregateResponse {
            dimension,
            date: last.map(|day| day.date),
            totals,
            diagnostics: report.diagnostics,
        })
    }

    /// Per-day movement totals
    pub fn summarize(&self, request: &ReplayRequest) -> AppResult<SummaryResponse> {
        let report = self.replay(request)?;
        let days = report
            .days
            .iter()
            .map(|day| summarize_day(day, &self.config))
            .collect();
        Ok(SummaryResponse {
            days,
            diagnostics: report.diagnostics,
        })
    }

    /// Buckets standing at the start of `as_of`
    pub fn opening_balance(&self, request: &OpeningBalanceRequest) -> OpeningBalanceResponse {
        let normalized = Normalizer::new(&self.config).normalize(&request.input);
        let buckets = opening_balance(&self.config, &normalized.events, request.as_of);
        OpeningBalanceResponse {
            as_of: request.as_of,
            total: buckets.total(),
            buckets,
            diagnostics: normalized.diagnostics.into_vec(),
        }
    }

    fn seed(&self, rows: &[Value], diagnostics: &mut Diagnostics) -> Option<Buckets> {
        if rows.is_empty() {
            return None;
        }
        let (buckets, seed_diagnostics) = opening_balance_from_records(&self.config, rows);
        diagnostics.extend(seed_diagnostics);
        Some(buckets)
    }

    /// Reject ranges, explicit or spanned by the events, longer than the limit
    fn check_span(&self, events: &LedgerEvents, range: Option<DateRange>) -> AppResult<()> {
        let Some(span) = range.or_else(|| DateRange::spanning(events.dates())) else {
            return Ok(());
        };
        if span.day_count() > i64::from(self.max_range_days) {
            return Err(AppError::validation(
                "end",
                format!(
                    "replay covers {} days ({} to {}); at most {} allowed",
                    span.day_count(),
                    span.start,
                    span.end,
                    self.max_range_days
                ),
            ));
        }
        Ok(())
    }

    fn cached_replay(
        &self,
        events: &LedgerEvents,
        seed: Option<&Buckets>,
        range: Option<DateRange>,
    ) -> AppResult<Arc<LedgerReport>> {
        let key = ReplayCacheKey::new(events, seed, range)?;
        if let Some(report) = self.lock_cache()?.lookup(&key) {
            tracing::debug!(key = key.as_str(), "Serving cached replay");
            return Ok(report);
        }

        // replay outside the lock so concurrent requests are not serialized
        let replayer = Replayer::new(&self.config);
        let report = Arc::new(match (seed, range) {
            (Some(seed), Some(range)) => replayer.replay_from(seed.clone(), events, range),
            _ => replayer.replay(events, range),
        });
        self.lock_cache()?.insert(key, Arc::clone(&report));
        Ok(report)
    }

    fn lock_cache(&self) -> AppResult<std::sync::MutexGuard<'_, ReplayCache>> {
        self.cache
            .lock()
            .map_err(|_| AppError::Internal("replay cache lock poisoned".to_string()))
    }
}
