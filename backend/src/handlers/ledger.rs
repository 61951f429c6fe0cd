//! HTTP handlers for ledger replay endpoints

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use stock_ledger::{Dimension, LedgerReport};

use crate::error::{AppError, AppResult};
use crate::services::ledger::{
    AggregateResponse, LedgerService, OpeningBalanceRequest, OpeningBalanceResponse, ReplayRequest,
    SummaryResponse,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    pub dimension: Option<String>,
}

fn service(state: &AppState) -> LedgerService {
    LedgerService::new(
        state.ledger.clone(),
        state.cache.clone(),
        state.config.replay.max_range_days,
    )
}

/// Run CPU-bound replay work off the async workers
async fn blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("replay task failed: {}", e)))?
}

/// Replay raw records into day ledgers
pub async fn replay_ledger(
    State(state): State<AppState>,
    payload: Result<Json<ReplayRequest>, JsonRejection>,
) -> AppResult<Json<LedgerReport>> {
    let Json(request) = payload?;
    let service = service(&state);
    let report = blocking(move || service.replay(&request)).await?;
    tracing::info!(days = report.days.len(), "Ledger replayed");
    Ok(Json(report))
}

/// Roll up the final closing balance by one dimension
pub async fn aggregate_ledger(
    State(state): State<AppState>,
    params: Result<Query<AggregateParams>, QueryRejection>,
    payload: Result<Json<ReplayRequest>, JsonRejection>,
) -> AppResult<Json<AggregateResponse>> {
    let Query(params) = params?;
    let dimension = match params.dimension.as_deref() {
        None => Dimension::ProductCategory,
        Some(raw) => raw
            .parse::<Dimension>()
            .map_err(|err| AppError::validation("dimension", err.to_string()))?,
    };
    let Json(request) = payload?;
    let service = service(&state);
    let response = blocking(move || service.aggregate(&request, dimension)).await?;
    Ok(Json(response))
}

/// Per-day inward, outward and palti totals
pub async fn summarize_ledger(
    State(state): State<AppState>,
    payload: Result<Json<ReplayRequest>, JsonRejection>,
) -> AppResult<Json<SummaryResponse>> {
    let Json(request) = payload?;
    let service = service(&state);
    let response = blocking(move || service.summarize(&request)).await?;
    Ok(Json(response))
}

/// Opening balance as of a date
pub async fn opening_balance(
    State(state): State<AppState>,
    payload: Result<Json<OpeningBalanceRequest>, JsonRejection>,
) -> AppResult<Json<OpeningBalanceResponse>> {
    let Json(request) = payload?;
    let service = service(&state);
    let response = blocking(move || Ok(service.opening_balance(&request))).await?;
    Ok(Json(response))
}
