//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub cached_reports: usize,
}

/// Liveness check
pub async fn health_check() -> &'static str {
    "OK"
}

/// Service status with replay cache occupancy
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let cached_reports = state.cache.lock().map(|cache| cache.len()).unwrap_or_default();

    Json(StatusResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        cached_reports,
    })
}
