//! Route definitions for the stock ledger server

use axum::{routing::post, Router};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/ledger", ledger_routes())
}

/// Ledger replay routes
fn ledger_routes() -> Router<AppState> {
    Router::new()
        .route("/replay", post(handlers::replay_ledger))
        .route("/aggregate", post(handlers::aggregate_ledger))
        .route("/summary", post(handlers::summarize_ledger))
        .route("/opening-balance", post(handlers::opening_balance))
}
