//! Stock ledger server
//!
//! A stateless HTTP façade over the replay engine: clients post the raw
//! movement, production, closure and clearing records they already hold and
//! get day-by-day ledgers or rollups back.

use std::sync::{Arc, Mutex};

use axum::{routing::get, Router};
use stock_ledger::{LedgerConfig, ReplayCache};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;

pub use config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger: Arc<LedgerConfig>,
    pub cache: Arc<Mutex<ReplayCache>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let cache = ReplayCache::new(config.cache.capacity);
        Self {
            ledger: Arc::new(config.ledger.clone()),
            config: Arc::new(config),
            cache: Arc::new(Mutex::new(cache)),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Rice Mill Stock Ledger API v1"
}
