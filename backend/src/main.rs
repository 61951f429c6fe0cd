//! Stock ledger server binary

use stock_ledger_backend::{create_app, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stock_ledger_server=debug,stock_ledger_backend=debug,stock_ledger=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    config.ledger.validate()?;

    tracing::info!("Starting Stock Ledger Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!(
        "Replay cache capacity: {}, epsilon: {}",
        config.cache.capacity,
        config.ledger.epsilon
    );

    let addr = config.bind_address();
    let app = create_app(AppState::new(config));

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
