//! Configuration management for the stock ledger server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SLS_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use stock_ledger::LedgerConfig;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Replay cache configuration
    pub cache: CacheConfig,

    /// Request limits for replay endpoints
    pub replay: ReplayConfig,

    /// Engine tunables
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Replay reports kept in memory; 0 disables caching
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    /// Longest range, in days, one request may replay
    pub max_range_days: u32,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SLS_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let ledger = LedgerConfig::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("cache.capacity", 64)?
            .set_default("replay.max_range_days", 3660)?
            .set_default("ledger.default_bag_size_kg", ledger.default_bag_size_kg.to_string())?
            .set_default("ledger.epsilon", ledger.epsilon.to_string())?
            .set_default(
                "ledger.quintals_per_paddy_bag",
                ledger.quintals_per_paddy_bag.to_string(),
            )?
            .set_default("ledger.direct_load_markers", ledger.direct_load_markers)?
            .set_default("ledger.admin_roles", ledger.admin_roles)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SLS_ prefix)
            .add_source(
                Environment::with_prefix("SLS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("ledger.direct_load_markers")
                    .with_list_parse_key("ledger.admin_roles")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            replay: ReplayConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { max_range_days: 3660 }
    }
}
