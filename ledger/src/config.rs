//! Engine configuration
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Optional configuration file (`config/ledger.toml`)
//! 3. Environment variable overrides with `LEDGER__` prefix

use config::{Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Tunables for normalization and replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Bag size assumed when a record carries none
    pub default_bag_size_kg: Decimal,

    /// Buckets whose bags and quintals both fall under this are dropped
    pub epsilon: Decimal,

    /// Quintals of rice yielded per bag of paddy
    pub quintals_per_paddy_bag: Decimal,

    /// Location substrings marking pass-through "direct load" stock
    pub direct_load_markers: Vec<String>,

    /// Creator roles whose movements count without approval
    pub admin_roles: Vec<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_bag_size_kg: Decimal::from(26),
            epsilon: Decimal::new(1, 2),
            quintals_per_paddy_bag: Decimal::new(47, 2),
            direct_load_markers: vec!["direct load".to_string()],
            admin_roles: vec!["admin".to_string()],
        }
    }
}

impl LedgerConfig {
    /// Load configuration from the optional file and environment variables
    pub fn load() -> LedgerResult<Self> {
        Self::load_from("config/ledger")
    }

    /// Load configuration using `path` (without extension) as the file source
    pub fn load_from(path: &str) -> LedgerResult<Self> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default(
                "default_bag_size_kg",
                defaults.default_bag_size_kg.to_string(),
            )?
            .set_default("epsilon", defaults.epsilon.to_string())?
            .set_default(
                "quintals_per_paddy_bag",
                defaults.quintals_per_paddy_bag.to_string(),
            )?
            .set_default("direct_load_markers", defaults.direct_load_markers)?
            .set_default("admin_roles", defaults.admin_roles)?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("LEDGER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("direct_load_markers")
                    .with_list_parse_key("admin_roles")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make replay meaningless
    pub fn validate(&self) -> LedgerResult<()> {
        if self.default_bag_size_kg <= Decimal::ZERO {
            return Err(invalid("default_bag_size_kg", "must be positive"));
        }
        if self.epsilon <= Decimal::ZERO || self.epsilon > Decimal::ONE {
            return Err(invalid("epsilon", "must be in (0, 1]"));
        }
        if self.quintals_per_paddy_bag <= Decimal::ZERO {
            return Err(invalid("quintals_per_paddy_bag", "must be positive"));
        }
        Ok(())
    }

    /// Whether `role` belongs to an administrator
    pub fn is_admin_role(&self, role: &str) -> bool {
        let role = role.trim();
        self.admin_roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

fn invalid(field: &str, message: &str) -> LedgerError {
    LedgerError::InvalidConfig {
        field: field.to_string(),
        message: message.to_string(),
    }
}
