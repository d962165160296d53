//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BAZAAR_DB_PATH=/var/lib/bazaar/bazaar.db                           │
//! │     BAZAAR_PAYMENT_TIMEOUT_SECS=10                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bazaar/bazaar.toml (Linux)                               │
//! │     ~/Library/Application Support/com.bazaar.bazaar/bazaar.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/bazaar/bazaar.db"
//! max_connections = 5
//!
//! [payment]
//! timeout_secs = 30
//! simulated_delay_ms = 1500
//! simulated_outcome = "approve"   # approve | decline
//!
//! [logging]
//! filter = "info,bazaar=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use bazaar_db::DbConfig;

const CONFIG_FILE: &str = "bazaar.toml";
const DB_FILE: &str = "bazaar.db";

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "bazaar", "bazaar")
        .map(|dirs| dirs.data_dir().join(DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DB_FILE))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Payment Settings
// =============================================================================

/// What the simulated gateway answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedOutcome {
    #[default]
    Approve,
    Decline,
}

impl std::str::FromStr for SimulatedOutcome {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" | "success" => Ok(SimulatedOutcome::Approve),
            "decline" | "failure" => Ok(SimulatedOutcome::Decline),
            other => Err(ConfigError::Invalid(format!(
                "Unknown payment outcome: '{}'. Valid options: approve, decline",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Upper bound on one gateway call. Elapsed means declined.
    #[serde(default = "default_payment_timeout")]
    pub timeout_secs: u64,

    /// Fixed delay of the simulated gateway.
    #[serde(default = "default_simulated_delay")]
    pub simulated_delay_ms: u64,

    #[serde(default)]
    pub simulated_outcome: SimulatedOutcome,
}

fn default_payment_timeout() -> u64 {
    30
}

fn default_simulated_delay() -> u64 {
    1500
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            timeout_secs: default_payment_timeout(),
            simulated_delay_ms: default_simulated_delay(),
            simulated_outcome: SimulatedOutcome::default(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` still wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,bazaar=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`bazaar.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.payment.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "payment.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must not be empty".into()));
        }
        Ok(())
    }

    /// Applies `BAZAAR_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BAZAAR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("BAZAAR_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring BAZAAR_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(secs) = lookup("BAZAAR_PAYMENT_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => self.payment.timeout_secs = n,
                Err(_) => warn!(value = %secs, "Ignoring BAZAAR_PAYMENT_TIMEOUT_SECS"),
            }
        }

        if let Some(ms) = lookup("BAZAAR_PAYMENT_DELAY_MS") {
            match ms.parse::<u64>() {
                Ok(n) => self.payment.simulated_delay_ms = n,
                Err(_) => warn!(value = %ms, "Ignoring BAZAAR_PAYMENT_DELAY_MS"),
            }
        }

        if let Some(outcome) = lookup("BAZAAR_PAYMENT_OUTCOME") {
            match outcome.parse() {
                Ok(parsed) => self.payment.simulated_outcome = parsed,
                Err(e) => warn!("{}", e),
            }
        }

        if let Some(filter) = lookup("BAZAAR_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bazaar", "bazaar")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool settings for [`bazaar_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
        }
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment.timeout_secs)
    }

    pub fn payment_delay(&self) -> Duration {
        Duration::from_millis(self.payment.simulated_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.payment.timeout_secs, 30);
        assert_eq!(config.payment.simulated_outcome, SimulatedOutcome::Approve);
        assert_eq!(config.logging.filter, "info,bazaar=debug,sqlx=warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [payment]
            timeout_secs = 5
            simulated_outcome = "decline"
            "#,
        )
        .unwrap();

        assert_eq!(config.payment.timeout_secs, 5);
        assert_eq!(config.payment.simulated_outcome, SimulatedOutcome::Decline);
        assert_eq!(config.payment.simulated_delay_ms, 1500);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config.apply_env_overrides(env(&[
            ("BAZAAR_DB_PATH", ":memory:"),
            ("BAZAAR_PAYMENT_TIMEOUT_SECS", "7"),
            ("BAZAAR_PAYMENT_DELAY_MS", "not-a-number"),
            ("BAZAAR_PAYMENT_OUTCOME", "failure"),
        ]));

        assert_eq!(config.database.path, PathBuf::from(":memory:"));
        assert_eq!(config.payment_timeout(), Duration::from_secs(7));
        assert_eq!(config.payment.simulated_delay_ms, 1500);
        assert_eq!(config.payment.simulated_outcome, SimulatedOutcome::Decline);
        assert!(config.db_config().is_in_memory());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.payment.timeout_secs = 0;
        assert!(config.validate().is_err());

        config.payment.timeout_secs = 1;
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("bazaar-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[database]\npath = \"/tmp/shop.db\"\nmax_connections = 2\n").unwrap();

        let config = EngineConfig::load(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.database.max_connections, 2);
    }

    #[test]
    fn test_outcome_parsing() {
        assert_eq!("approve".parse::<SimulatedOutcome>().unwrap(), SimulatedOutcome::Approve);
        assert_eq!("DECLINE".parse::<SimulatedOutcome>().unwrap(), SimulatedOutcome::Decline);
        assert!("maybe".parse::<SimulatedOutcome>().is_err());
    }
}
