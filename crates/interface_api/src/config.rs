//! API configuration
//!
//! Loaded from `API_`-prefixed environment variables; nested keys use a
//! double underscore, e.g. `API_LEDGER__SETTLEMENT_TOLERANCE=0.05` or
//! `API_DATABASE__MAX_CONNECTIONS=20`.

use std::time::Duration;

use serde::Deserialize;

use core_kernel::CoreError;
use domain_folio::LedgerConfig;
use infra_db::{DatabaseConfig, DEFAULT_DATABASE_URL};

/// `database_url` value that selects the in-memory adapters
pub const IN_MEMORY_DATABASE_URL: &str = "memory://";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Connection pool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    /// Apply the ledger schema at startup
    pub apply_schema: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            apply_schema: true,
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL, or `memory://` for the in-memory ledger
    pub database_url: String,
    /// Log level
    pub log_level: String,
    pub log_format: LogFormat,
    pub database: DatabaseSettings,
    pub ledger: LedgerConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            database: DatabaseSettings::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true if the in-memory ledger was requested
    pub fn uses_in_memory_store(&self) -> bool {
        self.database_url == IN_MEMORY_DATABASE_URL
    }

    /// Pool configuration for the PostgreSQL adapters
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }

    /// Rejects configurations the server cannot run with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(CoreError::configuration("jwt_secret must not be empty"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(CoreError::configuration(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }
        self.ledger.validate()
    }
}
