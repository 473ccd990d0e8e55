//! Runtime configuration.
//!
//! Layered, later sources win:
//! 1. defaults in code
//! 2. `config/{environment}.toml` (optional)
//! 3. `LOTSTOCK__SECTION__KEY` environment variables

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Deployment environment (selects the config file).
    pub environment: String,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub locking: LockingSettings,
    pub reports: ReportSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// sqlx SQLite URL, e.g. `sqlite://lotstock.db` or `sqlite::memory:`.
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockingSettings {
    /// How long a mutation waits for the per-product lock.
    pub timeout_ms: u64,
    /// Re-runs of a sale after a store version conflict.
    pub sell_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    /// Default horizon of the expiring-batches report.
    pub expiry_window_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
    pub json: bool,
}

impl Default for LockingSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            sell_retries: 3,
        }
    }
}

impl LockingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            expiry_window_days: 30,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

impl Settings {
    pub const ENV_PREFIX: &'static str = "LOTSTOCK";

    /// Load configuration from files and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("LOTSTOCK__ENVIRONMENT")
            .unwrap_or_else(|_| "development".into());
        Self::builder(&environment)?.build()?.try_deserialize()
    }

    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let locking = LockingSettings::default();
        let reports = ReportSettings::default();
        let log = LogSettings::default();

        Ok(config::Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080i64)?
            .set_default("database.url", "sqlite://lotstock.db")?
            .set_default("database.max_connections", 4i64)?
            .set_default("locking.timeout_ms", locking.timeout_ms as i64)?
            .set_default("locking.sell_retries", i64::from(locking.sell_retries))?
            .set_default("reports.expiry_window_days", reports.expiry_window_days)?
            .set_default("log.filter", log.filter)?
            .set_default("log.json", log.json)?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            ))
    }
}
