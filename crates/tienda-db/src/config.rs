//! # Back-Office Configuration
//!
//! Loads the database, cache, transaction and report settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TIENDA_DATABASE_PATH=/var/lib/tienda/tienda.db                     │
//! │     TIENDA_REPORT_UTC_OFFSET_MINUTES=-300                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tienda-backoffice/tienda.toml (Linux)                    │
//! │     ~/Library/Application Support/com.tienda.backoffice/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "tienda.db"
//! max_connections = 5
//!
//! [cache]
//! capacity = 1000
//! default_ttl_secs = 300
//! sweep_interval_secs = 60
//!
//! [transactions]
//! timeout_ms = 10000
//! max_wait_ms = 5000
//! isolation = "serializable"
//! max_retries = 3
//! backoff_base_ms = 1000
//!
//! [reports]
//! utc_offset_minutes = 0
//! cache_ttl_secs = 300
//! ```

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use crate::transaction::{IsolationLevel, RetryPolicy, TransactionConfig};

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `:memory:` gives an isolated in-memory database.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a connection waits on a locked database before SQLITE_BUSY.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tienda.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum entries before FIFO eviction.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default = "default_ttl")]
    pub default_ttl_secs: u64,

    /// Interval of the background expiry sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_capacity() -> usize {
    1_000
}
fn default_ttl() -> u64 {
    300
}
fn default_sweep_interval() -> u64 {
    60
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            capacity: default_capacity(),
            default_ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSettings {
    /// Budget for the transaction body.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Budget for acquiring a connection and beginning.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    #[serde(default)]
    pub isolation: IsolationLevel,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on every further attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}
fn default_max_wait_ms() -> u64 {
    5_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1_000
}

impl Default for TransactionSettings {
    fn default() -> Self {
        TransactionSettings {
            timeout_ms: default_timeout_ms(),
            max_wait_ms: default_max_wait_ms(),
            isolation: IsolationLevel::default(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Reporting timezone as minutes east of UTC (month/day buckets).
    #[serde(default)]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            utc_offset_minutes: 0,
            cache_ttl_secs: default_ttl(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete back-office configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TiendaConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub transactions: TransactionSettings,

    #[serde(default)]
    pub reports: ReportSettings,
}

impl TiendaConfig {
    /// Configuration for tests: in-memory database, 1ms retry backoff.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = PathBuf::from(":memory:");
        config.database.max_connections = 1;
        config.transactions.backoff_base_ms = 1;
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tienda.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| DbError::Config(format!("{}: {e}", path.display())))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(DbError::Config("cache.capacity must be greater than 0".into()));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(DbError::Config(
                "cache.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if self.transactions.timeout_ms == 0 || self.transactions.max_wait_ms == 0 {
            return Err(DbError::Config(
                "transaction timeouts must be greater than 0".into(),
            ));
        }
        // chrono accepts strictly less than a day either way
        if self.reports.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(DbError::Config(format!(
                "reports.utc_offset_minutes out of range: {}",
                self.reports.utc_offset_minutes
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TIENDA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = env_parse("TIENDA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = max;
        }

        if let Some(capacity) = env_parse("TIENDA_CACHE_CAPACITY") {
            self.cache.capacity = capacity;
        }

        if let Some(ttl) = env_parse("TIENDA_CACHE_TTL_SECS") {
            self.cache.default_ttl_secs = ttl;
        }

        if let Some(timeout) = env_parse("TIENDA_TX_TIMEOUT_MS") {
            self.transactions.timeout_ms = timeout;
        }

        if let Some(retries) = env_parse("TIENDA_TX_MAX_RETRIES") {
            self.transactions.max_retries = retries;
        }

        if let Some(offset) = env_parse("TIENDA_REPORT_UTC_OFFSET_MINUTES") {
            debug!(offset, "Overriding report offset from environment");
            self.reports.utc_offset_minutes = offset;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tienda", "backoffice")
            .map(|dirs| dirs.config_dir().join("tienda.toml"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    pub fn db_config(&self) -> DbConfig {
        let base = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
        };
        base.busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn transaction_config(&self) -> TransactionConfig {
        TransactionConfig {
            timeout: Duration::from_millis(self.transactions.timeout_ms),
            max_wait: Duration::from_millis(self.transactions.max_wait_ms),
            isolation: self.transactions.isolation,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.transactions.max_retries,
            base_delay: Duration::from_millis(self.transactions.backoff_base_ms),
        }
    }

    pub fn report_offset(&self) -> FixedOffset {
        tienda_core::report::offset_from_minutes(self.reports.utc_offset_minutes)
    }

    pub fn report_ttl(&self) -> Duration {
        Duration::from_secs(self.reports.cache_ttl_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}
