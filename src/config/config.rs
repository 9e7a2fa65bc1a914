use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// PostgreSQL database connection configuration.
///
/// Stores the append-only delegation snapshot history and the daily
/// aggregates rolled up from it.
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// Read cache configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    /// How long a cached query page stays valid
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_capacity")]
    pub max_capacity: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_capacity: default_cache_max_capacity(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_capacity() -> u64 {
    10_000
}

/// Chain REST API configuration.
///
/// `base_url` points at a Cosmos SDK LCD endpoint; every address in
/// `validators` is polled for its current delegations.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainApiSettings {
    pub base_url: String,
    pub validators: Vec<String>,
    /// Entries requested per upstream page (`pagination.limit`)
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_chain_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_page_limit() -> u32 {
    100
}

fn default_chain_timeout_ms() -> u64 {
    10_000
}

/// Background job configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct JobSettings {
    /// Retries after the first failed attempt of a job transaction
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Deadline of a single job run, retries included
    #[serde(default = "default_job_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_hourly_interval_secs")]
    pub hourly_interval_secs: u64,
    #[serde(default = "default_daily_interval_secs")]
    pub daily_interval_secs: u64,
    /// Offset of the reference timezone snapshots are stamped in.
    /// Defaults to Asia/Jakarta (UTC+7, no DST).
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl JobSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Falls back to UTC when the configured offset is out of range.
    pub fn reference_offset(&self) -> FixedOffset {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_job_timeout_secs(),
            hourly_interval_secs: default_hourly_interval_secs(),
            daily_interval_secs: default_daily_interval_secs(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_job_timeout_secs() -> u64 {
    10
}

fn default_hourly_interval_secs() -> u64 {
    3600
}

fn default_daily_interval_secs() -> u64 {
    86_400
}

fn default_utc_offset_hours() -> i32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root application configuration.
///
/// Loaded once from `config.yaml` at startup, with `TRACKER__SECTION__KEY`
/// environment variables taking precedence. Never reloaded.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub postgres: PostgresSettings,
    pub chain_api: ChainApiSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub jobs: JobSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .add_source(
                Environment::with_prefix("TRACKER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("chain_api.validators")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
