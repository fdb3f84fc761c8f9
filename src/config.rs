//! Environment-driven configuration

use crate::error::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SYMBOLS: &str = "BTCUSD,ETHUSD,SOLUSD";
pub const DEFAULT_STRATEGIES: &str = "ema_cross,rsi,bollinger,macd,volume_breakout";
pub const DEFAULT_PUBSUB_CHANNEL: &str = "stockanalysis:batch_complete";

/// Deployment environment name (`ENVIRONMENT`), defaults to "sandbox"
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

/// Redis URL used by the task and outcome queues
pub fn get_redis_url() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string())
}

/// Redis URL used for batch completion pub/sub; falls back to `REDIS_URL`
pub fn get_pubsub_url() -> String {
    env::var("REDIS_PUBSUB_URL").unwrap_or_else(|_| get_redis_url())
}

/// Optional PostgreSQL connection string for the batch store
pub fn get_database_url() -> Option<String> {
    env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

/// Which queue implementation carries task units and outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    /// apalis over Redis; workers run as separate processes
    Redis,
    /// in-process channels; workers run inside the coordinator
    Memory,
}

impl FromStr for QueueBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(QueueBackend::Redis),
            "memory" | "local" => Ok(QueueBackend::Memory),
            other => Err(ConfigError::Invalid {
                key: "QUEUE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

/// The symbol × strategy universe submitted on every scheduler tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    pub symbols: Vec<String>,
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub universe: Universe,
    pub schedule_seconds: u64,
    pub batch_timeout: Duration,
    pub orphan_grace: Duration,
    pub watchdog_interval: Duration,
    pub task_timeout: Duration,
    /// How long a publication claim holds before reconciliation may take it over
    pub claim_lease: Duration,
    pub worker_concurrency: usize,
    pub pubsub_channel: String,
    pub queue_backend: QueueBackend,
    pub market_data_url: String,
    pub candle_resolution: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            universe: Universe {
                symbols: split_list(DEFAULT_SYMBOLS),
                strategies: split_list(DEFAULT_STRATEGIES),
            },
            schedule_seconds: 60,
            batch_timeout: Duration::from_secs(300),
            orphan_grace: Duration::from_secs(30),
            watchdog_interval: Duration::from_secs(5),
            task_timeout: Duration::from_secs(30),
            claim_lease: Duration::from_secs(60),
            worker_concurrency: 4,
            pubsub_channel: DEFAULT_PUBSUB_CHANNEL.to_string(),
            queue_backend: QueueBackend::Redis,
            market_data_url: "https://api.india.delta.exchange".to_string(),
            candle_resolution: "15m".to_string(),
            port: 8080,
        }
    }
}

impl Settings {
    /// Build settings from the process environment, using defaults for unset keys
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let symbols = env::var("SYMBOLS")
            .map(|s| split_list(&s))
            .unwrap_or(defaults.universe.symbols);
        let strategies = env::var("STRATEGIES")
            .map(|s| split_list(&s))
            .unwrap_or(defaults.universe.strategies);

        let queue_backend = match env::var("QUEUE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.queue_backend,
        };

        let settings = Self {
            environment: get_environment(),
            universe: Universe {
                symbols,
                strategies,
            },
            schedule_seconds: parse_var("SCHEDULE_SECONDS", defaults.schedule_seconds)?,
            batch_timeout: Duration::from_secs(parse_var(
                "BATCH_TIMEOUT_SECONDS",
                defaults.batch_timeout.as_secs(),
            )?),
            orphan_grace: Duration::from_secs(parse_var(
                "ORPHAN_GRACE_SECONDS",
                defaults.orphan_grace.as_secs(),
            )?),
            watchdog_interval: Duration::from_secs(parse_var(
                "WATCHDOG_INTERVAL_SECONDS",
                defaults.watchdog_interval.as_secs(),
            )?),
            task_timeout: Duration::from_secs(parse_var(
                "TASK_TIMEOUT_SECONDS",
                defaults.task_timeout.as_secs(),
            )?),
            claim_lease: Duration::from_secs(parse_var(
                "CLAIM_LEASE_SECONDS",
                defaults.claim_lease.as_secs(),
            )?),
            worker_concurrency: parse_var("WORKER_CONCURRENCY", defaults.worker_concurrency)?,
            pubsub_channel: env::var("PUBSUB_CHANNEL").unwrap_or(defaults.pubsub_channel),
            queue_backend,
            market_data_url: env::var("MARKET_DATA_URL").unwrap_or(defaults.market_data_url),
            candle_resolution: env::var("CANDLE_RESOLUTION").unwrap_or(defaults.candle_resolution),
            port: parse_var("PORT", defaults.port)?,
        };

        if settings.worker_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKER_CONCURRENCY",
                value: "0".to_string(),
            });
        }
        if settings.watchdog_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "WATCHDOG_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        Ok(settings)
    }
}

/// Split a comma separated list, trimming entries and dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
