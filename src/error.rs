//! Error taxonomy for the batch pipeline

use crate::models::batch::BatchId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Failure fetching candles from a market data source
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("market data request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("market data source rejected request: {0}")]
    Api(String),

    #[error("no candles available for {symbol}")]
    Empty { symbol: String },
}

/// A single strategy/symbol execution failure. Recorded as a FAILED outcome, never raised.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error("insufficient data: need {needed} candles, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler disabled: interval_seconds is 0")]
    Disabled,

    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),

    #[error("queue is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("batch {0} is already registered")]
    AlreadyRegistered(BatchId),

    #[error("stale or unknown batch reference: {0}")]
    StaleBatch(BatchId),

    #[error("outcome for {symbol}/{strategy_id} is not part of batch {batch_id}")]
    UnknownPair {
        batch_id: BatchId,
        symbol: String,
        strategy_id: String,
    },
}

/// Dispatch-time failure; the only error surfaced synchronously to `submit_batch` callers
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("batch universe is empty: at least one symbol and one strategy are required")]
    EmptyUniverse,

    #[error("failed to register batch: {0}")]
    Registration(#[from] AggregateError),

    #[error("failed to enqueue {symbol}/{strategy_id} for batch {batch_id}: {source}")]
    Enqueue {
        batch_id: BatchId,
        symbol: String,
        strategy_id: String,
        #[source]
        source: QueueError,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("failed to (de)serialize batch document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("batch store unavailable: {0}")]
    Unavailable(String),

    #[error("batch {0} not found")]
    NotFound(BatchId),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence or broadcast failure after a batch completed
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to persist batch summary: {0}")]
    Store(#[from] StoreError),

    #[error("failed to broadcast batch completion: {0}")]
    Notify(#[from] NotifyError),
}
