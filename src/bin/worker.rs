//! Stockscan Worker
//!
//! Executes task units from the Redis queue and reports outcomes back to the coordinator.
//! Run as many instances as needed.

use apalis_redis::RedisStorage;
use dotenvy::dotenv;
use std::sync::Arc;
use stockscan::batch::TaskExecutor;
use stockscan::config::{self, Settings};
use stockscan::core::runtime::TaskRuntime;
use stockscan::jobs::{RedisOutcomeSink, WorkerContext};
use stockscan::logging;
use stockscan::metrics::Metrics;
use stockscan::models::batch::{TaskOutcome, TaskUnit};
use stockscan::services::delta::DeltaExchangeProvider;
use stockscan::services::market_data::MarketDataProvider;
use stockscan::strategies::StrategyRegistry;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let settings = Settings::from_env()?;
    info!("Starting Stockscan Worker");
    info!(environment = %settings.environment, "Environment");
    info!(
        concurrency = settings.worker_concurrency,
        "Worker concurrency: {}", settings.worker_concurrency
    );

    let metrics = Arc::new(Metrics::new()?);
    let provider: Arc<dyn MarketDataProvider> = Arc::new(DeltaExchangeProvider::new(
        settings.market_data_url.clone(),
        settings.candle_resolution.clone(),
    ));
    let registry = Arc::new(StrategyRegistry::with_defaults(provider));
    info!(strategies = ?registry.ids(), "Strategies registered");

    info!("Initializing Apalis Redis storage...");
    let conn = apalis_redis::connect(config::get_redis_url()).await?;
    let task_storage: RedisStorage<TaskUnit> = RedisStorage::new(conn.clone());
    let outcome_storage: RedisStorage<TaskOutcome> = RedisStorage::new(conn);

    let executor = TaskExecutor::new(registry, settings.task_timeout).with_metrics(metrics);
    let context = Arc::new(WorkerContext::new(
        executor,
        Arc::new(RedisOutcomeSink::new(outcome_storage)),
    ));

    let runtime = TaskRuntime::new(context, task_storage).with_concurrency(settings.worker_concurrency);
    let handles = runtime.start();

    info!("Worker started, waiting for shutdown signal...");
    signal::ctrl_c().await?;
    info!("Shutting down worker...");
    for handle in handles {
        handle.abort();
    }
    info!("Worker stopped");
    Ok(())
}
