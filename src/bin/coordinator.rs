//! Stockscan Coordinator
//!
//! Schedules batches, folds worker outcomes into batch summaries, persists and announces them,
//! and serves the HTTP API. With `QUEUE_BACKEND=memory` the workers run in this process.

use apalis_redis::RedisStorage;
use dotenvy::dotenv;
use std::sync::Arc;
use stockscan::batch::{
    Aggregator, AggregatorConfig, CompletionPublisher, Coordinator, Dispatcher, TaskExecutor,
};
use stockscan::config::{self, QueueBackend, Settings};
use stockscan::core::{http, runtime, scheduler::JobScheduler, watchdog};
use stockscan::db::{BatchStore, MemoryBatchStore, PostgresBatchStore};
use stockscan::jobs::{
    spawn_outcome_consumer, LocalOutcomeSink, LocalTaskQueue, LocalWorkerPool, RedisTaskQueue,
    TaskQueue, WorkerContext,
};
use stockscan::logging;
use stockscan::metrics::Metrics;
use stockscan::models::batch::{TaskOutcome, TaskUnit};
use stockscan::notify::{BroadcastNotifier, Notifier, RedisNotifier};
use stockscan::services::delta::DeltaExchangeProvider;
use stockscan::services::market_data::MarketDataProvider;
use stockscan::strategies::StrategyRegistry;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const LOCAL_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let settings = Settings::from_env()?;
    info!("Starting Stockscan Coordinator");
    info!(environment = %settings.environment, "Environment");
    info!(
        symbols = ?settings.universe.symbols,
        strategies = ?settings.universe.strategies,
        queue = ?settings.queue_backend,
        "Batch universe"
    );

    let metrics = Arc::new(Metrics::new()?);

    let store: Arc<dyn BatchStore> = match config::get_database_url() {
        Some(url) => {
            let store = PostgresBatchStore::connect(&url)
                .await?
                .with_claim_lease(settings.claim_lease);
            info!("PostgreSQL batch store connected");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, batch summaries are kept in memory only");
            Arc::new(MemoryBatchStore::new().with_claim_lease(settings.claim_lease))
        }
    };

    let notifier: Arc<dyn Notifier> =
        match RedisNotifier::connect(&config::get_pubsub_url(), &settings.pubsub_channel).await {
            Ok(notifier) => {
                info!(channel = %settings.pubsub_channel, "Redis notifier connected");
                Arc::new(notifier)
            }
            Err(e) if settings.queue_backend == QueueBackend::Memory => {
                warn!(error = %e, "Redis unavailable, completion events stay in-process");
                Arc::new(BroadcastNotifier::new(64))
            }
            Err(e) => return Err(e.into()),
        };

    let aggregator = Arc::new(Aggregator::new(AggregatorConfig::from_settings(&settings)));
    let publisher = Arc::new(
        CompletionPublisher::new(store.clone(), notifier).with_metrics(metrics.clone()),
    );
    let coordinator = Arc::new(Coordinator::new(aggregator, publisher, metrics.clone()));

    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    let queue: Arc<dyn TaskQueue> = match settings.queue_backend {
        QueueBackend::Redis => {
            info!("Initializing Apalis Redis storage...");
            let conn = apalis_redis::connect(config::get_redis_url()).await?;
            let task_storage: RedisStorage<TaskUnit> = RedisStorage::new(conn.clone());
            let outcome_storage: RedisStorage<TaskOutcome> = RedisStorage::new(conn);
            handles.push(runtime::start_outcome_worker(
                coordinator.clone(),
                outcome_storage,
            ));
            Arc::new(RedisTaskQueue::new(task_storage))
        }
        QueueBackend::Memory => {
            let provider: Arc<dyn MarketDataProvider> = Arc::new(DeltaExchangeProvider::new(
                settings.market_data_url.clone(),
                settings.candle_resolution.clone(),
            ));
            let registry = Arc::new(StrategyRegistry::with_defaults(provider));
            let executor =
                TaskExecutor::new(registry, settings.task_timeout).with_metrics(metrics.clone());

            let (queue, units) = LocalTaskQueue::channel(LOCAL_QUEUE_CAPACITY);
            let (sink, outcomes) = LocalOutcomeSink::channel(LOCAL_QUEUE_CAPACITY);
            let context = Arc::new(WorkerContext::new(executor, Arc::new(sink)));
            handles.extend(
                LocalWorkerPool::spawn(settings.worker_concurrency, units, context).into_handles(),
            );
            handles.push(spawn_outcome_consumer(outcomes, coordinator.clone()));
            Arc::new(queue)
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(coordinator.clone(), queue));
    handles.push(watchdog::spawn_watchdog(
        coordinator.clone(),
        settings.watchdog_interval,
    ));

    let scheduler = match JobScheduler::new(
        dispatcher.clone(),
        settings.universe.clone(),
        settings.schedule_seconds,
    ) {
        Ok(scheduler) => {
            scheduler.start().await;
            Some(scheduler)
        }
        Err(e) => {
            warn!(error = %e, "Scheduler not started, batches only via POST /api/batches");
            None
        }
    };

    let state = http::AppState::new(metrics, store, dispatcher, settings.universe.clone());
    let port = settings.port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = http::start_server(state, port).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("Coordinator started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down coordinator...");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    for handle in handles {
        handle.abort();
    }
    info!("Coordinator stopped");
    Ok(())
}
