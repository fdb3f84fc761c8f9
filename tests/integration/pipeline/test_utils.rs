//! Test utilities for end-to-end pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use stockscan::batch::{
    Aggregator, AggregatorConfig, CompletionPublisher, Coordinator, Dispatcher, TaskExecutor,
};
use stockscan::db::MemoryBatchStore;
use stockscan::error::QueueError;
use stockscan::jobs::{
    spawn_outcome_consumer, LocalOutcomeSink, LocalTaskQueue, LocalWorkerPool, OutcomeSink,
    WorkerContext,
};
use stockscan::metrics::Metrics;
use stockscan::models::batch::{BatchEvent, TaskOutcome};
use stockscan::notify::BroadcastNotifier;
use stockscan::strategies::StrategyRegistry;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Reports every outcome twice, like an at-least-once transport redelivering
pub struct DuplicatingSink {
    inner: LocalOutcomeSink,
}

#[async_trait]
impl OutcomeSink for DuplicatingSink {
    async fn report(&self, outcome: TaskOutcome) -> Result<(), QueueError> {
        self.inner.report(outcome.clone()).await?;
        self.inner.report(outcome).await
    }
}

pub struct PipelineBuilder {
    registry: StrategyRegistry,
    workers: usize,
    config: AggregatorConfig,
    task_timeout: Duration,
    duplicate_outcomes: bool,
}

impl PipelineBuilder {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn duplicate_outcomes(mut self) -> Self {
        self.duplicate_outcomes = true;
        self
    }

    pub fn start(self) -> LocalPipeline {
        let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
        let store = Arc::new(MemoryBatchStore::new());
        let notifier = Arc::new(BroadcastNotifier::new(64));
        let events = notifier.subscribe();

        let publisher =
            CompletionPublisher::new(store.clone(), notifier.clone()).with_metrics(metrics.clone());
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(Aggregator::new(self.config)),
            Arc::new(publisher),
            metrics.clone(),
        ));

        let (queue, units) = LocalTaskQueue::channel(256);
        let (sink, outcomes) = LocalOutcomeSink::channel(256);
        let sink: Arc<dyn OutcomeSink> = if self.duplicate_outcomes {
            Arc::new(DuplicatingSink { inner: sink })
        } else {
            Arc::new(sink)
        };

        let executor = TaskExecutor::new(Arc::new(self.registry), self.task_timeout)
            .with_metrics(metrics.clone());
        let ctx = Arc::new(WorkerContext::new(executor, sink));
        let pool = LocalWorkerPool::spawn(self.workers, units, ctx);
        let consumer = spawn_outcome_consumer(outcomes, coordinator.clone());

        let dispatcher = Arc::new(Dispatcher::new(coordinator.clone(), Arc::new(queue)));

        LocalPipeline {
            dispatcher,
            coordinator,
            store,
            notifier,
            metrics,
            events,
            pool: Some(pool),
            consumer,
        }
    }
}

/// Dispatcher, worker pool, outcome consumer and publisher running in-process
pub struct LocalPipeline {
    pub dispatcher: Arc<Dispatcher>,
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<MemoryBatchStore>,
    pub notifier: Arc<BroadcastNotifier>,
    pub metrics: Arc<Metrics>,
    pub events: broadcast::Receiver<BatchEvent>,
    pool: Option<LocalWorkerPool>,
    consumer: JoinHandle<()>,
}

impl LocalPipeline {
    pub fn builder(registry: StrategyRegistry) -> PipelineBuilder {
        PipelineBuilder {
            registry,
            workers: 4,
            config: AggregatorConfig::default(),
            task_timeout: Duration::from_secs(5),
            duplicate_outcomes: false,
        }
    }

    /// Wait for the next completion event
    pub async fn next_event(&mut self) -> BatchEvent {
        tokio::time::timeout(Duration::from_secs(10), self.events.recv())
            .await
            .expect("completion event within timeout")
            .expect("event channel open")
    }

    /// True when no further event is waiting
    pub fn no_pending_events(&mut self) -> bool {
        matches!(
            self.events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        )
    }

    /// Poll until `check` holds or the deadline passes
    pub async fn wait_until<F>(&self, mut check: F)
    where
        F: FnMut(&Metrics) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while !check(&self.metrics) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not met within timeout"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for LocalPipeline {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
        self.consumer.abort();
    }
}
