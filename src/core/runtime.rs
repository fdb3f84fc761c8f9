//! Apalis worker setup for task units and outcomes

use crate::batch::coordinator::Coordinator;
use crate::jobs::context::WorkerContext;
use crate::jobs::handlers;
use crate::models::batch::{TaskOutcome, TaskUnit};
use apalis::prelude::*;
use apalis_redis::RedisStorage;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Spawns `concurrency` apalis workers that execute task units from Redis
pub struct TaskRuntime {
    context: Arc<WorkerContext>,
    storage: RedisStorage<TaskUnit>,
    concurrency: usize,
}

impl TaskRuntime {
    pub fn new(context: Arc<WorkerContext>, storage: RedisStorage<TaskUnit>) -> Self {
        Self {
            context,
            storage,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Start all workers and return handles for graceful shutdown
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!(
            concurrency = self.concurrency,
            "TaskRuntime: starting {} task workers", self.concurrency
        );

        (0..self.concurrency)
            .map(|i| {
                let storage = self.storage.clone();
                let context = self.context.clone();
                tokio::spawn(async move {
                    let worker = WorkerBuilder::new(format!("task-worker-{i}"))
                        .data(context)
                        .backend(storage)
                        .build_fn(handlers::handle_execute_task);
                    worker.run().await;
                })
            })
            .collect()
    }
}

/// Start the coordinator-side worker that folds reported outcomes into batches
pub fn start_outcome_worker(
    coordinator: Arc<Coordinator>,
    storage: RedisStorage<TaskOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let worker = WorkerBuilder::new("outcome-worker")
            .data(coordinator)
            .backend(storage)
            .build_fn(handlers::handle_task_outcome);

        info!("Outcome worker started");
        worker.run().await;
    })
}
