//! In-process queues and worker pool over tokio channels

use crate::batch::coordinator::Coordinator;
use crate::error::QueueError;
use crate::jobs::context::WorkerContext;
use crate::jobs::handlers::apply_outcome;
use crate::jobs::queue::{OutcomeSink, TaskQueue};
use crate::models::batch::{TaskOutcome, TaskUnit};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct LocalTaskQueue {
    sender: mpsc::Sender<TaskUnit>,
}

impl LocalTaskQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TaskUnit>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue(&self, unit: TaskUnit) -> Result<(), QueueError> {
        self.sender.send(unit).await.map_err(|_| QueueError::Closed)
    }
}

#[derive(Clone)]
pub struct LocalOutcomeSink {
    sender: mpsc::Sender<TaskOutcome>,
}

impl LocalOutcomeSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TaskOutcome>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl OutcomeSink for LocalOutcomeSink {
    async fn report(&self, outcome: TaskOutcome) -> Result<(), QueueError> {
        self.sender.send(outcome).await.map_err(|_| QueueError::Closed)
    }
}

/// N tokio workers competing for units on one shared receiver
pub struct LocalWorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl LocalWorkerPool {
    pub fn spawn(
        concurrency: usize,
        units: mpsc::Receiver<TaskUnit>,
        ctx: Arc<WorkerContext>,
    ) -> Self {
        let units = Arc::new(Mutex::new(units));
        let handles = (0..concurrency.max(1))
            .map(|worker| {
                let units = units.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    loop {
                        let next = units.lock().await.recv().await;
                        let Some(unit) = next else { break };
                        let outcome = ctx.executor.execute(&unit).await;
                        if let Err(e) = ctx.outcomes.report(outcome).await {
                            warn!(worker, batch_id = %unit.batch_id, error = %e, "Failed to report outcome");
                        }
                    }
                    debug!(worker, "Local worker stopped");
                })
            })
            .collect();
        info!(concurrency, "Local worker pool started");
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn into_handles(self) -> Vec<JoinHandle<()>> {
        self.handles
    }

    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Drain reported outcomes into the coordinator until every sender is dropped
pub fn spawn_outcome_consumer(
    mut outcomes: mpsc::Receiver<TaskOutcome>,
    coordinator: Arc<Coordinator>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            apply_outcome(&coordinator, outcome).await;
        }
        debug!("Outcome consumer stopped");
    })
}
