//! Expands a batch request into task units and submits them

use crate::batch::aggregator::BatchPlan;
use crate::batch::coordinator::Coordinator;
use crate::batch::RetryPolicy;
use crate::error::{DispatchError, QueueError};
use crate::jobs::queue::TaskQueue;
use crate::models::batch::{BatchId, TaskUnit};
use backon::Retryable;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Dispatcher {
    coordinator: Arc<Coordinator>,
    queue: Arc<dyn TaskQueue>,
    retry: RetryPolicy,
}

/// Drop blanks and repeats, keeping first-seen order
fn distinct(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(v.to_string()))
        .map(str::to_string)
        .collect()
}

impl Dispatcher {
    pub fn new(coordinator: Arc<Coordinator>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            coordinator,
            queue,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Register the batch, then enqueue one task unit per (symbol, strategy) pair.
    ///
    /// Returns as soon as every unit is queued. Completion is observed through the
    /// notification channel or the batch store.
    pub async fn submit_batch(
        &self,
        symbols: &[String],
        strategies: &[String],
    ) -> Result<BatchId, DispatchError> {
        let symbols = distinct(symbols);
        let strategies = distinct(strategies);
        if symbols.is_empty() || strategies.is_empty() {
            return Err(DispatchError::EmptyUniverse);
        }

        let plan = BatchPlan::new(symbols, strategies);
        let batch_id = plan.batch_id;
        let total = plan.expected();
        let units: Vec<TaskUnit> = plan
            .keys()
            .enumerate()
            .map(|(i, key)| TaskUnit {
                batch_id,
                symbol: key.symbol,
                strategy_id: key.strategy_id,
                submitted_at: plan.submitted_at,
                sequence: i + 1,
                total,
            })
            .collect();

        info!(
            batch_id = %batch_id,
            symbols = plan.symbols.len(),
            strategies = plan.strategies.len(),
            total,
            "Submitting batch"
        );
        self.coordinator.register(plan).await?;

        for unit in units {
            let (symbol, strategy_id) = (unit.symbol.clone(), unit.strategy_id.clone());
            let queued = (|| async { self.queue.enqueue(unit.clone()).await })
                .retry(self.retry.backoff())
                .sleep(tokio::time::sleep)
                .when(|e| !matches!(e, QueueError::Closed))
                .notify(|e, delay| {
                    warn!(
                        batch_id = %batch_id,
                        symbol = %symbol,
                        strategy_id = %strategy_id,
                        error = %e,
                        ?delay,
                        "Enqueue failed, retrying"
                    );
                })
                .await;

            if let Err(source) = queued {
                error!(
                    batch_id = %batch_id,
                    symbol = %symbol,
                    strategy_id = %strategy_id,
                    error = %source,
                    "Enqueue retries exhausted, aborting batch"
                );
                self.coordinator.abort(batch_id).await;
                return Err(DispatchError::Enqueue {
                    batch_id,
                    symbol,
                    strategy_id,
                    source,
                });
            }
        }

        Ok(batch_id)
    }
}
