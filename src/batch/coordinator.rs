//! Ties the aggregator to the publisher and keeps failed publications for retry

use crate::batch::aggregator::{Aggregator, BatchPlan, CompletedBatch, Disposition};
use crate::batch::publisher::{CompletionPublisher, PublishReport};
use crate::error::AggregateError;
use crate::metrics::Metrics;
use crate::models::batch::{BatchId, CompletionStatus, TaskOutcome};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Summaries re-announced per watchdog pass
const RECONCILE_LIMIT: usize = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogReport {
    pub timed_out: usize,
    pub stale_orphans: usize,
    pub republished: usize,
    pub reconciled: usize,
}

pub struct Coordinator {
    aggregator: Arc<Aggregator>,
    publisher: Arc<CompletionPublisher>,
    metrics: Arc<Metrics>,
    unpublished: Mutex<Vec<CompletedBatch>>,
}

impl Coordinator {
    pub fn new(
        aggregator: Arc<Aggregator>,
        publisher: Arc<CompletionPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            aggregator,
            publisher,
            metrics,
            unpublished: Mutex::new(Vec::new()),
        }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn publisher(&self) -> &Arc<CompletionPublisher> {
        &self.publisher
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn register(&self, plan: BatchPlan) -> Result<(), AggregateError> {
        let completed = self.aggregator.register(plan).await?;
        self.metrics.batches_submitted_total.inc();
        self.refresh_in_flight().await;
        if let Some(batch) = completed {
            self.finish(batch).await;
        }
        Ok(())
    }

    /// Apply one outcome; publishes the batch when this outcome completes it
    pub async fn on_outcome(&self, outcome: TaskOutcome) -> Result<Disposition, AggregateError> {
        let failed = outcome.is_failed();
        let disposition = match self.aggregator.on_outcome(outcome).await {
            Ok(disposition) => disposition,
            Err(e) => {
                self.metrics.stale_outcomes_total.inc();
                return Err(e);
            }
        };

        match &disposition {
            Disposition::Accepted { .. } | Disposition::Completed(_) => {
                self.metrics.outcomes_received_total.inc();
                if failed {
                    self.metrics.outcomes_failed_total.inc();
                }
            }
            Disposition::Duplicate => self.metrics.duplicate_outcomes_total.inc(),
            Disposition::Discarded(_) => self.metrics.stale_outcomes_total.inc(),
            Disposition::Buffered => {}
        }

        if let Disposition::Completed(batch) = &disposition {
            self.finish(batch.clone()).await;
        }
        Ok(disposition)
    }

    pub async fn abort(&self, batch_id: BatchId) -> bool {
        let aborted = self.aggregator.abort(batch_id).await;
        if aborted {
            self.metrics.batches_aborted_total.inc();
            self.refresh_in_flight().await;
        }
        aborted
    }

    /// One watchdog pass: time out overdue batches, sweep orphans, retry failed publications
    pub async fn tick(&self, now: Instant) -> WatchdogReport {
        let mut report = WatchdogReport::default();

        for batch in self.aggregator.expire_overdue(now).await {
            report.timed_out += 1;
            self.finish(batch).await;
        }

        report.stale_orphans = self.aggregator.sweep(now).await.stale_orphans;
        report.republished = self.retry_unpublished().await;
        report.reconciled = match self.publisher.reconcile(RECONCILE_LIMIT).await {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "Reconciliation failed");
                0
            }
        };
        report
    }

    /// Completed batches whose last publication attempt failed
    pub async fn unpublished_count(&self) -> usize {
        self.unpublished.lock().await.len()
    }

    pub async fn retry_unpublished(&self) -> usize {
        let batches = std::mem::take(&mut *self.unpublished.lock().await);
        let mut published = 0;
        for batch in batches {
            if self.publish(batch).await {
                published += 1;
            }
        }
        published
    }

    async fn finish(&self, batch: CompletedBatch) {
        match batch.status {
            CompletionStatus::Complete => self.metrics.batches_completed_total.inc(),
            CompletionStatus::TimedOut => self.metrics.batches_timed_out_total.inc(),
        }
        self.refresh_in_flight().await;
        self.publish(batch).await;
    }

    async fn publish(&self, batch: CompletedBatch) -> bool {
        let batch_id = batch.batch_id();
        match self.publisher.publish(batch.clone()).await {
            Ok(PublishReport::Published { .. }) => true,
            Ok(PublishReport::Suppressed) => {
                info!(batch_id = %batch_id, "Publication suppressed");
                false
            }
            Err(e) => {
                error!(batch_id = %batch_id, error = %e, "Publication failed, will retry");
                self.unpublished.lock().await.push(batch);
                false
            }
        }
    }

    async fn refresh_in_flight(&self) {
        let in_flight = self.aggregator.in_flight().await;
        self.metrics.batches_in_flight.set(in_flight as i64);
    }
}
