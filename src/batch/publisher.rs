//! Persists a finished batch and announces it once

use crate::batch::aggregator::CompletedBatch;
use crate::batch::RetryPolicy;
use crate::db::BatchStore;
use crate::error::{PublishError, StoreError};
use crate::metrics::Metrics;
use crate::models::batch::{BatchEvent, BatchId, BatchSummary};
use crate::notify::Notifier;
use backon::Retryable;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReport {
    /// This call broadcast the event
    Published { receivers: usize },
    /// Another caller holds or already used the publication claim
    Suppressed,
}

fn transient(e: &StoreError) -> bool {
    matches!(e, StoreError::Database(_) | StoreError::Unavailable(_))
}

pub struct CompletionPublisher {
    store: Arc<dyn BatchStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Option<Arc<Metrics>>,
    retry: RetryPolicy,
}

impl CompletionPublisher {
    pub fn new(store: Arc<dyn BatchStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            metrics: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn BatchStore> {
        &self.store
    }

    pub async fn publish(&self, batch: CompletedBatch) -> Result<PublishReport, PublishError> {
        self.publish_summary(batch.into_summary()).await
    }

    /// Persist (insert-if-absent) then announce. A document already stored for the batch id wins.
    pub async fn publish_summary(
        &self,
        summary: BatchSummary,
    ) -> Result<PublishReport, PublishError> {
        let batch_id = summary.batch_id;
        let inserted = (|| async { self.store.save(&summary).await })
            .retry(self.retry.backoff())
            .sleep(tokio::time::sleep)
            .when(transient)
            .notify(|e, delay| {
                warn!(batch_id = %batch_id, error = %e, ?delay, "Saving batch summary failed, retrying");
            })
            .await
            .inspect_err(|_| self.record_failure())?;

        let summary = if inserted {
            summary
        } else {
            let stored = (|| async { self.store.get(batch_id).await })
                .retry(self.retry.backoff())
                .sleep(tokio::time::sleep)
                .when(transient)
                .await
                .inspect_err(|_| self.record_failure())?;
            stored.unwrap_or(summary)
        };

        self.announce(summary).await
    }

    /// Re-announce summaries that were stored but never broadcast. Returns how many went out.
    pub async fn reconcile(&self, limit: usize) -> Result<usize, PublishError> {
        let stranded = self.store.unpublished(limit).await?;
        let mut published = 0;
        for summary in stranded {
            let batch_id = summary.batch_id;
            match self.announce(summary).await {
                Ok(PublishReport::Published { .. }) => {
                    info!(batch_id = %batch_id, "Reconciled unpublished batch");
                    published += 1;
                }
                Ok(PublishReport::Suppressed) => {}
                Err(e) => warn!(batch_id = %batch_id, error = %e, "Reconciliation attempt failed"),
            }
        }
        Ok(published)
    }

    async fn announce(&self, summary: BatchSummary) -> Result<PublishReport, PublishError> {
        let batch_id = summary.batch_id;

        let claimed = (|| async { self.store.try_claim(batch_id).await })
            .retry(self.retry.backoff())
            .sleep(tokio::time::sleep)
            .when(transient)
            .await
            .inspect_err(|_| self.record_failure())?;
        if !claimed {
            if let Some(metrics) = &self.metrics {
                metrics.notifications_suppressed_total.inc();
            }
            info!(batch_id = %batch_id, "Publication already claimed, suppressing duplicate");
            return Ok(PublishReport::Suppressed);
        }

        let event = BatchEvent::BatchComplete(summary);
        let broadcast = (|| async { self.notifier.broadcast(&event).await })
            .retry(self.retry.backoff())
            .sleep(tokio::time::sleep)
            .notify(|e, delay| {
                warn!(batch_id = %batch_id, error = %e, ?delay, "Broadcast failed, retrying");
            })
            .await;

        match broadcast {
            Ok(receivers) => {
                self.finalize(batch_id).await;
                if let Some(metrics) = &self.metrics {
                    metrics.notifications_published_total.inc();
                }
                info!(
                    batch_id = %batch_id,
                    receivers,
                    results = event.summary().total_results,
                    status = event.summary().status.as_str(),
                    "Batch completion published"
                );
                Ok(PublishReport::Published { receivers })
            }
            Err(e) => {
                if let Err(release) = self.store.release_claim(batch_id).await {
                    error!(
                        batch_id = %batch_id,
                        error = %release,
                        "Failed to release publication claim, reconciliation retries after the lease"
                    );
                }
                self.record_failure();
                Err(e.into())
            }
        }
    }

    /// The event is out. A failure here leaves the marker at `claimed`, so the batch is announced
    /// again once the claim lease lapses.
    async fn finalize(&self, batch_id: BatchId) {
        let marked = (|| async { self.store.mark_published(batch_id).await })
            .retry(self.retry.backoff())
            .sleep(tokio::time::sleep)
            .when(transient)
            .await;
        if let Err(e) = marked {
            error!(batch_id = %batch_id, error = %e, "Failed to mark batch published");
        }
    }

    fn record_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.publication_failures_total.inc();
        }
    }
}
