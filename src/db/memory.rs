//! In-process batch store for local runs and tests

use crate::db::{BatchStore, PublicationState, DEFAULT_CLAIM_LEASE};
use crate::error::StoreError;
use crate::models::batch::{BatchId, BatchSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

struct Record {
    seq: u64,
    summary: BatchSummary,
    state: PublicationState,
    claimed_at: Option<DateTime<Utc>>,
}

pub struct MemoryBatchStore {
    records: RwLock<HashMap<BatchId, Record>>,
    claim_lease: Duration,
}

impl Default for MemoryBatchStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            claim_lease: DEFAULT_CLAIM_LEASE,
        }
    }
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn lease_lapsed(&self, record: &Record, now: DateTime<Utc>) -> bool {
        match record.claimed_at {
            None => true,
            // a claim stamped in the future (clock step) is still held
            Some(at) => (now - at)
                .to_std()
                .map(|age| age >= self.claim_lease)
                .unwrap_or(false),
        }
    }

    fn claimable(&self, record: &Record, now: DateTime<Utc>) -> bool {
        match record.state {
            PublicationState::Unpublished => true,
            PublicationState::Claimed => self.lease_lapsed(record, now),
            PublicationState::Published => false,
        }
    }

    /// Leave `Claimed` for `to`; clears the lease stamp
    async fn settle(&self, batch_id: BatchId, to: PublicationState) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&batch_id)
            .ok_or(StoreError::NotFound(batch_id))?;
        if record.state == PublicationState::Claimed {
            record.state = to;
            record.claimed_at = None;
        }
        Ok(())
    }
}

#[async_trait]
impl BatchStore for MemoryBatchStore {
    async fn save(&self, summary: &BatchSummary) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&summary.batch_id) {
            return Ok(false);
        }
        let seq = records.len() as u64;
        records.insert(
            summary.batch_id,
            Record {
                seq,
                summary: summary.clone(),
                state: PublicationState::Unpublished,
                claimed_at: None,
            },
        );
        Ok(true)
    }

    async fn get(&self, batch_id: BatchId) -> Result<Option<BatchSummary>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(&batch_id)
            .map(|r| r.summary.clone()))
    }

    async fn get_latest(&self, limit: usize) -> Result<Vec<BatchSummary>, StoreError> {
        let records = self.records.read().await;
        let mut ordered: Vec<&Record> = records.values().collect();
        ordered.sort_by(|a, b| {
            b.summary
                .created_at
                .cmp(&a.summary.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(ordered
            .into_iter()
            .take(limit)
            .map(|r| r.summary.clone())
            .collect())
    }

    async fn try_claim(&self, batch_id: BatchId) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&batch_id)
            .ok_or(StoreError::NotFound(batch_id))?;
        if !self.claimable(record, now) {
            return Ok(false);
        }
        record.state = PublicationState::Claimed;
        record.claimed_at = Some(now);
        Ok(true)
    }

    async fn mark_published(&self, batch_id: BatchId) -> Result<(), StoreError> {
        self.settle(batch_id, PublicationState::Published).await
    }

    async fn release_claim(&self, batch_id: BatchId) -> Result<(), StoreError> {
        self.settle(batch_id, PublicationState::Unpublished).await
    }

    async fn publication_state(
        &self,
        batch_id: BatchId,
    ) -> Result<Option<PublicationState>, StoreError> {
        Ok(self.records.read().await.get(&batch_id).map(|r| r.state))
    }

    async fn unpublished(&self, limit: usize) -> Result<Vec<BatchSummary>, StoreError> {
        let now = Utc::now();
        let records = self.records.read().await;
        let mut pending: Vec<&Record> = records
            .values()
            .filter(|r| self.claimable(r, now))
            .collect();
        pending.sort_by_key(|r| r.seq);
        Ok(pending
            .into_iter()
            .take(limit)
            .map(|r| r.summary.clone())
            .collect())
    }
}
