//! PostgreSQL batch store: one row per batch holding the summary as a JSON document

use crate::db::{BatchStore, PublicationState, DEFAULT_CLAIM_LEASE};
use crate::error::StoreError;
use crate::models::batch::{BatchId, BatchSummary};
use async_trait::async_trait;
use std::time::Duration;
use tokio_postgres::{Client, NoTls, Row};

/// Rows that may be claimed: never claimed, or claimed longer ago than the lease (`$2` seconds)
const CLAIMABLE: &str = "(publication_state = 'unpublished'
      OR (publication_state = 'claimed'
          AND (claimed_at IS NULL OR claimed_at <= now() - make_interval(secs => $2))))";

pub struct PostgresBatchStore {
    client: Client,
    claim_lease: Duration,
}

impl PostgresBatchStore {
    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        let store = Self {
            client,
            claim_lease: DEFAULT_CLAIM_LEASE,
        };
        store.init_schema().await?;
        Ok(store)
    }

    fn client(&self) -> Result<&Client, StoreError> {
        if self.client.is_closed() {
            return Err(StoreError::Unavailable("connection closed".to_string()));
        }
        Ok(&self.client)
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.client()?
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS batch_results (
                    batch_id TEXT PRIMARY KEY,
                    seq BIGSERIAL,
                    created_at TIMESTAMPTZ NOT NULL,
                    status TEXT NOT NULL,
                    total_results BIGINT NOT NULL,
                    document TEXT NOT NULL,
                    publication_state TEXT NOT NULL DEFAULT 'unpublished',
                    claimed_at TIMESTAMPTZ
                );
                ALTER TABLE batch_results ADD COLUMN IF NOT EXISTS claimed_at TIMESTAMPTZ;
                CREATE INDEX IF NOT EXISTS batch_results_recent
                    ON batch_results (created_at DESC, seq DESC);",
            )
            .await?;
        Ok(())
    }

    /// Leave `claimed` for `to`; clears the lease stamp
    async fn settle(&self, batch_id: BatchId, to: PublicationState) -> Result<(), StoreError> {
        let updated = self
            .client()?
            .execute(
                "UPDATE batch_results SET publication_state = $1, claimed_at = NULL
                 WHERE batch_id = $2 AND publication_state = 'claimed'",
                &[&to.as_str(), &batch_id.to_string()],
            )
            .await?;
        if updated == 0 && self.publication_state(batch_id).await?.is_none() {
            return Err(StoreError::NotFound(batch_id));
        }
        Ok(())
    }
}

fn decode(row: &Row) -> Result<BatchSummary, StoreError> {
    let document: String = row.get("document");
    Ok(serde_json::from_str(&document)?)
}

#[async_trait]
impl BatchStore for PostgresBatchStore {
    async fn save(&self, summary: &BatchSummary) -> Result<bool, StoreError> {
        let document = serde_json::to_string(summary)?;
        let inserted = self
            .client()?
            .execute(
                "INSERT INTO batch_results (batch_id, created_at, status, total_results, document)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (batch_id) DO NOTHING",
                &[
                    &summary.batch_id.to_string(),
                    &summary.created_at,
                    &summary.status.as_str(),
                    &(summary.total_results as i64),
                    &document,
                ],
            )
            .await?;
        Ok(inserted == 1)
    }

    async fn get(&self, batch_id: BatchId) -> Result<Option<BatchSummary>, StoreError> {
        let row = self
            .client()?
            .query_opt(
                "SELECT document FROM batch_results WHERE batch_id = $1",
                &[&batch_id.to_string()],
            )
            .await?;
        row.as_ref().map(decode).transpose()
    }

    async fn get_latest(&self, limit: usize) -> Result<Vec<BatchSummary>, StoreError> {
        let rows = self
            .client()?
            .query(
                "SELECT document FROM batch_results
                 ORDER BY created_at DESC, seq DESC
                 LIMIT $1",
                &[&(limit as i64)],
            )
            .await?;
        rows.iter().map(decode).collect()
    }

    async fn try_claim(&self, batch_id: BatchId) -> Result<bool, StoreError> {
        let query = format!(
            "UPDATE batch_results SET publication_state = 'claimed', claimed_at = now()
             WHERE batch_id = $1 AND {CLAIMABLE}"
        );
        let updated = self
            .client()?
            .execute(
                query.as_str(),
                &[&batch_id.to_string(), &self.claim_lease.as_secs_f64()],
            )
            .await?;
        if updated == 0 && self.publication_state(batch_id).await?.is_none() {
            return Err(StoreError::NotFound(batch_id));
        }
        Ok(updated == 1)
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
        let row = self
            .client()?
            .query_opt(
                "SELECT publication_state FROM batch_results WHERE batch_id = $1",
                &[&batch_id.to_string()],
            )
            .await?;
        Ok(row.and_then(|r| PublicationState::parse(r.get::<_, &str>(0))))
    }

    async fn unpublished(&self, limit: usize) -> Result<Vec<BatchSummary>, StoreError> {
        let query = format!(
            "SELECT document FROM batch_results
             WHERE {CLAIMABLE}
             ORDER BY seq ASC
             LIMIT $1"
        );
        let rows = self
            .client()?
            .query(
                query.as_str(),
                &[&(limit as i64), &self.claim_lease.as_secs_f64()],
            )
            .await?;
        rows.iter().map(decode).collect()
    }
}
