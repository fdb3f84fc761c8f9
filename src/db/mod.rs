//! Durable batch summaries and the publication guard

pub mod memory;
pub mod postgres;

pub use memory::MemoryBatchStore;
pub use postgres::PostgresBatchStore;

use crate::error::StoreError;
use crate::models::batch::{BatchId, BatchSummary};
use async_trait::async_trait;
use std::time::Duration;

/// How long a publication claim is honoured before another publisher may take it over
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(60);

/// Publication marker kept next to every stored summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationState {
    Unpublished,
    Claimed,
    Published,
}

impl PublicationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationState::Unpublished => "unpublished",
            PublicationState::Claimed => "claimed",
            PublicationState::Published => "published",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unpublished" => Some(PublicationState::Unpublished),
            "claimed" => Some(PublicationState::Claimed),
            "published" => Some(PublicationState::Published),
            _ => None,
        }
    }
}

#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Insert the summary if no document exists for its batch id.
    /// Returns `false` when a document was already present; the stored one is left untouched.
    async fn save(&self, summary: &BatchSummary) -> Result<bool, StoreError>;

    async fn get(&self, batch_id: BatchId) -> Result<Option<BatchSummary>, StoreError>;

    /// Most recent first by `created_at`, ties broken by insertion order
    async fn get_latest(&self, limit: usize) -> Result<Vec<BatchSummary>, StoreError>;

    /// Atomically move the batch from unpublished to claimed, or take over a claim whose lease
    /// has lapsed. Within one lease only one caller sees `true`.
    async fn try_claim(&self, batch_id: BatchId) -> Result<bool, StoreError>;

    async fn mark_published(&self, batch_id: BatchId) -> Result<(), StoreError>;

    /// Return a claimed batch to unpublished so a later attempt can broadcast it
    async fn release_claim(&self, batch_id: BatchId) -> Result<(), StoreError>;

    async fn publication_state(
        &self,
        batch_id: BatchId,
    ) -> Result<Option<PublicationState>, StoreError>;

    /// Persisted summaries never broadcast, oldest first. Includes claims whose lease has lapsed.
    async fn unpublished(&self, limit: usize) -> Result<Vec<BatchSummary>, StoreError>;
}
