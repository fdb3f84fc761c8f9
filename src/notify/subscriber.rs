//! Consumer side of the completion channel.
//!
//! Delivery is at-least-once, so subscribers drop events whose batch id they have already seen.

use crate::error::NotifyError;
use crate::models::batch::{BatchEvent, BatchId};
use futures_util::StreamExt;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Bounded memory of recently handled batch ids
pub struct SeenBatches {
    capacity: usize,
    order: VecDeque<BatchId>,
    ids: HashSet<BatchId>,
}

impl SeenBatches {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    /// Returns `true` the first time a batch id is offered
    pub fn insert(&mut self, batch_id: BatchId) -> bool {
        if !self.ids.insert(batch_id) {
            return false;
        }
        self.order.push_back(batch_id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }

    pub fn contains(&self, batch_id: &BatchId) -> bool {
        self.ids.contains(batch_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Redis pub/sub subscriber that hands each distinct batch event to a callback
pub struct BatchSubscriber {
    client: redis::Client,
    channel: String,
    seen: SeenBatches,
}

impl BatchSubscriber {
    pub fn new(redis_url: &str, channel: &str) -> Result<Self, NotifyError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            channel: channel.to_string(),
            seen: SeenBatches::new(1024),
        })
    }

    /// Parse a raw payload and apply batch-id dedup. `None` for duplicates.
    pub fn accept(&mut self, payload: &str) -> Result<Option<BatchEvent>, NotifyError> {
        let event: BatchEvent = serde_json::from_str(payload)?;
        if !self.seen.insert(event.batch_id()) {
            debug!(batch_id = %event.batch_id(), "Dropping duplicate batch notification");
            return Ok(None);
        }
        Ok(Some(event))
    }

    /// Listen until the connection closes
    pub async fn run<F, Fut>(&mut self, mut on_event: F) -> Result<(), NotifyError>
    where
        F: FnMut(BatchEvent) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        let mut messages = pubsub.on_message();

        while let Some(message) = messages.next().await {
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "Unreadable notification payload");
                    continue;
                }
            };
            match self.accept(&payload) {
                Ok(Some(event)) => on_event(event).await,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Malformed batch notification"),
            }
        }

        Ok(())
    }
}
