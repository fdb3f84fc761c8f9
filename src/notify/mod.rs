//! Batch completion notifications

pub mod pubsub;
pub mod subscriber;

pub use pubsub::RedisNotifier;
pub use subscriber::{BatchSubscriber, SeenBatches};

use crate::error::NotifyError;
use crate::models::batch::BatchEvent;
use async_trait::async_trait;
use tokio::sync::broadcast;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Broadcast an event. Returns the number of receivers reached, when the channel reports it.
    async fn broadcast(&self, event: &BatchEvent) -> Result<usize, NotifyError>;
}

/// In-process fan-out over `tokio::sync::broadcast`
pub struct BroadcastNotifier {
    sender: broadcast::Sender<BatchEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn broadcast(&self, event: &BatchEvent) -> Result<usize, NotifyError> {
        // No receivers is not a failure: nobody is listening yet
        Ok(self.sender.send(event.clone()).unwrap_or(0))
    }
}
