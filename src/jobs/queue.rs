//! Queue seams. Delivery is at-least-once on every backend.

use crate::error::QueueError;
use crate::models::batch::{TaskOutcome, TaskUnit};
use apalis::prelude::*;
use apalis_redis::RedisStorage;
use async_trait::async_trait;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, unit: TaskUnit) -> Result<(), QueueError>;
}

#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn report(&self, outcome: TaskOutcome) -> Result<(), QueueError>;
}

/// Task units pushed to an apalis Redis storage
#[derive(Clone)]
pub struct RedisTaskQueue {
    storage: RedisStorage<TaskUnit>,
}

impl RedisTaskQueue {
    pub fn new(storage: RedisStorage<TaskUnit>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, unit: TaskUnit) -> Result<(), QueueError> {
        let mut storage = self.storage.clone();
        storage
            .push(unit)
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Backend(e.to_string()))
    }
}

/// Outcomes pushed back to the coordinator through an apalis Redis storage
#[derive(Clone)]
pub struct RedisOutcomeSink {
    storage: RedisStorage<TaskOutcome>,
}

impl RedisOutcomeSink {
    pub fn new(storage: RedisStorage<TaskOutcome>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl OutcomeSink for RedisOutcomeSink {
    async fn report(&self, outcome: TaskOutcome) -> Result<(), QueueError> {
        let mut storage = self.storage.clone();
        storage
            .push(outcome)
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Backend(e.to_string()))
    }
}
