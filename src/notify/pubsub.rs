//! Redis PUBLISH notifier

use crate::error::NotifyError;
use crate::models::batch::BatchEvent;
use crate::notify::Notifier;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

pub struct RedisNotifier {
    conn: ConnectionManager,
    channel: String,
}

impl RedisNotifier {
    pub async fn connect(redis_url: &str, channel: &str) -> Result<Self, NotifyError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            channel: channel.to_string(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn broadcast(&self, event: &BatchEvent) -> Result<usize, NotifyError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&self.channel, payload).await?;
        debug!(
            batch_id = %event.batch_id(),
            channel = %self.channel,
            receivers,
            "Published batch completion"
        );
        Ok(receivers.max(0) as usize)
    }
}
