use async_trait::async_trait;
use redis::AsyncCommands;

use crate::events::event::FailedEvent;

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("fallback store unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),

    #[error("failed event could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable FIFO list shared by the publisher (producer) and the replay
/// worker (consumer). Push and pop must be atomic in the store itself so
/// concurrent publishers and a replay pass never see the same item twice.
#[async_trait]
pub trait FallbackStore: Send + Sync {
    /// Append a failed event to the tail of the list.
    async fn store_failed(&self, event: &FailedEvent) -> Result<(), FallbackError>;

    /// Atomically remove and return the head of the list, if any.
    async fn pop_failed(&self) -> Result<Option<String>, FallbackError>;

    /// Requeue a raw item verbatim at the tail.
    async fn push_back(&self, raw: &str) -> Result<(), FallbackError>;
}

/// Redis-backed store. RPUSH/LPOP are atomic on the server, which is the
/// whole concurrency story here. No dedup, no TTL.
pub struct RedisFallbackStore {
    client: redis::Client,
    key: String,
}

impl RedisFallbackStore {
    pub fn new(url: &str, key: &str) -> Result<Self, FallbackError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            key: key.to_string(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, FallbackError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl FallbackStore for RedisFallbackStore {
    async fn store_failed(&self, event: &FailedEvent) -> Result<(), FallbackError> {
        let raw = serde_json::to_string(event)?;
        let mut conn = self.connection().await?;
        let _: () = conn.rpush(&self.key, raw).await?;
        Ok(())
    }

    async fn pop_failed(&self) -> Result<Option<String>, FallbackError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.lpop(&self.key, None).await?;
        Ok(raw)
    }

    async fn push_back(&self, raw: &str) -> Result<(), FallbackError> {
        let mut conn = self.connection().await?;
        let _: () = conn.rpush(&self.key, raw).await?;
        Ok(())
    }
}
