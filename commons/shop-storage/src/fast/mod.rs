//! Key-value store with expiry, atomic counters and pub/sub channels.
//!
//! This is the "fast" side of the cache decorators: entity snapshots,
//! activity counters and the counter delta channel all live here.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryFastStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisFastStore;

use crate::error::StorageResult;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::time::Duration;

/// Raw payloads received on one channel, in publish order.
pub type Subscription = BoxStream<'static, String>;

#[async_trait]
pub trait FastStore: Send + Sync {
    /// `Ok(None)` is a miss. Any other failure is an error.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set_ex(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> StorageResult<()>;

    async fn del(&self, key: &str) -> StorageResult<()>;

    /// Atomically adds `delta` to an existing integer key and returns the
    /// new value. A missing or expired key is left alone and yields
    /// `Ok(None)`.
    async fn incr_by(&self, key: &str, delta: i64) -> StorageResult<Option<i64>>;

    async fn incr(&self, key: &str) -> StorageResult<Option<i64>> {
        self.incr_by(key, 1).await
    }

    async fn decr(&self, key: &str) -> StorageResult<Option<i64>> {
        self.incr_by(key, -1).await
    }

    /// Delivers `payload` to current subscribers of `channel` and returns
    /// how many there were. Nothing is retained for later subscribers.
    async fn publish(&self, channel: &str, payload: String) -> StorageResult<usize>;

    async fn subscribe(&self, channel: &str) -> StorageResult<Subscription>;

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}
