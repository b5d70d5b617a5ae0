use super::{FastStore, Subscription};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local [`FastStore`].
///
/// Expired keys are treated as absent on read and dropped on the next
/// write that touches them. Channels are tokio broadcast channels: a
/// subscriber that falls behind by more than the channel capacity skips
/// the messages it missed.
#[derive(Clone)]
pub struct MemoryFastStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
    channel_capacity: usize,
}

impl Default for MemoryFastStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFastStore {
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_channel_capacity(channel_capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
            channel_capacity: channel_capacity.max(1),
        }
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        if let Some(sender) = self.channels.read().await.get(channel) {
            return sender.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .clone()
    }
}

#[async_trait]
impl FastStore for MemoryFastStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set_ex(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> StorageResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StorageResult<Option<i64>> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };
        if !entry.is_live(now) {
            entries.remove(key);
            return Ok(None);
        }
        let current: i64 = entry.value.parse().map_err(|_| {
            StorageError::Backend(format!("value at {key} is not an integer"))
        })?;
        let next = current.checked_add(delta).ok_or_else(|| {
            StorageError::Backend(format!("increment of {key} overflows"))
        })?;
        entry.value = next.to_string();
        Ok(Some(next))
    }

    async fn publish(&self, channel: &str, payload: String) -> StorageResult<usize> {
        let sender = match self.channels.read().await.get(channel) {
            Some(sender) => sender.clone(),
            None => return Ok(0),
        };
        // A send error only means nobody is listening.
        Ok(sender.send(payload).unwrap_or(0))
    }

    async fn subscribe(&self, channel: &str) -> StorageResult<Subscription> {
        let receiver = self.sender(channel).await.subscribe();
        let channel = channel.to_string();
        let stream = BroadcastStream::new(receiver).filter_map(move |message| {
            let payload = match message {
                Ok(payload) => Some(payload),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    debug!(channel = %channel, skipped, "subscriber lagged");
                    None
                }
            };
            futures_util::future::ready(payload)
        });
        Ok(stream.boxed())
    }
}
