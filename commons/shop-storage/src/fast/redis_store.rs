//! Redis fast store shared by every service instance.

use super::{FastStore, Subscription};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;
use tracing::{info, warn};

// INCRBY on a missing key would create it at `delta`; counters must only
// move when they hold a recount.
const INCR_EXISTING: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('INCRBY', KEYS[1], ARGV[1])
end
return false
"#;

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::Backend(format!("redis: {err}"))
    }
}

#[derive(Clone)]
pub struct RedisFastStore {
    client: Client,
    conn: ConnectionManager,
    incr_existing: Script,
}

impl RedisFastStore {
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        info!("redis fast store connected");
        Ok(Self {
            client,
            conn,
            incr_existing: Script::new(INCR_EXISTING),
        })
    }
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StorageResult<Option<i64>> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = self
            .incr_existing
            .key(key)
            .arg(delta)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn publish(&self, channel: &str, payload: String) -> StorageResult<usize> {
        let mut conn = self.conn.clone();
        let receivers: usize = conn.publish(channel, payload).await?;
        Ok(receivers)
    }

    /// Opens a dedicated pub/sub connection; dropping the stream closes it.
    async fn subscribe(&self, channel: &str) -> StorageResult<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        let messages = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(error = %e, "dropping non-text pub/sub payload");
                    None
                }
            }
        });
        Ok(messages.boxed())
    }

    async fn ping(&self) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
