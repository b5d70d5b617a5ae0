use crate::context::Context;
use crate::error::{StorageError, StorageResult};
use crate::fast::FastStore;
use crate::traits::UserStorage;
use shop_models::{ActivityKey, ActivityStats, STAT_UPDATE_CHANNEL, UpdatedStat};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_COUNTER_TTL: Duration = Duration::from_secs(60 * 60);

/// Activity counters kept in the fast store.
///
/// Counter keys are the bare activity key names. The authoritative counts
/// come from `source`, which is always the relational port, never a cache
/// decorator.
#[derive(Clone)]
pub struct ActivityCounters {
    fast: Arc<dyn FastStore>,
    source: Arc<dyn UserStorage>,
    ttl: Duration,
    refill_lock: Arc<Mutex<()>>,
}

impl ActivityCounters {
    pub fn new(
        fast: Arc<dyn FastStore>,
        source: Arc<dyn UserStorage>,
        ttl: Duration,
    ) -> Self {
        Self {
            fast,
            source,
            ttl,
            refill_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Reads every counter. If any one of them is cold, all of them are
    /// refilled from the relational store together. Inside a transaction
    /// the recount is returned but not stored, since it may include
    /// uncommitted rows.
    pub async fn snapshot(&self, ctx: &Context) -> StorageResult<ActivityStats> {
        let mut stats = ActivityStats::new();
        for key in ActivityKey::ALL {
            match self.fast.get(key.as_str()).await? {
                Some(raw) => {
                    stats.insert(key, parse_counter(key, &raw)?);
                }
                None => {
                    debug!(key = %key, "activity counter cold");
                    if ctx.in_transaction() {
                        return self.count(ctx).await;
                    }
                    return self.refill(ctx).await;
                }
            }
        }
        Ok(stats)
    }

    /// Records a committed change of `delta` rows for `key`.
    ///
    /// Inside a transaction the counter update and its broadcast wait for
    /// the commit; a rollback discards them. A cold counter is left cold
    /// and nothing is broadcast: only the aggregate read refills counters.
    pub async fn record(
        &self,
        ctx: &Context,
        key: ActivityKey,
        delta: i64,
    ) -> StorageResult<()> {
        let counters = self.clone();
        ctx.on_commit(async move {
            match counters.fast.incr_by(key.as_str(), delta).await? {
                Some(value) => counters.broadcast(UpdatedStat { key, value }).await,
                None => {
                    debug!(key = %key, "activity counter cold, increment skipped");
                    Ok(())
                }
            }
        })
        .await
    }

    /// Drops every counter once the current unit of work commits, so the
    /// next aggregate read recounts them. Used after writes whose effect on
    /// the counters is not known up front, such as cascading deletes.
    pub async fn invalidate(&self, ctx: &Context) -> StorageResult<()> {
        let counters = self.clone();
        ctx.on_commit(async move {
            for key in ActivityKey::ALL {
                counters.fast.del(key.as_str()).await?;
            }
            debug!("activity counters invalidated");
            Ok(())
        })
        .await
    }

    async fn count(&self, ctx: &Context) -> StorageResult<ActivityStats> {
        let fetched = self.source.activity_stats(ctx).await?;
        Ok(ActivityKey::ALL
            .into_iter()
            .map(|key| (key, fetched.get(&key).copied().unwrap_or_default()))
            .collect())
    }

    async fn refill(&self, ctx: &Context) -> StorageResult<ActivityStats> {
        let _guard = self.refill_lock.lock().await;
        let stats = self.count(ctx).await?;
        for (key, value) in &stats {
            self.fast
                .set_ex(key.as_str(), value.to_string(), self.ttl)
                .await?;
        }
        debug!(?stats, "activity counters refilled");
        Ok(stats)
    }

    async fn broadcast(&self, stat: UpdatedStat) -> StorageResult<()> {
        let payload = serde_json::to_string(&stat)?;
        self.fast.publish(STAT_UPDATE_CHANNEL, payload).await?;
        Ok(())
    }
}

fn parse_counter(key: ActivityKey, raw: &str) -> StorageResult<i64> {
    raw.parse().map_err(|_| {
        StorageError::Backend(format!("counter {key} holds a non-integer value"))
    })
}
