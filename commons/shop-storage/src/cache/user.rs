use super::counters::ActivityCounters;
use super::stream::stat_stream;
use crate::context::Context;
use crate::error::StorageResult;
use crate::fast::FastStore;
use crate::traits::{StatStream, StorageHealth, UserStorage};
use async_trait::async_trait;
use shop_models::{
    ActivityKey, ActivityStats, Product, STAT_UPDATE_CHANNEL, User, UserFilter,
    UserRole,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENTITY_TTL: Duration = Duration::from_secs(60);

/// [`UserStorage`] with a fast-store shadow.
///
/// Reads by id are served from `user:{id}` snapshots. Role and password
/// writes invalidate the snapshot. Wishlist writes move the
/// `wishListItems` counter and broadcast its new value. Everything else
/// goes straight to the wrapped port.
///
/// Cached users may be up to one TTL old. Nothing checks freshness on a
/// hit, so the role seen here can lag a role change made through another
/// process until the entry expires.
pub struct CachedUserStorage {
    inner: Arc<dyn UserStorage>,
    fast: Arc<dyn FastStore>,
    counters: ActivityCounters,
    entity_ttl: Duration,
}

impl CachedUserStorage {
    pub fn new(
        inner: Arc<dyn UserStorage>,
        fast: Arc<dyn FastStore>,
        counters: ActivityCounters,
        entity_ttl: Duration,
    ) -> Self {
        Self {
            inner,
            fast,
            counters,
            entity_ttl,
        }
    }

    fn key(id: i64) -> String {
        format!("user:{id}")
    }

    async fn invalidate(&self, ctx: &Context, user_id: i64) -> StorageResult<()> {
        let fast = self.fast.clone();
        let key = Self::key(user_id);
        ctx.on_commit(async move { fast.del(&key).await }).await
    }
}

#[async_trait]
impl StorageHealth for CachedUserStorage {
    async fn health(&self) -> StorageResult<()> {
        self.inner.health().await?;
        self.fast.ping().await
    }
}

#[async_trait]
impl UserStorage for CachedUserStorage {
    async fn create(&self, ctx: &Context, user: User) -> StorageResult<User> {
        self.inner.create(ctx, user).await
    }

    async fn get_by_id(&self, ctx: &Context, id: i64) -> StorageResult<User> {
        let key = Self::key(id);
        if let Some(raw) = self.fast.get(&key).await? {
            debug!(key = %key, "cache hit");
            // A snapshot that no longer decodes is a fault, not a miss.
            return Ok(serde_json::from_str(&raw)?);
        }

        debug!(key = %key, "cache miss");
        let user = self.inner.get_by_id(ctx, id).await?;
        // Rows read inside a transaction may not be committed yet.
        if !ctx.in_transaction() {
            let raw = serde_json::to_string(&user)?;
            self.fast.set_ex(&key, raw, self.entity_ttl).await?;
        }
        Ok(user)
    }

    async fn get_by_id_with_lock(
        &self,
        ctx: &Context,
        id: i64,
    ) -> StorageResult<User> {
        self.inner.get_by_id_with_lock(ctx, id).await
    }

    async fn get_by_username(
        &self,
        ctx: &Context,
        username: &str,
    ) -> StorageResult<User> {
        self.inner.get_by_username(ctx, username).await
    }

    async fn list_users(
        &self,
        ctx: &Context,
        filter: &UserFilter,
    ) -> StorageResult<Vec<User>> {
        self.inner.list_users(ctx, filter).await
    }

    async fn update_role(
        &self,
        ctx: &Context,
        user_id: i64,
        role: UserRole,
    ) -> StorageResult<()> {
        self.inner.update_role(ctx, user_id, role).await?;
        self.invalidate(ctx, user_id).await
    }

    async fn update_password(
        &self,
        ctx: &Context,
        user_id: i64,
        password_hash: &str,
    ) -> StorageResult<()> {
        self.inner
            .update_password(ctx, user_id, password_hash)
            .await?;
        self.invalidate(ctx, user_id).await
    }

    async fn add_to_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> StorageResult<()> {
        self.inner.add_to_wishlist(ctx, user_id, product_id).await?;
        self.counters
            .record(ctx, ActivityKey::WishListItems, 1)
            .await
    }

    async fn remove_from_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> StorageResult<()> {
        self.inner
            .remove_from_wishlist(ctx, user_id, product_id)
            .await?;
        self.counters
            .record(ctx, ActivityKey::WishListItems, -1)
            .await
    }

    async fn get_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
    ) -> StorageResult<Vec<Product>> {
        self.inner.get_wishlist(ctx, user_id).await
    }

    async fn activity_stats(&self, ctx: &Context) -> StorageResult<ActivityStats> {
        self.counters.snapshot(ctx).await
    }

    async fn watch_stats(&self, ctx: &Context) -> StorageResult<StatStream> {
        let subscription = self.fast.subscribe(STAT_UPDATE_CHANNEL).await?;
        Ok(stat_stream(subscription, ctx.cancellation().clone()))
    }
}
