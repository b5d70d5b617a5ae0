use crate::config::{CacheConfig, StorageConfig, StorageType};
use anyhow::Result;
use shop_storage::cache::{ActivityCounters, CachedProductStorage, CachedUserStorage};
use shop_storage::fast::{FastStore, MemoryFastStore};
use shop_storage::memory::{MemoryDatabase, MemoryProductStorage, MemoryUserStorage};
use shop_storage::{AtomicExecutor, ProductStorage, TransactionManager, UserStorage};
use std::sync::Arc;
use tracing::info;

/// Ports handed to the services: relational backends behind the cache
/// decorators, plus the executor for their transaction manager.
#[derive(Clone)]
pub struct StorageBundle {
    pub users: Arc<dyn UserStorage>,
    pub products: Arc<dyn ProductStorage>,
    pub executor: AtomicExecutor,
    pub fast: Arc<dyn FastStore>,
}

pub async fn create_storage(
    config: &StorageConfig,
    cache: &CacheConfig,
) -> Result<StorageBundle> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Using in-memory storage");
            let db = MemoryDatabase::new();
            Ok(decorate(
                Arc::new(MemoryUserStorage::new(db.clone())),
                Arc::new(MemoryProductStorage::new(db.clone())),
                Arc::new(db),
                create_fast_store(cache).await?,
                cache,
            ))
        }
        StorageType::Postgres => postgres_storage(config, cache).await,
    }
}

#[cfg(feature = "postgres")]
async fn postgres_storage(
    config: &StorageConfig,
    cache: &CacheConfig,
) -> Result<StorageBundle> {
    use shop_storage::postgres::{PgConfig, PgDatabase, PgProductStorage, PgUserStorage};

    let database = config
        .database
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("postgres storage requires DATABASE_URL"))?;
    let db = PgDatabase::connect(&PgConfig {
        url: database.url.clone(),
        max_connections: database.max_connections,
        acquire_timeout: database.acquire_timeout,
        auto_migrate: database.auto_migrate,
    })
    .await?;
    info!("Using postgres storage");
    Ok(decorate(
        Arc::new(PgUserStorage::new(db.clone())),
        Arc::new(PgProductStorage::new(db.clone())),
        Arc::new(db),
        create_fast_store(cache).await?,
        cache,
    ))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_storage(
    _config: &StorageConfig,
    _cache: &CacheConfig,
) -> Result<StorageBundle> {
    anyhow::bail!("postgres storage is not compiled in, rebuild with --features postgres")
}

/// Redis when `REDIS_URL` is set, otherwise a store private to this
/// process.
pub async fn create_fast_store(cache: &CacheConfig) -> Result<Arc<dyn FastStore>> {
    match cache.redis_url.as_deref() {
        None => {
            info!("Using in-process fast store");
            Ok(Arc::new(MemoryFastStore::new()))
        }
        Some(url) => redis_fast_store(url).await,
    }
}

#[cfg(feature = "redis")]
async fn redis_fast_store(url: &str) -> Result<Arc<dyn FastStore>> {
    let store = shop_storage::fast::RedisFastStore::connect(url).await?;
    info!("Using redis fast store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn redis_fast_store(_url: &str) -> Result<Arc<dyn FastStore>> {
    anyhow::bail!("redis fast store is not compiled in, rebuild with --features redis")
}

/// Wraps relational ports with the cache decorators over `fast`.
pub fn decorate(
    users: Arc<dyn UserStorage>,
    products: Arc<dyn ProductStorage>,
    manager: Arc<dyn TransactionManager>,
    fast: Arc<dyn FastStore>,
    cache: &CacheConfig,
) -> StorageBundle {
    let counters = ActivityCounters::new(fast.clone(), users.clone(), cache.counter_ttl);
    StorageBundle {
        users: Arc::new(CachedUserStorage::new(
            users,
            fast.clone(),
            counters.clone(),
            cache.entity_ttl,
        )),
        products: Arc::new(CachedProductStorage::new(products, counters)),
        executor: AtomicExecutor::new(manager),
        fast,
    }
}
