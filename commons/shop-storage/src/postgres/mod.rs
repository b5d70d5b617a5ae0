//! Postgres backend built on `sqlx`.
//!
//! Every statement asks [`PgDatabase::conn`] for a connection. When the
//! context carries a [`PgTx`] the statement runs on that transaction's
//! connection, otherwise on a pooled one.

mod error;
mod products;
mod rows;
mod users;

pub use products::PgProductStorage;
pub use users::PgUserStorage;

use crate::atomic::TransactionManager;
use crate::context::{Context, Transaction};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgConnection, PgPool, Postgres};
use std::any::Any;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Debug, Clone)]
pub struct PgConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub auto_migrate: bool,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/storefront".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(5),
            auto_migrate: false,
        }
    }
}

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    tx_seq: Arc<AtomicU64>,
}

impl PgDatabase {
    pub async fn connect(config: &PgConfig) -> StorageResult<Self> {
        let options = PgConnectOptions::from_str(&config.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Duration::from_secs(5 * 60))
            .max_lifetime(Duration::from_secs(2 * 60 * 60))
            .connect_with(options)
            .await?;
        info!(max_connections = config.max_connections, "postgres pool ready");
        let db = Self::from_pool(pool);
        if config.auto_migrate {
            db.migrate().await?;
        }
        Ok(db)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            tx_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("migration failed: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }

    pub async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) async fn conn<'a>(&self, ctx: &'a Context) -> StorageResult<Conn<'a>> {
        if let Some(tx) = ctx.transaction_as::<PgTx>() {
            return Ok(Conn::Tx(tx.inner.lock().await));
        }
        Ok(Conn::Pool(self.pool.acquire().await?))
    }
}

#[async_trait]
impl TransactionManager for PgDatabase {
    async fn begin(&self, _ctx: &Context) -> StorageResult<Arc<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        let id = self.tx_seq.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(tx = id, "postgres transaction started");
        Ok(Arc::new(PgTx {
            id,
            inner: Mutex::new(Some(tx)),
        }))
    }
}

/// Open Postgres transaction. Dropping it unfinished rolls it back.
pub struct PgTx {
    id: u64,
    inner: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

impl PgTx {
    fn finished(&self) -> StorageError {
        StorageError::Transaction(format!(
            "transaction {} is already finished",
            self.id
        ))
    }
}

#[async_trait]
impl Transaction for PgTx {
    fn id(&self) -> u64 {
        self.id
    }

    async fn commit(&self) -> StorageResult<()> {
        let tx = self.inner.lock().await.take().ok_or_else(|| self.finished())?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> StorageResult<()> {
        if let Some(tx) = self.inner.lock().await.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) enum Conn<'a> {
    Pool(PoolConnection<Postgres>),
    Tx(MutexGuard<'a, Option<sqlx::Transaction<'static, Postgres>>>),
}

impl Conn<'_> {
    pub(crate) fn get(&mut self) -> StorageResult<&mut PgConnection> {
        match self {
            Conn::Pool(conn) => Ok(&mut **conn),
            Conn::Tx(guard) => guard.as_mut().map(|tx| &mut **tx).ok_or_else(|| {
                StorageError::Transaction("transaction is already finished".into())
            }),
        }
    }
}
