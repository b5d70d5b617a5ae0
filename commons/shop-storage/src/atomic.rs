use crate::context::{Context, Transaction};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens physical transactions on a backend.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self, ctx: &Context) -> StorageResult<Arc<dyn Transaction>>;
}

/// Runs a unit of work atomically.
///
/// When the incoming context already carries a transaction the work joins
/// it and nothing else happens: no savepoint, no commit. Otherwise a new
/// transaction is opened, the work runs with a context carrying it, and
/// the transaction is committed on `Ok` or rolled back on `Err`.
#[derive(Clone)]
pub struct AtomicExecutor {
    manager: Arc<dyn TransactionManager>,
}

impl AtomicExecutor {
    pub fn new(manager: Arc<dyn TransactionManager>) -> Self {
        Self { manager }
    }

    pub async fn execute<T, E, F, Fut>(
        &self,
        ctx: &Context,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StorageError>,
    {
        if ctx.in_transaction() {
            return work(ctx.clone()).await;
        }

        let handle = self.manager.begin(ctx).await?;
        let tx_id = handle.id();
        debug!(tx = tx_id, "transaction opened");
        let (tx_ctx, scope) = ctx.with_transaction(handle.clone());

        match work(tx_ctx).await {
            Ok(value) => {
                if let Err(err) = handle.commit().await {
                    if let Err(rollback_err) = handle.rollback().await {
                        warn!(tx = tx_id, error = %rollback_err, "rollback after failed commit failed");
                    }
                    return Err(err.into());
                }
                debug!(tx = tx_id, "transaction committed");
                for hook in scope.take_hooks() {
                    if let Err(err) = hook.await {
                        warn!(tx = tx_id, error = %err, "commit hook failed");
                    }
                }
                Ok(value)
            }
            Err(err) => {
                // The work's error is what the caller sees; a rollback
                // failure is only logged.
                if let Err(rollback_err) = handle.rollback().await {
                    warn!(tx = tx_id, error = %rollback_err, "rollback failed");
                } else {
                    debug!(tx = tx_id, "transaction rolled back");
                }
                Err(err)
            }
        }
    }
}
