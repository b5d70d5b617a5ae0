//! Request-scoped context carrying the open transaction (if any) and the
//! caller's cancellation signal.
//!
//! Persistence adapters never look at global state to find a transaction:
//! every port method receives a `&Context` and asks it through
//! [`Context::transaction_as`] whether it should run on the caller's
//! transaction or on the shared connection.

use crate::error::StorageResult;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Deferred work that runs once the surrounding transaction has committed.
pub type CommitHook = BoxFuture<'static, StorageResult<()>>;

/// Backend transaction handle.
///
/// Implementations are owned by one context chain and must not be shared
/// between concurrently running tasks.
#[async_trait]
pub trait Transaction: Send + Sync + 'static {
    fn id(&self) -> u64;
    async fn commit(&self) -> StorageResult<()>;
    async fn rollback(&self) -> StorageResult<()>;
    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct TxScope {
    handle: Arc<dyn Transaction>,
    hooks: Mutex<Vec<CommitHook>>,
}

impl TxScope {
    fn new(handle: Arc<dyn Transaction>) -> Self {
        Self {
            handle,
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn handle(&self) -> &Arc<dyn Transaction> {
        &self.handle
    }

    fn push_hook(&self, hook: CommitHook) {
        self.hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(hook);
    }

    pub(crate) fn take_hooks(&self) -> Vec<CommitHook> {
        std::mem::take(
            &mut *self
                .hooks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

#[derive(Clone)]
pub struct Context {
    scope: Option<Arc<TxScope>>,
    token: CancellationToken,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("tx", &self.scope.as_ref().map(|s| s.handle.id()))
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl Context {
    /// A fresh context with no transaction and its own cancellation token.
    pub fn new() -> Self {
        Self {
            scope: None,
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self { scope: None, token }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn transaction(&self) -> Option<&Arc<dyn Transaction>> {
        self.scope.as_ref().map(|scope| scope.handle())
    }

    /// Returns the open transaction when it belongs to backend `T`.
    pub fn transaction_as<T: Transaction>(&self) -> Option<&T> {
        self.transaction()
            .and_then(|tx| tx.as_any().downcast_ref::<T>())
    }

    pub fn in_transaction(&self) -> bool {
        self.scope.is_some()
    }

    pub(crate) fn with_transaction(
        &self,
        handle: Arc<dyn Transaction>,
    ) -> (Self, Arc<TxScope>) {
        let scope = Arc::new(TxScope::new(handle));
        let ctx = Self {
            scope: Some(scope.clone()),
            token: self.token.clone(),
        };
        (ctx, scope)
    }

    /// Runs `hook` once the current transaction commits, or right away
    /// when no transaction is open. Hooks of a rolled back transaction are
    /// dropped.
    pub async fn on_commit<F>(&self, hook: F) -> StorageResult<()>
    where
        F: Future<Output = StorageResult<()>> + Send + 'static,
    {
        match &self.scope {
            Some(scope) => {
                scope.push_hook(Box::pin(hook));
                Ok(())
            }
            None => hook.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopTx;

    #[async_trait]
    impl Transaction for NoopTx {
        fn id(&self) -> u64 {
            1
        }
        async fn commit(&self) -> StorageResult<()> {
            Ok(())
        }
        async fn rollback(&self) -> StorageResult<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct OtherTx;

    #[async_trait]
    impl Transaction for OtherTx {
        fn id(&self) -> u64 {
            2
        }
        async fn commit(&self) -> StorageResult<()> {
            Ok(())
        }
        async fn rollback(&self) -> StorageResult<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn transaction_accessor_downcasts_per_backend() {
        let ctx = Context::new();
        assert!(ctx.transaction().is_none());

        let (tx_ctx, _scope) = ctx.with_transaction(Arc::new(NoopTx));
        assert!(tx_ctx.transaction_as::<NoopTx>().is_some());
        assert!(tx_ctx.transaction_as::<OtherTx>().is_none());
        assert!(tx_ctx.in_transaction());
        // the parent context is untouched
        assert!(!ctx.in_transaction());
    }

    #[tokio::test]
    async fn commit_hooks_run_immediately_without_transaction() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        Context::new()
            .on_commit(async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn commit_hooks_are_queued_inside_transaction() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (ctx, scope) = Context::new().with_transaction(Arc::new(NoopTx));
        let c = counter.clone();
        ctx.on_commit(async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let hooks = scope.take_hooks();
        assert_eq!(hooks.len(), 1);
        for hook in hooks {
            hook.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
