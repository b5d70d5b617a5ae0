use super::Tables;
use crate::context::Transaction;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

struct TxState {
    tables: OwnedMutexGuard<Tables>,
    backup: Tables,
}

/// Transaction over a [`MemoryDatabase`](super::MemoryDatabase).
///
/// Holds the table lock from `begin` until it finishes, so transactions
/// run one at a time. Rollback, explicit or on drop, restores the tables
/// as they were at `begin`.
pub struct MemoryTx {
    id: u64,
    state: Mutex<Option<TxState>>,
}

impl MemoryTx {
    pub(super) fn new(id: u64, tables: OwnedMutexGuard<Tables>) -> Self {
        let backup = tables.clone();
        Self {
            id,
            state: Mutex::new(Some(TxState { tables, backup })),
        }
    }

    pub(super) fn with_tables<R>(
        &self,
        f: impl FnOnce(&mut Tables) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = state.as_mut().ok_or_else(|| self.finished())?;
        f(&mut state.tables)
    }

    fn take(&self) -> Option<TxState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn finished(&self) -> StorageError {
        StorageError::Transaction(format!(
            "transaction {} is already finished",
            self.id
        ))
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    fn id(&self) -> u64 {
        self.id
    }

    async fn commit(&self) -> StorageResult<()> {
        match self.take() {
            Some(_) => Ok(()),
            None => Err(self.finished()),
        }
    }

    async fn rollback(&self) -> StorageResult<()> {
        if let Some(mut state) = self.take() {
            *state.tables = state.backup;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(mut state) = self.take() {
            *state.tables = state.backup;
        }
    }
}
