//! In-process relational backend.
//!
//! Tables live behind one async mutex. Statements outside a transaction
//! take the lock for their own duration; a [`MemoryTx`] keeps it until
//! commit or rollback. Constraints mirror the Postgres schema: unique
//! usernames and emails, composite keys on link tables and foreign keys
//! with cascading deletes from products and categories.

mod products;
mod tx;
mod users;

pub use products::MemoryProductStorage;
pub use tx::MemoryTx;
pub use users::MemoryUserStorage;

use crate::atomic::TransactionManager;
use crate::context::{Context, Transaction};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use shop_models::{Category, Product, Review, User, Wishlist};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    products: BTreeMap<i64, Product>,
    /// (product_id, category_id)
    product_categories: BTreeSet<(i64, i64)>,
    reviews: BTreeMap<i64, Review>,
    /// keyed by (user_id, product_id)
    wishlist: BTreeMap<(i64, i64), Wishlist>,
    last_user_id: i64,
    last_category_id: i64,
    last_product_id: i64,
    last_review_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn user(&self, id: i64) -> StorageResult<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| StorageError::not_found("user", id))
    }

    fn user_mut(&mut self, id: i64) -> StorageResult<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("user", id))
    }

    fn product(&self, id: i64) -> StorageResult<&Product> {
        self.products
            .get(&id)
            .ok_or_else(|| StorageError::not_found("product", id))
    }

    fn category(&self, id: i64) -> StorageResult<&Category> {
        self.categories
            .get(&id)
            .ok_or_else(|| StorageError::not_found("category", id))
    }

    fn require_user_ref(&self, id: i64) -> StorageResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::ConstraintViolation(format!(
                "user {id} does not exist"
            )))
        }
    }

    fn require_product_ref(&self, id: i64) -> StorageResult<()> {
        if self.products.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::ConstraintViolation(format!(
                "product {id} does not exist"
            )))
        }
    }

    fn require_category_ref(&self, id: i64) -> StorageResult<()> {
        if self.categories.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::ConstraintViolation(format!(
                "category {id} does not exist"
            )))
        }
    }
}

/// Shared handle to the in-process tables. Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    tx_seq: Arc<AtomicU64>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` on the caller's transaction if it belongs to this backend,
    /// otherwise as a single statement.
    ///
    /// `f` must check every constraint before its first write so a failed
    /// statement leaves no partial change behind.
    pub(crate) async fn with_tables<R: Send>(
        &self,
        ctx: &Context,
        f: impl FnOnce(&mut Tables) -> StorageResult<R> + Send,
    ) -> StorageResult<R> {
        if let Some(tx) = ctx.transaction_as::<MemoryTx>() {
            return tx.with_tables(f);
        }
        let mut tables = self.tables.lock().await;
        f(&mut tables)
    }
}

#[async_trait]
impl TransactionManager for MemoryDatabase {
    async fn begin(&self, _ctx: &Context) -> StorageResult<Arc<dyn Transaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let id = self.tx_seq.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(tx = id, "memory transaction started");
        Ok(Arc::new(MemoryTx::new(id, guard)))
    }
}
