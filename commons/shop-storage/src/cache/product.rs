use super::counters::ActivityCounters;
use crate::context::Context;
use crate::error::StorageResult;
use crate::paging::{Page, Paging};
use crate::traits::{ProductStorage, StorageHealth};
use async_trait::async_trait;
use shop_models::{ActivityKey, Category, Product, ProductFilter, Review};
use std::sync::Arc;

/// [`ProductStorage`] that keeps the `productReviews` counter in step
/// with review writes. Reads are not cached.
pub struct CachedProductStorage {
    inner: Arc<dyn ProductStorage>,
    counters: ActivityCounters,
}

impl CachedProductStorage {
    pub fn new(inner: Arc<dyn ProductStorage>, counters: ActivityCounters) -> Self {
        Self { inner, counters }
    }
}

#[async_trait]
impl StorageHealth for CachedProductStorage {
    async fn health(&self) -> StorageResult<()> {
        self.inner.health().await
    }
}

#[async_trait]
impl ProductStorage for CachedProductStorage {
    async fn create_category(
        &self,
        ctx: &Context,
        category: Category,
    ) -> StorageResult<Category> {
        self.inner.create_category(ctx, category).await
    }

    async fn update_category(
        &self,
        ctx: &Context,
        category: &Category,
    ) -> StorageResult<()> {
        self.inner.update_category(ctx, category).await
    }

    async fn delete_category(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        self.inner.delete_category(ctx, id).await
    }

    async fn get_category(&self, ctx: &Context, id: i64) -> StorageResult<Category> {
        self.inner.get_category(ctx, id).await
    }

    async fn list_categories(&self, ctx: &Context) -> StorageResult<Vec<Category>> {
        self.inner.list_categories(ctx).await
    }

    async fn create_product(
        &self,
        ctx: &Context,
        product: Product,
    ) -> StorageResult<Product> {
        self.inner.create_product(ctx, product).await
    }

    async fn update_product(
        &self,
        ctx: &Context,
        product: &Product,
    ) -> StorageResult<()> {
        self.inner.update_product(ctx, product).await
    }

    async fn delete_product(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        self.inner.delete_product(ctx, id).await?;
        // reviews and wishlist entries go with the product
        self.counters.invalidate(ctx).await
    }

    async fn get_product(&self, ctx: &Context, id: i64) -> StorageResult<Product> {
        self.inner.get_product(ctx, id).await
    }

    async fn list_products(
        &self,
        ctx: &Context,
        filter: &ProductFilter,
        paging: &Paging,
    ) -> StorageResult<Page<Product>> {
        self.inner.list_products(ctx, filter, paging).await
    }

    async fn list_products_by_category(
        &self,
        ctx: &Context,
        category_id: i64,
    ) -> StorageResult<Vec<Product>> {
        self.inner.list_products_by_category(ctx, category_id).await
    }

    async fn create_product_categories(
        &self,
        ctx: &Context,
        product_id: i64,
        category_ids: &[i64],
    ) -> StorageResult<()> {
        self.inner
            .create_product_categories(ctx, product_id, category_ids)
            .await
    }

    async fn delete_product_categories(
        &self,
        ctx: &Context,
        product_id: i64,
    ) -> StorageResult<()> {
        self.inner.delete_product_categories(ctx, product_id).await
    }

    async fn create_review(
        &self,
        ctx: &Context,
        review: Review,
    ) -> StorageResult<Review> {
        let created = self.inner.create_review(ctx, review).await?;
        self.counters
            .record(ctx, ActivityKey::ProductReviews, 1)
            .await?;
        Ok(created)
    }

    async fn list_reviews(
        &self,
        ctx: &Context,
        product_name: Option<&str>,
    ) -> StorageResult<Vec<Review>> {
        self.inner.list_reviews(ctx, product_name).await
    }

    async fn delete_review(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        self.inner.delete_review(ctx, id).await?;
        self.counters
            .record(ctx, ActivityKey::ProductReviews, -1)
            .await
    }
}
