use crate::errors::ServiceError;
use crate::models::{CategoryRequest, CreateReviewRequest, ProductRequest};
use shop_models::{Category, Product, ProductFilter, ProductStatus, Review};
use shop_storage::{AtomicExecutor, Context, Page, Paging, ProductStorage};
use std::sync::Arc;
use tracing::info;

/// Catalogue and review use cases.
pub struct ProductService {
    storage: Arc<dyn ProductStorage>,
    executor: AtomicExecutor,
}

impl ProductService {
    pub fn new(storage: Arc<dyn ProductStorage>, executor: AtomicExecutor) -> Self {
        Self { storage, executor }
    }

    pub async fn health(&self) -> Result<(), ServiceError> {
        self.storage.health().await.map_err(Into::into)
    }

    pub async fn create_category(
        &self,
        ctx: &Context,
        req: CategoryRequest,
    ) -> Result<Category, ServiceError> {
        info!("Creating category: {}", req.name);
        let category = Category {
            name: req.name,
            description: req.description,
            ..Default::default()
        };
        Ok(self.storage.create_category(ctx, category).await?)
    }

    pub async fn update_category(
        &self,
        ctx: &Context,
        id: i64,
        req: CategoryRequest,
    ) -> Result<(), ServiceError> {
        info!("Updating category: {}", id);
        let category = Category {
            id,
            name: req.name,
            description: req.description,
            ..Default::default()
        };
        Ok(self.storage.update_category(ctx, &category).await?)
    }

    pub async fn delete_category(&self, ctx: &Context, id: i64) -> Result<(), ServiceError> {
        info!("Deleting category: {}", id);
        Ok(self.storage.delete_category(ctx, id).await?)
    }

    pub async fn get_category(&self, ctx: &Context, id: i64) -> Result<Category, ServiceError> {
        Ok(self.storage.get_category(ctx, id).await?)
    }

    pub async fn list_categories(&self, ctx: &Context) -> Result<Vec<Category>, ServiceError> {
        Ok(self.storage.list_categories(ctx).await?)
    }

    /// Creates the product and links it to its categories in one
    /// transaction. The status follows the stock level.
    pub async fn create_product(
        &self,
        ctx: &Context,
        req: ProductRequest,
    ) -> Result<Product, ServiceError> {
        info!("Creating product: {}", req.name);
        let storage = self.storage.clone();
        self.executor
            .execute(ctx, move |tx| async move {
                let product = Product {
                    name: req.name,
                    description: req.description,
                    price: req.price,
                    stock_quantity: req.stock_quantity,
                    status: ProductStatus::for_stock(req.stock_quantity),
                    ..Default::default()
                };
                let created = storage.create_product(&tx, product).await?;
                storage
                    .create_product_categories(&tx, created.id, &req.category_ids)
                    .await?;
                Ok::<_, ServiceError>(created)
            })
            .await
    }

    /// Rewrites the product and replaces its category links.
    pub async fn update_product(
        &self,
        ctx: &Context,
        id: i64,
        req: ProductRequest,
    ) -> Result<Product, ServiceError> {
        info!("Updating product: {}", id);
        let storage = self.storage.clone();
        self.executor
            .execute(ctx, move |tx| async move {
                let current = storage.get_product(&tx, id).await?;
                let product = Product {
                    name: req.name,
                    description: req.description,
                    price: req.price,
                    stock_quantity: req.stock_quantity,
                    status: ProductStatus::for_stock(req.stock_quantity),
                    updated_at: chrono::Utc::now(),
                    ..current
                };
                storage.update_product(&tx, &product).await?;
                storage.delete_product_categories(&tx, id).await?;
                storage
                    .create_product_categories(&tx, id, &req.category_ids)
                    .await?;
                Ok::<_, ServiceError>(product)
            })
            .await
    }

    pub async fn delete_product(&self, ctx: &Context, id: i64) -> Result<(), ServiceError> {
        info!("Deleting product: {}", id);
        Ok(self.storage.delete_product(ctx, id).await?)
    }

    pub async fn get_product(&self, ctx: &Context, id: i64) -> Result<Product, ServiceError> {
        Ok(self.storage.get_product(ctx, id).await?)
    }

    pub async fn list_products(
        &self,
        ctx: &Context,
        filter: &ProductFilter,
        paging: &Paging,
    ) -> Result<Page<Product>, ServiceError> {
        info!(
            cursor = paging.cursor,
            size = paging.size,
            "Listing products with filter: {:?}",
            filter
        );
        Ok(self.storage.list_products(ctx, filter, paging).await?)
    }

    /// Fails with not found when the category does not exist.
    pub async fn list_products_by_category(
        &self,
        ctx: &Context,
        category_id: i64,
    ) -> Result<Vec<Product>, ServiceError> {
        self.storage.get_category(ctx, category_id).await?;
        Ok(self
            .storage
            .list_products_by_category(ctx, category_id)
            .await?)
    }

    pub async fn create_review(
        &self,
        ctx: &Context,
        product_id: i64,
        user_id: i64,
        req: CreateReviewRequest,
    ) -> Result<Review, ServiceError> {
        info!("Creating review of product {} by user {}", product_id, user_id);
        let review = Review {
            product_id,
            user_id,
            rating: req.rating,
            comment: req.comment,
            ..Default::default()
        };
        Ok(self.storage.create_review(ctx, review).await?)
    }

    pub async fn list_reviews(
        &self,
        ctx: &Context,
        product_name: Option<&str>,
    ) -> Result<Vec<Review>, ServiceError> {
        Ok(self.storage.list_reviews(ctx, product_name).await?)
    }

    pub async fn delete_review(&self, ctx: &Context, id: i64) -> Result<(), ServiceError> {
        info!("Deleting review: {}", id);
        Ok(self.storage.delete_review(ctx, id).await?)
    }
}
