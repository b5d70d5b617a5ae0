use crate::context::Context;
use crate::error::StorageResult;
use crate::paging::{Page, Paging};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use shop_models::{
    ActivityStats, Category, Product, ProductFilter, Review, UpdatedStat, User,
    UserFilter, UserRole,
};

/// Live counter deltas. Ends when the subscribing context is cancelled.
pub type StatStream = BoxStream<'static, UpdatedStat>;

#[async_trait]
pub trait StorageHealth: Send + Sync {
    /// Lightweight connectivity check to the backing store.
    async fn health(&self) -> StorageResult<()>;
}

/// Persistence port for accounts and wishlists.
///
/// Every method runs on the transaction carried by `ctx` when there is
/// one, and on the shared connection otherwise.
#[async_trait]
pub trait UserStorage: Send + Sync + StorageHealth {
    async fn create(&self, ctx: &Context, user: User) -> StorageResult<User>;
    async fn get_by_id(&self, ctx: &Context, id: i64) -> StorageResult<User>;
    /// Reads the row and locks it until the surrounding transaction ends.
    async fn get_by_id_with_lock(
        &self,
        ctx: &Context,
        id: i64,
    ) -> StorageResult<User>;
    async fn get_by_username(
        &self,
        ctx: &Context,
        username: &str,
    ) -> StorageResult<User>;
    /// Newest accounts first.
    async fn list_users(
        &self,
        ctx: &Context,
        filter: &UserFilter,
    ) -> StorageResult<Vec<User>>;
    async fn update_role(
        &self,
        ctx: &Context,
        user_id: i64,
        role: UserRole,
    ) -> StorageResult<()>;
    async fn update_password(
        &self,
        ctx: &Context,
        user_id: i64,
        password_hash: &str,
    ) -> StorageResult<()>;
    async fn add_to_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> StorageResult<()>;
    /// Fails with `NotFound` when the entry does not exist.
    async fn remove_from_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> StorageResult<()>;
    async fn get_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
    ) -> StorageResult<Vec<Product>>;
    /// Current value of every tracked activity counter.
    async fn activity_stats(&self, ctx: &Context) -> StorageResult<ActivityStats>;
    /// Subscribes to counter deltas published after this call.
    async fn watch_stats(&self, ctx: &Context) -> StorageResult<StatStream>;
}

/// Persistence port for the catalogue and its reviews.
#[async_trait]
pub trait ProductStorage: Send + Sync + StorageHealth {
    async fn create_category(
        &self,
        ctx: &Context,
        category: Category,
    ) -> StorageResult<Category>;
    async fn update_category(
        &self,
        ctx: &Context,
        category: &Category,
    ) -> StorageResult<()>;
    async fn delete_category(&self, ctx: &Context, id: i64) -> StorageResult<()>;
    async fn get_category(&self, ctx: &Context, id: i64)
    -> StorageResult<Category>;
    /// All categories by id, each with the number of linked products.
    async fn list_categories(&self, ctx: &Context)
    -> StorageResult<Vec<Category>>;

    async fn create_product(
        &self,
        ctx: &Context,
        product: Product,
    ) -> StorageResult<Product>;
    /// Updates the row and drops its category links; callers relink.
    async fn update_product(
        &self,
        ctx: &Context,
        product: &Product,
    ) -> StorageResult<()>;
    async fn delete_product(&self, ctx: &Context, id: i64) -> StorageResult<()>;
    async fn get_product(&self, ctx: &Context, id: i64) -> StorageResult<Product>;
    async fn list_products(
        &self,
        ctx: &Context,
        filter: &ProductFilter,
        paging: &Paging,
    ) -> StorageResult<Page<Product>>;
    async fn list_products_by_category(
        &self,
        ctx: &Context,
        category_id: i64,
    ) -> StorageResult<Vec<Product>>;
    async fn create_product_categories(
        &self,
        ctx: &Context,
        product_id: i64,
        category_ids: &[i64],
    ) -> StorageResult<()>;
    async fn delete_product_categories(
        &self,
        ctx: &Context,
        product_id: i64,
    ) -> StorageResult<()>;

    async fn create_review(
        &self,
        ctx: &Context,
        review: Review,
    ) -> StorageResult<Review>;
    /// Newest first, optionally restricted to products whose name contains
    /// `product_name` (case-insensitive).
    async fn list_reviews(
        &self,
        ctx: &Context,
        product_name: Option<&str>,
    ) -> StorageResult<Vec<Review>>;
    /// Fails with `NotFound` when the review does not exist.
    async fn delete_review(&self, ctx: &Context, id: i64) -> StorageResult<()>;
}
