use super::PgDatabase;
use super::rows::{
    CATEGORY_COLUMNS, CategoryRow, PRODUCT_COLUMNS, ProductRow, REVIEW_COLUMNS,
    ReviewRow, collect, prefixed,
};
use crate::context::Context;
use crate::error::{StorageError, StorageResult};
use crate::paging::{Page, Paging, paginate};
use crate::traits::{ProductStorage, StorageHealth};
use async_trait::async_trait;
use shop_models::{Category, Product, ProductFilter, Review};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct CategoryTotalRow {
    #[sqlx(flatten)]
    category: CategoryRow,
    total: i64,
}

fn require_affected(rows: u64, entity: &str, id: i64) -> StorageResult<()> {
    if rows == 0 {
        Err(StorageError::not_found(entity, id))
    } else {
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgProductStorage {
    db: PgDatabase,
}

impl PgProductStorage {
    pub fn new(db: PgDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StorageHealth for PgProductStorage {
    async fn health(&self) -> StorageResult<()> {
        self.db.ping().await
    }
}

#[async_trait]
impl ProductStorage for PgProductStorage {
    async fn create_category(
        &self,
        ctx: &Context,
        category: Category,
    ) -> StorageResult<Category> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!(
            "INSERT INTO categories (name, description) VALUES ($1, $2) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(&category.name)
            .bind(&category.description)
            .fetch_one(conn.get()?)
            .await?;
        Ok(row.into())
    }

    async fn update_category(
        &self,
        ctx: &Context,
        category: &Category,
    ) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        let result = sqlx::query(
            "UPDATE categories SET name = $1, description = $2, updated_at = now() \
             WHERE id = $3",
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.id)
        .execute(conn.get()?)
        .await?;
        require_affected(result.rows_affected(), "category", category.id)
    }

    async fn delete_category(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(conn.get()?)
            .await?;
        require_affected(result.rows_affected(), "category", id)
    }

    async fn get_category(&self, ctx: &Context, id: i64) -> StorageResult<Category> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id)
            .fetch_optional(conn.get()?)
            .await?
            .ok_or_else(|| StorageError::not_found("category", id))?;
        Ok(row.into())
    }

    async fn list_categories(&self, ctx: &Context) -> StorageResult<Vec<Category>> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!(
            "SELECT {}, COUNT(pc.product_id) AS total FROM categories c \
             LEFT JOIN product_categories pc ON pc.category_id = c.id \
             GROUP BY c.id ORDER BY c.id ASC",
            prefixed(CATEGORY_COLUMNS, "c")
        );
        let rows = sqlx::query_as::<_, CategoryTotalRow>(&sql)
            .fetch_all(conn.get()?)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Category {
                total: row.total,
                ..Category::from(row.category)
            })
            .collect())
    }

    async fn create_product(
        &self,
        ctx: &Context,
        product: Product,
    ) -> StorageResult<Product> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!(
            "INSERT INTO products (name, description, price, stock_quantity, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.stock_quantity)
            .bind(product.status.as_str())
            .fetch_one(conn.get()?)
            .await?;
        row.try_into()
    }

    async fn update_product(
        &self,
        ctx: &Context,
        product: &Product,
    ) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        let result = sqlx::query(
            "UPDATE products SET name = $1, description = $2, price = $3, \
             stock_quantity = $4, status = $5, updated_at = now() WHERE id = $6",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(product.status.as_str())
        .bind(product.id)
        .execute(conn.get()?)
        .await?;
        require_affected(result.rows_affected(), "product", product.id)?;
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(product.id)
            .execute(conn.get()?)
            .await?;
        Ok(())
    }

    async fn delete_product(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        // links, reviews and wishlist entries cascade
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(conn.get()?)
            .await?;
        require_affected(result.rows_affected(), "product", id)
    }

    async fn get_product(&self, ctx: &Context, id: i64) -> StorageResult<Product> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(conn.get()?)
            .await?
            .ok_or_else(|| StorageError::not_found("product", id))?;
        row.try_into()
    }

    async fn list_products(
        &self,
        ctx: &Context,
        filter: &ProductFilter,
        paging: &Paging,
    ) -> StorageResult<Page<Product>> {
        let plan = paging.plan();
        let pattern = filter.name.as_ref().map(|name| format!("%{name}%"));
        let statuses: Vec<String> = filter
            .statuses
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1::TEXT IS NULL OR name ILIKE $1) \
               AND (cardinality($2::TEXT[]) = 0 OR status = ANY($2)) \
               AND {} {} {}",
            plan.where_clause(3),
            plan.order_clause(),
            plan.limit_clause(),
        );

        let mut conn = self.db.conn(ctx).await?;
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(pattern)
            .bind(statuses)
            .bind(plan.bound)
            .fetch_all(conn.get()?)
            .await?;
        Ok(paginate(collect(rows)?, paging))
    }

    async fn list_products_by_category(
        &self,
        ctx: &Context,
        category_id: i64,
    ) -> StorageResult<Vec<Product>> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!(
            "SELECT {} FROM products p \
             JOIN product_categories pc ON pc.product_id = p.id \
             WHERE pc.category_id = $1 ORDER BY p.id ASC",
            prefixed(PRODUCT_COLUMNS, "p")
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(category_id)
            .fetch_all(conn.get()?)
            .await?;
        collect(rows)
    }

    async fn create_product_categories(
        &self,
        ctx: &Context,
        product_id: i64,
        category_ids: &[i64],
    ) -> StorageResult<()> {
        if category_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.db.conn(ctx).await?;
        sqlx::query(
            "INSERT INTO product_categories (product_id, category_id) \
             SELECT $1, UNNEST($2::BIGINT[])",
        )
        .bind(product_id)
        .bind(category_ids.to_vec())
        .execute(conn.get()?)
        .await?;
        Ok(())
    }

    async fn delete_product_categories(
        &self,
        ctx: &Context,
        product_id: i64,
    ) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(product_id)
            .execute(conn.get()?)
            .await?;
        Ok(())
    }

    async fn create_review(
        &self,
        ctx: &Context,
        review: Review,
    ) -> StorageResult<Review> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!(
            "INSERT INTO reviews (product_id, user_id, rating, comment) \
             VALUES ($1, $2, $3, $4) RETURNING {REVIEW_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(review.product_id)
            .bind(review.user_id)
            .bind(review.rating)
            .bind(&review.comment)
            .fetch_one(conn.get()?)
            .await?;
        Ok(row.into())
    }

    async fn list_reviews(
        &self,
        ctx: &Context,
        product_name: Option<&str>,
    ) -> StorageResult<Vec<Review>> {
        let mut conn = self.db.conn(ctx).await?;
        let pattern = product_name
            .filter(|name| !name.is_empty())
            .map(|name| format!("%{name}%"));
        let sql = format!(
            "SELECT {} FROM reviews r JOIN products p ON p.id = r.product_id \
             WHERE ($1::TEXT IS NULL OR p.name ILIKE $1) \
             ORDER BY r.created_at DESC, r.id DESC",
            prefixed(REVIEW_COLUMNS, "r")
        );
        let rows = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(pattern)
            .fetch_all(conn.get()?)
            .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn delete_review(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(conn.get()?)
            .await?;
        require_affected(result.rows_affected(), "review", id)
    }
}
