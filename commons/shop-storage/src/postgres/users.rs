use super::PgDatabase;
use super::rows::{PRODUCT_COLUMNS, ProductRow, USER_COLUMNS, UserRow, collect, prefixed};
use crate::context::Context;
use crate::error::{StorageError, StorageResult};
use crate::traits::{StatStream, StorageHealth, UserStorage};
use async_trait::async_trait;
use futures_util::StreamExt;
use shop_models::{ActivityKey, ActivityStats, Product, User, UserFilter, UserRole};

#[derive(Clone)]
pub struct PgUserStorage {
    db: PgDatabase,
}

impl PgUserStorage {
    pub fn new(db: PgDatabase) -> Self {
        Self { db }
    }

    async fn fetch_user(
        &self,
        ctx: &Context,
        sql: &str,
        id: i64,
    ) -> StorageResult<User> {
        let mut conn = self.db.conn(ctx).await?;
        let row = sqlx::query_as::<_, UserRow>(sql)
            .bind(id)
            .fetch_optional(conn.get()?)
            .await?
            .ok_or_else(|| StorageError::not_found("user", id))?;
        row.try_into()
    }
}

#[async_trait]
impl StorageHealth for PgUserStorage {
    async fn health(&self) -> StorageResult<()> {
        self.db.ping().await
    }
}

#[async_trait]
impl UserStorage for PgUserStorage {
    async fn create(&self, ctx: &Context, user: User) -> StorageResult<User> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, full_name, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .fetch_one(conn.get()?)
            .await?;
        row.try_into()
    }

    async fn get_by_id(&self, ctx: &Context, id: i64) -> StorageResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_user(ctx, &sql, id).await
    }

    async fn get_by_id_with_lock(
        &self,
        ctx: &Context,
        id: i64,
    ) -> StorageResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        self.fetch_user(ctx, &sql, id).await
    }

    async fn get_by_username(
        &self,
        ctx: &Context,
        username: &str,
    ) -> StorageResult<User> {
        let mut conn = self.db.conn(ctx).await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(conn.get()?)
            .await?
            .ok_or_else(|| StorageError::not_found("user", username))?;
        row.try_into()
    }

    async fn list_users(
        &self,
        ctx: &Context,
        filter: &UserFilter,
    ) -> StorageResult<Vec<User>> {
        let mut conn = self.db.conn(ctx).await?;
        let pattern = filter.search.as_ref().map(|s| format!("%{s}%"));
        let roles: Vec<String> =
            filter.roles.iter().map(|r| r.as_str().to_string()).collect();
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::TEXT IS NULL OR username ILIKE $1 OR email ILIKE $1) \
               AND (cardinality($2::TEXT[]) = 0 OR role = ANY($2)) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(pattern)
            .bind(roles)
            .fetch_all(conn.get()?)
            .await?;
        collect(rows)
    }

    async fn update_role(
        &self,
        ctx: &Context,
        user_id: i64,
        role: UserRole,
    ) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        let result = sqlx::query(
            "UPDATE users SET role = $1, updated_at = now() WHERE id = $2",
        )
        .bind(role.as_str())
        .bind(user_id)
        .execute(conn.get()?)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn update_password(
        &self,
        ctx: &Context,
        user_id: i64,
        password_hash: &str,
    ) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(conn.get()?)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn add_to_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        sqlx::query("INSERT INTO wishlist (user_id, product_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(product_id)
            .execute(conn.get()?)
            .await?;
        Ok(())
    }

    async fn remove_from_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> StorageResult<()> {
        let mut conn = self.db.conn(ctx).await?;
        let result =
            sqlx::query("DELETE FROM wishlist WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(conn.get()?)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(
                "wishlist entry",
                format!("{user_id}/{product_id}"),
            ));
        }
        Ok(())
    }

    async fn get_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
    ) -> StorageResult<Vec<Product>> {
        let mut conn = self.db.conn(ctx).await?;
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id)
                .fetch_one(conn.get()?)
                .await?;
        if !exists {
            return Err(StorageError::not_found("user", user_id));
        }
        let sql = format!(
            "SELECT {} FROM wishlist w JOIN products p ON p.id = w.product_id \
             WHERE w.user_id = $1 ORDER BY w.added_at, p.id",
            prefixed(PRODUCT_COLUMNS, "p")
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(user_id)
            .fetch_all(conn.get()?)
            .await?;
        collect(rows)
    }

    async fn activity_stats(&self, ctx: &Context) -> StorageResult<ActivityStats> {
        let mut conn = self.db.conn(ctx).await?;
        let (wishlist, reviews): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM wishlist), (SELECT COUNT(*) FROM reviews)",
        )
        .fetch_one(conn.get()?)
        .await?;
        let mut stats = ActivityStats::new();
        stats.insert(ActivityKey::WishListItems, wishlist);
        stats.insert(ActivityKey::ProductReviews, reviews);
        Ok(stats)
    }

    async fn watch_stats(&self, _ctx: &Context) -> StorageResult<StatStream> {
        Ok(futures_util::stream::empty().boxed())
    }
}
