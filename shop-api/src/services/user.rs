use crate::auth::{PasswordHasher, TokenService};
use crate::errors::ServiceError;
use shop_models::{ActivityStats, Product, User, UserFilter, UserRole};
use shop_storage::{AtomicExecutor, Context, StatStream, UserStorage};
use std::sync::Arc;
use tracing::{debug, info};

/// Account, authentication and wishlist use cases.
pub struct UserService {
    storage: Arc<dyn UserStorage>,
    executor: AtomicExecutor,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<TokenService>,
}

impl UserService {
    pub fn new(
        storage: Arc<dyn UserStorage>,
        executor: AtomicExecutor,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            storage,
            executor,
            hasher,
            tokens,
        }
    }

    pub async fn health(&self) -> Result<(), ServiceError> {
        self.storage.health().await.map_err(Into::into)
    }

    pub async fn sign_up(
        &self,
        ctx: &Context,
        mut user: User,
        password: &str,
    ) -> Result<User, ServiceError> {
        info!("Signing up user: {}", user.username);
        user.password_hash = self.hasher.hash(password)?;
        let created = self.storage.create(ctx, user).await?;
        Ok(created)
    }

    /// Returns a signed access token for valid credentials.
    pub async fn sign_in(
        &self,
        ctx: &Context,
        username: &str,
        password: &str,
    ) -> Result<String, ServiceError> {
        info!("Signing in user: {}", username);
        let user = self.storage.get_by_username(ctx, username).await?;
        if !self.hasher.verify(password, &user.password_hash) {
            debug!(user = user.id, "password rejected");
            return Err(ServiceError::IncorrectPassword);
        }
        self.tokens.sign(&self.tokens.claims_for(&user))
    }

    pub async fn profile(&self, ctx: &Context, user_id: i64) -> Result<User, ServiceError> {
        Ok(self.storage.get_by_id(ctx, user_id).await?)
    }

    /// Verifies the current password and stores the new one while the
    /// account row is locked.
    pub async fn change_password(
        &self,
        ctx: &Context,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        info!("Changing password of user: {}", user_id);
        let storage = self.storage.clone();
        let hasher = self.hasher.clone();
        let current = current_password.to_string();
        let next = new_password.to_string();
        self.executor
            .execute(ctx, move |tx| async move {
                let user = storage.get_by_id_with_lock(&tx, user_id).await?;
                if !hasher.verify(&current, &user.password_hash) {
                    return Err(ServiceError::PasswordMismatch);
                }
                let hash = hasher.hash(&next)?;
                storage.update_password(&tx, user_id, &hash).await?;
                Ok(())
            })
            .await
    }

    pub async fn list_users(
        &self,
        ctx: &Context,
        filter: &UserFilter,
    ) -> Result<Vec<User>, ServiceError> {
        info!("Listing users with filter: {:?}", filter);
        Ok(self.storage.list_users(ctx, filter).await?)
    }

    pub async fn update_role(
        &self,
        ctx: &Context,
        user_id: i64,
        role: UserRole,
    ) -> Result<(), ServiceError> {
        info!("Updating role of user {} to {}", user_id, role);
        Ok(self.storage.update_role(ctx, user_id, role).await?)
    }

    pub async fn add_to_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> Result<(), ServiceError> {
        debug!(user = user_id, product = product_id, "adding wishlist entry");
        Ok(self.storage.add_to_wishlist(ctx, user_id, product_id).await?)
    }

    pub async fn remove_from_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> Result<(), ServiceError> {
        debug!(user = user_id, product = product_id, "removing wishlist entry");
        Ok(self
            .storage
            .remove_from_wishlist(ctx, user_id, product_id)
            .await?)
    }

    pub async fn wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
    ) -> Result<Vec<Product>, ServiceError> {
        Ok(self.storage.get_wishlist(ctx, user_id).await?)
    }

    pub async fn activity_stats(&self, ctx: &Context) -> Result<ActivityStats, ServiceError> {
        Ok(self.storage.activity_stats(ctx).await?)
    }

    /// Current counters plus every delta published from now on. The
    /// subscription is opened before the snapshot is read so no delta in
    /// between is lost.
    pub async fn watch_activity(
        &self,
        ctx: &Context,
    ) -> Result<(ActivityStats, StatStream), ServiceError> {
        // subscribed first so no delta is lost; one published between the two
        // calls can show up in the snapshot and again as an update
        let updates = self.storage.watch_stats(ctx).await?;
        let snapshot = self.storage.activity_stats(ctx).await?;
        Ok((snapshot, updates))
    }
}
