use super::{MemoryDatabase, Tables};
use crate::context::Context;
use crate::error::{StorageError, StorageResult};
use crate::traits::{StatStream, StorageHealth, UserStorage};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use shop_models::{
    ActivityKey, ActivityStats, Product, User, UserFilter, UserRole, Wishlist,
};

#[derive(Clone, Default)]
pub struct MemoryUserStorage {
    db: MemoryDatabase,
}

impl MemoryUserStorage {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

fn check_unique(tables: &Tables, user: &User) -> StorageResult<()> {
    for existing in tables.users.values() {
        if existing.username == user.username {
            return Err(StorageError::ConstraintViolation(format!(
                "username {} is already taken",
                user.username
            )));
        }
        if existing.email == user.email {
            return Err(StorageError::ConstraintViolation(format!(
                "email {} is already registered",
                user.email
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl StorageHealth for MemoryUserStorage {
    async fn health(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn create(&self, ctx: &Context, user: User) -> StorageResult<User> {
        self.db
            .with_tables(ctx, move |tables| {
                check_unique(tables, &user)?;
                let now = Utc::now();
                let created = User {
                    id: Tables::next_id(&mut tables.last_user_id),
                    created_at: now,
                    updated_at: now,
                    ..user
                };
                tables.users.insert(created.id, created.clone());
                Ok(created)
            })
            .await
    }

    async fn get_by_id(&self, ctx: &Context, id: i64) -> StorageResult<User> {
        self.db
            .with_tables(ctx, |tables| tables.user(id).cloned())
            .await
    }

    async fn get_by_id_with_lock(
        &self,
        ctx: &Context,
        id: i64,
    ) -> StorageResult<User> {
        // an open transaction already holds every table
        self.get_by_id(ctx, id).await
    }

    async fn get_by_username(
        &self,
        ctx: &Context,
        username: &str,
    ) -> StorageResult<User> {
        self.db
            .with_tables(ctx, |tables| {
                tables
                    .users
                    .values()
                    .find(|user| user.username == username)
                    .cloned()
                    .ok_or_else(|| StorageError::not_found("user", username))
            })
            .await
    }

    async fn list_users(
        &self,
        ctx: &Context,
        filter: &UserFilter,
    ) -> StorageResult<Vec<User>> {
        self.db
            .with_tables(ctx, |tables| {
                let mut users: Vec<User> = tables
                    .users
                    .values()
                    .filter(|user| filter.matches(user))
                    .cloned()
                    .collect();
                users.sort_by(|a, b| {
                    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
                });
                Ok(users)
            })
            .await
    }

    async fn update_role(
        &self,
        ctx: &Context,
        user_id: i64,
        role: UserRole,
    ) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                let user = tables.user_mut(user_id)?;
                user.role = role;
                user.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    async fn update_password(
        &self,
        ctx: &Context,
        user_id: i64,
        password_hash: &str,
    ) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                let user = tables.user_mut(user_id)?;
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    async fn add_to_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                tables.require_user_ref(user_id)?;
                tables.require_product_ref(product_id)?;
                if tables.wishlist.contains_key(&(user_id, product_id)) {
                    return Err(StorageError::ConstraintViolation(format!(
                        "product {product_id} is already in the wishlist of user {user_id}"
                    )));
                }
                tables.wishlist.insert(
                    (user_id, product_id),
                    Wishlist {
                        user_id,
                        product_id,
                        added_at: Utc::now(),
                    },
                );
                Ok(())
            })
            .await
    }

    async fn remove_from_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
        product_id: i64,
    ) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                tables
                    .wishlist
                    .remove(&(user_id, product_id))
                    .map(|_| ())
                    .ok_or_else(|| {
                        StorageError::not_found(
                            "wishlist entry",
                            format!("{user_id}/{product_id}"),
                        )
                    })
            })
            .await
    }

    async fn get_wishlist(
        &self,
        ctx: &Context,
        user_id: i64,
    ) -> StorageResult<Vec<Product>> {
        self.db
            .with_tables(ctx, |tables| {
                tables.user(user_id)?;
                let mut entries: Vec<&Wishlist> = tables
                    .wishlist
                    .range((user_id, i64::MIN)..=(user_id, i64::MAX))
                    .map(|(_, entry)| entry)
                    .collect();
                entries.sort_by_key(|entry| (entry.added_at, entry.product_id));
                entries
                    .into_iter()
                    .map(|entry| tables.product(entry.product_id).cloned())
                    .collect()
            })
            .await
    }

    async fn activity_stats(&self, ctx: &Context) -> StorageResult<ActivityStats> {
        self.db
            .with_tables(ctx, |tables| {
                let mut stats = ActivityStats::new();
                stats.insert(
                    ActivityKey::WishListItems,
                    tables.wishlist.len() as i64,
                );
                stats.insert(
                    ActivityKey::ProductReviews,
                    tables.reviews.len() as i64,
                );
                Ok(stats)
            })
            .await
    }

    /// Counter deltas are published by the cache layer; the relational
    /// store has none of its own.
    async fn watch_stats(&self, _ctx: &Context) -> StorageResult<StatStream> {
        Ok(futures_util::stream::empty().boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryProductStorage;
    use crate::traits::ProductStorage;

    fn user(name: &str) -> User {
        User {
            username: name.into(),
            email: format!("{name}@shop.test"),
            full_name: name.to_uppercase(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn usernames_and_emails_are_unique() {
        let storage = MemoryUserStorage::default();
        let ctx = Context::new();
        let alice = storage.create(&ctx, user("alice")).await.unwrap();
        assert_eq!(alice.id, 1);

        let err = storage.create(&ctx, user("alice")).await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));

        let mut other = user("alicia");
        other.email = alice.email.clone();
        let err = storage.create(&ctx, other).await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn wishlist_entries_follow_foreign_keys() {
        let db = MemoryDatabase::new();
        let users = MemoryUserStorage::new(db.clone());
        let products = MemoryProductStorage::new(db);
        let ctx = Context::new();

        let bob = users.create(&ctx, user("bob")).await.unwrap();
        let err = users.add_to_wishlist(&ctx, bob.id, 42).await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));

        let product = products
            .create_product(
                &ctx,
                Product {
                    name: "Lamp".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        users.add_to_wishlist(&ctx, bob.id, product.id).await.unwrap();
        assert!(
            users
                .add_to_wishlist(&ctx, bob.id, product.id)
                .await
                .is_err()
        );

        let wishlist = users.get_wishlist(&ctx, bob.id).await.unwrap();
        assert_eq!(wishlist.len(), 1);
        assert_eq!(wishlist[0].name, "Lamp");

        let stats = users.activity_stats(&ctx).await.unwrap();
        assert_eq!(stats[&ActivityKey::WishListItems], 1);

        users
            .remove_from_wishlist(&ctx, bob.id, product.id)
            .await
            .unwrap();
        let err = users
            .remove_from_wishlist(&ctx, bob.id, product.id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn role_update_on_missing_user_is_not_found() {
        let storage = MemoryUserStorage::default();
        let err = storage
            .update_role(&Context::new(), 9, UserRole::Admin)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
