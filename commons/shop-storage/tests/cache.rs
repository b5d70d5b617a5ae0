use async_trait::async_trait;
use futures_util::StreamExt;
use shop_models::{
    ActivityKey, ActivityStats, Product, Review, STAT_UPDATE_CHANNEL, User,
    UserFilter, UserRole,
};
use shop_storage::cache::{
    ActivityCounters, CachedProductStorage, CachedUserStorage, DEFAULT_COUNTER_TTL,
    DEFAULT_ENTITY_TTL,
};
use shop_storage::fast::{FastStore, MemoryFastStore, Subscription};
use shop_storage::memory::{MemoryDatabase, MemoryProductStorage, MemoryUserStorage};
use shop_storage::{
    AtomicExecutor, Context, ProductStorage, StatStream, StorageError, StorageHealth,
    StorageResult, UserStorage,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Relational port that counts reads by id.
struct CountingUsers {
    inner: MemoryUserStorage,
    reads: AtomicUsize,
}

#[async_trait]
impl StorageHealth for CountingUsers {
    async fn health(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStorage for CountingUsers {
    async fn create(&self, ctx: &Context, user: User) -> StorageResult<User> {
        self.inner.create(ctx, user).await
    }
    async fn get_by_id(&self, ctx: &Context, id: i64) -> StorageResult<User> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(ctx, id).await
    }
    async fn get_by_id_with_lock(&self, ctx: &Context, id: i64) -> StorageResult<User> {
        self.inner.get_by_id_with_lock(ctx, id).await
    }
    async fn get_by_username(&self, ctx: &Context, username: &str) -> StorageResult<User> {
        self.inner.get_by_username(ctx, username).await
    }
    async fn list_users(&self, ctx: &Context, filter: &UserFilter) -> StorageResult<Vec<User>> {
        self.inner.list_users(ctx, filter).await
    }
    async fn update_role(&self, ctx: &Context, id: i64, role: UserRole) -> StorageResult<()> {
        self.inner.update_role(ctx, id, role).await
    }
    async fn update_password(&self, ctx: &Context, id: i64, hash: &str) -> StorageResult<()> {
        self.inner.update_password(ctx, id, hash).await
    }
    async fn add_to_wishlist(&self, ctx: &Context, user: i64, product: i64) -> StorageResult<()> {
        self.inner.add_to_wishlist(ctx, user, product).await
    }
    async fn remove_from_wishlist(
        &self,
        ctx: &Context,
        user: i64,
        product: i64,
    ) -> StorageResult<()> {
        self.inner.remove_from_wishlist(ctx, user, product).await
    }
    async fn get_wishlist(&self, ctx: &Context, user: i64) -> StorageResult<Vec<Product>> {
        self.inner.get_wishlist(ctx, user).await
    }
    async fn activity_stats(&self, ctx: &Context) -> StorageResult<ActivityStats> {
        self.inner.activity_stats(ctx).await
    }
    async fn watch_stats(&self, ctx: &Context) -> StorageResult<StatStream> {
        self.inner.watch_stats(ctx).await
    }
}

struct Fixture {
    relational_users: Arc<CountingUsers>,
    products: MemoryProductStorage,
    fast: Arc<MemoryFastStore>,
    users: CachedUserStorage,
    cached_products: CachedProductStorage,
    executor: AtomicExecutor,
    ctx: Context,
}

fn fixture() -> Fixture {
    let db = MemoryDatabase::new();
    let relational_users = Arc::new(CountingUsers {
        inner: MemoryUserStorage::new(db.clone()),
        reads: AtomicUsize::new(0),
    });
    let products = MemoryProductStorage::new(db.clone());
    let fast = Arc::new(MemoryFastStore::new());
    let counters = ActivityCounters::new(
        fast.clone(),
        relational_users.clone(),
        DEFAULT_COUNTER_TTL,
    );
    let users = CachedUserStorage::new(
        relational_users.clone(),
        fast.clone(),
        counters.clone(),
        DEFAULT_ENTITY_TTL,
    );
    let cached_products = CachedProductStorage::new(Arc::new(products.clone()), counters);
    Fixture {
        relational_users,
        products,
        fast,
        users,
        cached_products,
        executor: AtomicExecutor::new(Arc::new(db)),
        ctx: Context::new(),
    }
}

fn account(name: &str) -> User {
    User {
        username: name.into(),
        email: format!("{name}@shop.test"),
        full_name: name.into(),
        ..Default::default()
    }
}

async fn product(f: &Fixture, name: &str) -> Product {
    f.products
        .create_product(
            &f.ctx,
            Product {
                name: name.into(),
                stock_quantity: 3,
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let f = fixture();
    let alice = f.users.create(&f.ctx, account("alice")).await.unwrap();

    let first = f.users.get_by_id(&f.ctx, alice.id).await.unwrap();
    let second = f.users.get_by_id(&f.ctx, alice.id).await.unwrap();

    assert_eq!(first.username, "alice");
    assert_eq!(second.username, "alice");
    assert_eq!(f.relational_users.reads.load(Ordering::SeqCst), 1);
    assert!(f.fast.get(&format!("user:{}", alice.id)).await.unwrap().is_some());
}

#[tokio::test]
async fn missing_user_is_not_cached() {
    let f = fixture();
    let err = f.users.get_by_id(&f.ctx, 404).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(f.fast.get("user:404").await.unwrap().is_none());
}

#[tokio::test]
async fn role_update_invalidates_cached_user() {
    let f = fixture();
    let bob = f.users.create(&f.ctx, account("bob")).await.unwrap();
    assert_eq!(
        f.users.get_by_id(&f.ctx, bob.id).await.unwrap().role,
        UserRole::User
    );

    f.users
        .update_role(&f.ctx, bob.id, UserRole::Admin)
        .await
        .unwrap();

    assert_eq!(
        f.users.get_by_id(&f.ctx, bob.id).await.unwrap().role,
        UserRole::Admin
    );
    assert_eq!(f.relational_users.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn undecodable_snapshot_is_a_fault() {
    let f = fixture();
    let carol = f.users.create(&f.ctx, account("carol")).await.unwrap();
    f.fast
        .set_ex(
            &format!("user:{}", carol.id),
            "{not json".into(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let err = f.users.get_by_id(&f.ctx, carol.id).await.unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
    assert_eq!(f.relational_users.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cold_counters_are_refilled_together() {
    let f = fixture();
    let dave = f.users.create(&f.ctx, account("dave")).await.unwrap();
    let lamp = product(&f, "Lamp").await;
    f.relational_users
        .add_to_wishlist(&f.ctx, dave.id, lamp.id)
        .await
        .unwrap();
    // only one counter is present and it is wrong
    f.fast
        .set_ex("wishListItems", "40".into(), Duration::from_secs(60))
        .await
        .unwrap();

    let stats = f.users.activity_stats(&f.ctx).await.unwrap();
    assert_eq!(stats[&ActivityKey::WishListItems], 1);
    assert_eq!(stats[&ActivityKey::ProductReviews], 0);
    assert_eq!(f.fast.get("wishListItems").await.unwrap().as_deref(), Some("1"));
    assert_eq!(f.fast.get("productReviews").await.unwrap().as_deref(), Some("0"));
}

#[tokio::test]
async fn concurrent_wishlist_adds_are_all_counted() {
    const N: usize = 32;
    let f = Arc::new(fixture());
    let lamp = product(&f, "Lamp").await.id;
    let mut ids = Vec::new();
    for i in 0..N {
        ids.push(f.users.create(&f.ctx, account(&format!("u{i}"))).await.unwrap().id);
    }
    let before = f.users.activity_stats(&f.ctx).await.unwrap();
    assert_eq!(before[&ActivityKey::WishListItems], 0);

    let mut tasks = Vec::new();
    for id in ids {
        let f = f.clone();
        tasks.push(tokio::spawn(async move {
            f.users.add_to_wishlist(&Context::new(), id, lamp).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let after = f.users.activity_stats(&f.ctx).await.unwrap();
    assert_eq!(after[&ActivityKey::WishListItems], N as i64);
}

#[tokio::test]
async fn failed_write_leaves_counter_alone() {
    let f = fixture();
    let erin = f.users.create(&f.ctx, account("erin")).await.unwrap();
    f.users.activity_stats(&f.ctx).await.unwrap();

    let err = f.users.add_to_wishlist(&f.ctx, erin.id, 999).await.unwrap_err();
    assert!(matches!(err, StorageError::ConstraintViolation(_)));
    let err = f.users.remove_from_wishlist(&f.ctx, erin.id, 999).await.unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(f.fast.get("wishListItems").await.unwrap().as_deref(), Some("0"));
}

#[tokio::test]
async fn counter_waits_for_commit_and_ignores_rollback() {
    let f = fixture();
    let frank = f.users.create(&f.ctx, account("frank")).await.unwrap().id;
    let lamp = product(&f, "Lamp").await.id;
    f.users.activity_stats(&f.ctx).await.unwrap();
    let (users, fast) = (&f.users, &f.fast);

    let result: StorageResult<()> = f
        .executor
        .execute(&f.ctx, move |tx| async move {
            users.add_to_wishlist(&tx, frank, lamp).await?;
            assert_eq!(fast.get("wishListItems").await?.as_deref(), Some("0"));
            Err::<(), _>(StorageError::Backend("abort".into()))
        })
        .await;
    assert!(result.is_err());
    assert_eq!(fast.get("wishListItems").await.unwrap().as_deref(), Some("0"));
    assert!(users.get_wishlist(&f.ctx, frank).await.unwrap().is_empty());

    f.executor
        .execute(&f.ctx, move |tx| async move {
            users.add_to_wishlist(&tx, frank, lamp).await?;
            assert_eq!(fast.get("wishListItems").await?.as_deref(), Some("0"));
            Ok::<_, StorageError>(())
        })
        .await
        .unwrap();
    assert_eq!(fast.get("wishListItems").await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
async fn subscribers_receive_post_update_values() {
    let f = fixture();
    let gina = f.users.create(&f.ctx, account("gina")).await.unwrap();
    let lamp = product(&f, "Lamp").await;
    let chair = product(&f, "Chair").await;
    let snapshot = f.users.activity_stats(&f.ctx).await.unwrap();
    assert_eq!(snapshot[&ActivityKey::WishListItems], 0);

    let watch_ctx = Context::new();
    let mut updates = f.users.watch_stats(&watch_ctx).await.unwrap();

    f.users.add_to_wishlist(&f.ctx, gina.id, lamp.id).await.unwrap();
    f.users.add_to_wishlist(&f.ctx, gina.id, chair.id).await.unwrap();
    f.users.remove_from_wishlist(&f.ctx, gina.id, lamp.id).await.unwrap();
    f.cached_products
        .create_review(
            &f.ctx,
            Review {
                product_id: chair.id,
                user_id: gina.id,
                rating: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let stat = updates.next().await.unwrap();
        seen.push((stat.key, stat.value));
    }
    assert_eq!(
        seen,
        vec![
            (ActivityKey::WishListItems, 1),
            (ActivityKey::WishListItems, 2),
            (ActivityKey::WishListItems, 1),
            (ActivityKey::ProductReviews, 1),
        ]
    );

    watch_ctx.cancellation().cancel();
    assert!(updates.next().await.is_none());
}

#[tokio::test]
async fn product_delete_drops_counters_for_recount() {
    let f = fixture();
    let hank = f.users.create(&f.ctx, account("hank")).await.unwrap();
    let lamp = product(&f, "Lamp").await;
    f.users.activity_stats(&f.ctx).await.unwrap();
    f.users.add_to_wishlist(&f.ctx, hank.id, lamp.id).await.unwrap();
    f.cached_products
        .create_review(
            &f.ctx,
            Review {
                product_id: lamp.id,
                user_id: hank.id,
                rating: 3,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(f.fast.get("wishListItems").await.unwrap().as_deref(), Some("1"));

    f.cached_products.delete_product(&f.ctx, lamp.id).await.unwrap();
    assert!(f.fast.get("wishListItems").await.unwrap().is_none());
    assert!(f.fast.get("productReviews").await.unwrap().is_none());

    let stats = f.users.activity_stats(&f.ctx).await.unwrap();
    assert_eq!(stats[&ActivityKey::WishListItems], 0);
    assert_eq!(stats[&ActivityKey::ProductReviews], 0);
}

#[tokio::test]
async fn cold_counter_stays_cold_on_write() {
    let f = fixture();
    let ivy = f.users.create(&f.ctx, account("ivy")).await.unwrap();
    let lamp = product(&f, "Lamp").await;
    let mut updates = f.fast.subscribe(STAT_UPDATE_CHANNEL).await.unwrap();

    f.users.add_to_wishlist(&f.ctx, ivy.id, lamp.id).await.unwrap();

    assert!(f.fast.get("wishListItems").await.unwrap().is_none());
    let stats = f.users.activity_stats(&f.ctx).await.unwrap();
    assert_eq!(stats[&ActivityKey::WishListItems], 1);
    let quiet = tokio::time::timeout(Duration::from_millis(50), updates.next()).await;
    assert!(quiet.is_err());
}

#[tokio::test]
async fn read_inside_transaction_does_not_fill_counters() {
    let f = fixture();
    let jack = f.users.create(&f.ctx, account("jack")).await.unwrap().id;
    let lamp = product(&f, "Lamp").await.id;
    let users = &f.users;

    let result: StorageResult<()> = f
        .executor
        .execute(&f.ctx, move |tx| async move {
            users.add_to_wishlist(&tx, jack, lamp).await?;
            let inside = users.activity_stats(&tx).await?;
            assert_eq!(inside[&ActivityKey::WishListItems], 1);
            Err(StorageError::Backend("abort".into()))
        })
        .await;
    assert!(result.is_err());

    assert!(f.fast.get("wishListItems").await.unwrap().is_none());
    let stats = f.users.activity_stats(&f.ctx).await.unwrap();
    assert_eq!(stats[&ActivityKey::WishListItems], 0);
}

/// Fast store whose first increment is delayed, so a concurrent writer can
/// commit and reach the counters in between.
struct SlowFirstIncr {
    inner: MemoryFastStore,
    delayed: AtomicUsize,
}

#[async_trait]
impl FastStore for SlowFirstIncr {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key).await
    }
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> StorageResult<()> {
        self.inner.set_ex(key, value, ttl).await
    }
    async fn del(&self, key: &str) -> StorageResult<()> {
        self.inner.del(key).await
    }
    async fn incr_by(&self, key: &str, delta: i64) -> StorageResult<Option<i64>> {
        if self.delayed.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        self.inner.incr_by(key, delta).await
    }
    async fn publish(&self, channel: &str, payload: String) -> StorageResult<usize> {
        self.inner.publish(channel, payload).await
    }
    async fn subscribe(&self, channel: &str) -> StorageResult<Subscription> {
        self.inner.subscribe(channel).await
    }
}

#[tokio::test]
async fn racing_cold_writers_are_counted_once() {
    let db = MemoryDatabase::new();
    let relational: Arc<MemoryUserStorage> = Arc::new(MemoryUserStorage::new(db.clone()));
    let products = MemoryProductStorage::new(db.clone());
    let fast = Arc::new(SlowFirstIncr {
        inner: MemoryFastStore::new(),
        delayed: AtomicUsize::new(0),
    });
    let counters = ActivityCounters::new(fast.clone(), relational.clone(), DEFAULT_COUNTER_TTL);
    let users = Arc::new(CachedUserStorage::new(
        relational.clone(),
        fast.clone(),
        counters,
        DEFAULT_ENTITY_TTL,
    ));
    let ctx = Context::new();
    let lamp = products
        .create_product(
            &ctx,
            Product {
                name: "Lamp".into(),
                stock_quantity: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id;
    let a = users.create(&ctx, account("a")).await.unwrap().id;
    let b = users.create(&ctx, account("b")).await.unwrap().id;

    let slow_writer = {
        let users = users.clone();
        tokio::spawn(async move { users.add_to_wishlist(&Context::new(), b, lamp).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    users.add_to_wishlist(&ctx, a, lamp).await.unwrap();
    slow_writer.await.unwrap().unwrap();

    let truth = relational.activity_stats(&ctx).await.unwrap();
    let snapshot = users.activity_stats(&ctx).await.unwrap();
    assert_eq!(truth[&ActivityKey::WishListItems], 2);
    assert_eq!(snapshot[&ActivityKey::WishListItems], 2);
    assert_eq!(fast.get("wishListItems").await.unwrap().as_deref(), Some("2"));
}
