use super::{MemoryDatabase, Tables};
use crate::context::Context;
use crate::error::{StorageError, StorageResult};
use crate::paging::{Page, Paging, paginate};
use crate::traits::{ProductStorage, StorageHealth};
use async_trait::async_trait;
use chrono::Utc;
use shop_models::{Category, Product, ProductFilter, Review};
use std::collections::HashMap;

#[derive(Clone, Default)]
pub struct MemoryProductStorage {
    db: MemoryDatabase,
}

impl MemoryProductStorage {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

fn check_rating(rating: i32) -> StorageResult<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(StorageError::ConstraintViolation(format!(
            "rating {rating} is outside 1..=5"
        )))
    }
}

#[async_trait]
impl StorageHealth for MemoryProductStorage {
    async fn health(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ProductStorage for MemoryProductStorage {
    async fn create_category(
        &self,
        ctx: &Context,
        category: Category,
    ) -> StorageResult<Category> {
        self.db
            .with_tables(ctx, move |tables| {
                let now = Utc::now();
                let created = Category {
                    id: Tables::next_id(&mut tables.last_category_id),
                    created_at: now,
                    updated_at: now,
                    total: 0,
                    ..category
                };
                tables.categories.insert(created.id, created.clone());
                Ok(created)
            })
            .await
    }

    async fn update_category(
        &self,
        ctx: &Context,
        category: &Category,
    ) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                let existing = tables
                    .categories
                    .get_mut(&category.id)
                    .ok_or_else(|| StorageError::not_found("category", category.id))?;
                existing.name = category.name.clone();
                existing.description = category.description.clone();
                existing.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    async fn delete_category(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                tables
                    .categories
                    .remove(&id)
                    .ok_or_else(|| StorageError::not_found("category", id))?;
                tables
                    .product_categories
                    .retain(|(_, category_id)| *category_id != id);
                Ok(())
            })
            .await
    }

    async fn get_category(&self, ctx: &Context, id: i64) -> StorageResult<Category> {
        self.db
            .with_tables(ctx, |tables| tables.category(id).cloned())
            .await
    }

    async fn list_categories(&self, ctx: &Context) -> StorageResult<Vec<Category>> {
        self.db
            .with_tables(ctx, |tables| {
                let mut totals: HashMap<i64, i64> = HashMap::new();
                for (_, category_id) in &tables.product_categories {
                    *totals.entry(*category_id).or_default() += 1;
                }
                Ok(tables
                    .categories
                    .values()
                    .map(|category| Category {
                        total: totals.get(&category.id).copied().unwrap_or(0),
                        ..category.clone()
                    })
                    .collect())
            })
            .await
    }

    async fn create_product(
        &self,
        ctx: &Context,
        product: Product,
    ) -> StorageResult<Product> {
        self.db
            .with_tables(ctx, move |tables| {
                let now = Utc::now();
                let created = Product {
                    id: Tables::next_id(&mut tables.last_product_id),
                    created_at: now,
                    updated_at: now,
                    ..product
                };
                tables.products.insert(created.id, created.clone());
                Ok(created)
            })
            .await
    }

    async fn update_product(
        &self,
        ctx: &Context,
        product: &Product,
    ) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                let existing = tables
                    .products
                    .get_mut(&product.id)
                    .ok_or_else(|| StorageError::not_found("product", product.id))?;
                *existing = Product {
                    created_at: existing.created_at,
                    updated_at: Utc::now(),
                    ..product.clone()
                };
                tables
                    .product_categories
                    .retain(|(product_id, _)| *product_id != product.id);
                Ok(())
            })
            .await
    }

    async fn delete_product(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                tables
                    .products
                    .remove(&id)
                    .ok_or_else(|| StorageError::not_found("product", id))?;
                tables
                    .product_categories
                    .retain(|(product_id, _)| *product_id != id);
                tables.reviews.retain(|_, review| review.product_id != id);
                tables
                    .wishlist
                    .retain(|(_, product_id), _| *product_id != id);
                Ok(())
            })
            .await
    }

    async fn get_product(&self, ctx: &Context, id: i64) -> StorageResult<Product> {
        self.db
            .with_tables(ctx, |tables| tables.product(id).cloned())
            .await
    }

    async fn list_products(
        &self,
        ctx: &Context,
        filter: &ProductFilter,
        paging: &Paging,
    ) -> StorageResult<Page<Product>> {
        let plan = paging.plan();
        let rows = self
            .db
            .with_tables(ctx, |tables| {
                Ok(plan.select(
                    tables
                        .products
                        .values()
                        .filter(|product| filter.matches(product))
                        .cloned(),
                    |product| product.id,
                ))
            })
            .await?;
        Ok(paginate(rows, paging))
    }

    async fn list_products_by_category(
        &self,
        ctx: &Context,
        category_id: i64,
    ) -> StorageResult<Vec<Product>> {
        self.db
            .with_tables(ctx, |tables| {
                let mut products: Vec<Product> = tables
                    .product_categories
                    .iter()
                    .filter(|(_, linked)| *linked == category_id)
                    .filter_map(|(product_id, _)| tables.products.get(product_id))
                    .cloned()
                    .collect();
                products.sort_by_key(|product| product.id);
                Ok(products)
            })
            .await
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
        self.db
            .with_tables(ctx, |tables| {
                tables.require_product_ref(product_id)?;
                for (i, category_id) in category_ids.iter().enumerate() {
                    tables.require_category_ref(*category_id)?;
                    if tables
                        .product_categories
                        .contains(&(product_id, *category_id))
                        || category_ids[..i].contains(category_id)
                    {
                        return Err(StorageError::ConstraintViolation(format!(
                            "product {product_id} is already in category {category_id}"
                        )));
                    }
                }
                for category_id in category_ids {
                    tables.product_categories.insert((product_id, *category_id));
                }
                Ok(())
            })
            .await
    }

    async fn delete_product_categories(
        &self,
        ctx: &Context,
        product_id: i64,
    ) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                tables
                    .product_categories
                    .retain(|(linked, _)| *linked != product_id);
                Ok(())
            })
            .await
    }

    async fn create_review(
        &self,
        ctx: &Context,
        review: Review,
    ) -> StorageResult<Review> {
        self.db
            .with_tables(ctx, move |tables| {
                check_rating(review.rating)?;
                tables.require_product_ref(review.product_id)?;
                tables.require_user_ref(review.user_id)?;
                let now = Utc::now();
                let created = Review {
                    id: Tables::next_id(&mut tables.last_review_id),
                    created_at: now,
                    updated_at: now,
                    ..review
                };
                tables.reviews.insert(created.id, created.clone());
                Ok(created)
            })
            .await
    }

    async fn list_reviews(
        &self,
        ctx: &Context,
        product_name: Option<&str>,
    ) -> StorageResult<Vec<Review>> {
        let needle = product_name
            .filter(|name| !name.is_empty())
            .map(str::to_lowercase);
        self.db
            .with_tables(ctx, |tables| {
                let mut reviews: Vec<Review> = tables
                    .reviews
                    .values()
                    .filter(|review| match &needle {
                        None => true,
                        Some(needle) => tables
                            .products
                            .get(&review.product_id)
                            .is_some_and(|p| p.name.to_lowercase().contains(needle)),
                    })
                    .cloned()
                    .collect();
                reviews.sort_by(|a, b| {
                    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
                });
                Ok(reviews)
            })
            .await
    }

    async fn delete_review(&self, ctx: &Context, id: i64) -> StorageResult<()> {
        self.db
            .with_tables(ctx, |tables| {
                tables
                    .reviews
                    .remove(&id)
                    .map(|_| ())
                    .ok_or_else(|| StorageError::not_found("review", id))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_models::{ProductStatus, User};
    use crate::memory::MemoryUserStorage;
    use crate::traits::UserStorage;

    async fn seed(storage: &MemoryProductStorage, ctx: &Context, names: &[&str]) {
        for name in names {
            storage
                .create_product(
                    ctx,
                    Product {
                        name: name.to_string(),
                        stock_quantity: 1,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn listing_applies_filter_before_paging() {
        let storage = MemoryProductStorage::default();
        let ctx = Context::new();
        seed(&storage, &ctx, &["Red Mug", "Blue Mug", "Plate", "Green Mug"]).await;
        let mut plate = storage.get_product(&ctx, 3).await.unwrap();
        plate.status = ProductStatus::OutOfStock;
        storage.update_product(&ctx, &plate).await.unwrap();

        let filter = ProductFilter {
            name: Some("mug".into()),
            statuses: vec![ProductStatus::InStock],
        };
        let page = storage
            .list_products(&ctx, &filter, &Paging::new(0, 2))
            .await
            .unwrap();
        let names: Vec<_> = page.data.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Red Mug", "Blue Mug"]);
        assert!(page.metadata.has_next);

        let page = storage
            .list_products(&ctx, &filter, &Paging::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].name, "Green Mug");
        assert!(!page.metadata.has_next);
        assert!(page.metadata.has_previous);
    }

    #[tokio::test]
    async fn category_totals_and_links() {
        let storage = MemoryProductStorage::default();
        let ctx = Context::new();
        seed(&storage, &ctx, &["A", "B"]).await;
        let kitchen = storage
            .create_category(
                &ctx,
                Category {
                    name: "Kitchen".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        storage
            .create_product_categories(&ctx, 1, &[kitchen.id])
            .await
            .unwrap();
        storage
            .create_product_categories(&ctx, 2, &[kitchen.id])
            .await
            .unwrap();
        let err = storage
            .create_product_categories(&ctx, 2, &[kitchen.id])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));

        let categories = storage.list_categories(&ctx).await.unwrap();
        assert_eq!(categories[0].total, 2);

        storage.delete_product(&ctx, 1).await.unwrap();
        let in_kitchen = storage
            .list_products_by_category(&ctx, kitchen.id)
            .await
            .unwrap();
        assert_eq!(in_kitchen.len(), 1);
        assert_eq!(in_kitchen[0].name, "B");
    }

    #[tokio::test]
    async fn reviews_are_validated_and_filtered_by_product_name() {
        let db = MemoryDatabase::new();
        let storage = MemoryProductStorage::new(db.clone());
        let users = MemoryUserStorage::new(db);
        let ctx = Context::new();
        seed(&storage, &ctx, &["Desk Lamp", "Chair"]).await;
        let reviewer = users
            .create(
                &ctx,
                User {
                    username: "carol".into(),
                    email: "carol@shop.test".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let bad = Review {
            product_id: 1,
            user_id: reviewer.id,
            rating: 6,
            ..Default::default()
        };
        assert!(storage.create_review(&ctx, bad).await.is_err());

        for product_id in [1, 2] {
            storage
                .create_review(
                    &ctx,
                    Review {
                        product_id,
                        user_id: reviewer.id,
                        rating: 4,
                        comment: "fine".into(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let lamp = storage.list_reviews(&ctx, Some("lamp")).await.unwrap();
        assert_eq!(lamp.len(), 1);
        assert_eq!(lamp[0].product_id, 1);
        assert_eq!(storage.list_reviews(&ctx, None).await.unwrap().len(), 2);

        storage.delete_review(&ctx, lamp[0].id).await.unwrap();
        assert!(
            storage
                .delete_review(&ctx, lamp[0].id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }
}
