use shop_models::{Product, ProductFilter};
use shop_storage::memory::MemoryProductStorage;
use shop_storage::paging::DEFAULT_PAGE_SIZE;
use shop_storage::{Context, Paging, ProductStorage};

async fn catalogue(count: usize) -> (MemoryProductStorage, Context) {
    let storage = MemoryProductStorage::default();
    let ctx = Context::new();
    for i in 1..=count {
        storage
            .create_product(
                &ctx,
                Product {
                    name: format!("P{i}"),
                    price: i as f64,
                    stock_quantity: 10,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    (storage, ctx)
}

fn names(products: &[Product]) -> Vec<String> {
    products.iter().map(|p| p.name.clone()).collect()
}

fn expected(range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|i| format!("P{i}")).collect()
}

#[tokio::test]
async fn twenty_five_products_in_two_pages() {
    let (storage, ctx) = catalogue(25).await;
    let filter = ProductFilter::default();

    let first = storage
        .list_products(&ctx, &filter, &Paging::from_query(None, None, None))
        .await
        .unwrap();
    assert_eq!(first.metadata.page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(names(&first.data), expected(1..=20));
    assert!(first.metadata.has_next);
    assert!(!first.metadata.has_previous);

    let second = storage
        .list_products(&ctx, &filter, &Paging::from_query(Some("20"), None, None))
        .await
        .unwrap();
    assert_eq!(names(&second.data), expected(21..=25));
    assert!(!second.metadata.has_next);
    assert!(second.metadata.has_previous);
}

#[tokio::test]
async fn backward_cursor_returns_ascending_rows_before_it() {
    let (storage, ctx) = catalogue(25).await;
    let filter = ProductFilter::default();

    let page = storage
        .list_products(&ctx, &filter, &Paging::new(-21, 5))
        .await
        .unwrap();
    assert_eq!(names(&page.data), expected(16..=20));
    assert!(page.metadata.has_next);
    assert!(page.metadata.has_previous);

    let head = storage
        .list_products(&ctx, &filter, &Paging::new(-6, 5))
        .await
        .unwrap();
    assert_eq!(names(&head.data), expected(1..=5));
    assert!(head.metadata.has_next);
    assert!(!head.metadata.has_previous);
}

#[tokio::test]
async fn every_forward_cursor_respects_the_bound() {
    let (storage, ctx) = catalogue(12).await;
    let filter = ProductFilter::default();

    for cursor in 0..=13 {
        for size in [1usize, 3, 5, 12] {
            let page = storage
                .list_products(&ctx, &filter, &Paging::new(cursor, size))
                .await
                .unwrap();
            let ids: Vec<i64> = page.data.iter().map(|p| p.id).collect();
            let remaining = (12 - cursor.min(12)) as usize;

            assert!(ids.iter().all(|id| *id > cursor));
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(ids.len(), remaining.min(size));
            assert_eq!(page.metadata.has_next, remaining > size);
        }
    }
}

#[tokio::test]
async fn every_backward_cursor_respects_the_bound() {
    let (storage, ctx) = catalogue(12).await;
    let filter = ProductFilter::default();

    for bound in 1..=13i64 {
        for size in [1usize, 4, 12] {
            let page = storage
                .list_products(&ctx, &filter, &Paging::new(-bound, size))
                .await
                .unwrap();
            let ids: Vec<i64> = page.data.iter().map(|p| p.id).collect();
            let available = (bound - 1).min(12) as usize;

            assert!(ids.iter().all(|id| *id < bound));
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(ids.len(), available.min(size));
            if ids.is_empty() {
                assert!(!page.metadata.has_next);
            } else {
                assert!(page.metadata.has_next);
                assert_eq!(page.metadata.has_previous, available > size);
            }
        }
    }
}

#[tokio::test]
async fn same_request_same_page() {
    let (storage, ctx) = catalogue(30).await;
    let filter = ProductFilter::default();
    let paging = Paging::from_query(Some("7"), Some("9"), Some("-price,name"));

    let a = storage.list_products(&ctx, &filter, &paging).await.unwrap();
    let b = storage.list_products(&ctx, &filter, &paging).await.unwrap();
    assert_eq!(a, b);
}
