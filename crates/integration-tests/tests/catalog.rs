//! Catalog reads against the mock API.

use pickpack_core::{CategoryId, ProductId};
use pickpack_integration_tests::MockApi;
use pickpack_storefront::Storefront;
use pickpack_storefront::config::{ApiConfig, StorefrontConfig};
use pickpack_storefront::storage::MemoryStorage;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

fn seed_catalog(api: &MockApi) {
    api.state.set_categories(vec![
        json!({"id": 3, "name": "spices"}),
        json!({"id": 1, "name": "Tea"}),
        json!({"id": 2, "name": "Biscuits"}),
    ]);
    api.state.set_products(vec![
        json!({"id": 10, "name": "Ceylon Black Tea", "categoryId": 1, "unitPrice": 850, "imageURL": "https://cdn/tea.png"}),
        json!({"id": 11, "name": "Green Tea", "categoryId": 1, "unitPrice": 0, "sellingPrice": "920.50"}),
        json!({"id": 12, "name": "Cream Crackers", "categoryId": 2, "unitPrice": 310}),
        json!({"name": "No id, skipped"}),
    ]);
}

#[tokio::test]
async fn test_categories_sorted_case_insensitively() {
    let api = MockApi::spawn().await.unwrap();
    seed_catalog(&api);
    let (store, _, _) = api.storefront().unwrap();

    let names: Vec<String> = store
        .api()
        .list_categories()
        .await
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Biscuits", "spices", "Tea"]);
}

#[tokio::test]
async fn test_products_are_normalized() {
    let api = MockApi::spawn().await.unwrap();
    seed_catalog(&api);
    let (store, _, _) = api.storefront().unwrap();

    let page = store.api().list_products(0, 12, None, None).await;
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total_count, 4);

    let black = &page.items[0];
    assert_eq!(black.id, ProductId::from(10_i64));
    assert_eq!(black.image_url.as_deref(), Some("https://cdn/tea.png"));
    assert_eq!(black.unit_price, Decimal::new(850, 0));

    let green = &page.items[1];
    assert_eq!(green.unit_price, Decimal::new(92050, 2));
}

#[tokio::test]
async fn test_products_filter_by_keyword_and_category() {
    let api = MockApi::spawn().await.unwrap();
    seed_catalog(&api);
    let (store, _, _) = api.storefront().unwrap();

    let teas = store.api().list_products(0, 12, None, Some("tea")).await;
    assert_eq!(teas.items.len(), 2);

    let biscuits = store
        .api()
        .list_products(0, 12, Some(&CategoryId::from(2_i64)), Some("   "))
        .await;
    assert_eq!(biscuits.items.len(), 1);
    assert_eq!(biscuits.items[0].name, "Cream Crackers");
}

#[tokio::test]
async fn test_offset_maps_to_page_number() {
    let api = MockApi::spawn().await.unwrap();
    seed_catalog(&api);
    let (store, _, _) = api.storefront().unwrap();

    // offset 2, limit 2 -> page 2: the crackers plus the entry without an id
    let page = store.api().list_products(2, 2, None, None).await;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "Cream Crackers");
    assert_eq!(page.total_count, 4);

    let page = store.api().list_products(1, 2, None, None).await;
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn test_get_product_by_id_scans_listing() {
    let api = MockApi::spawn().await.unwrap();
    seed_catalog(&api);
    let (store, _, _) = api.storefront().unwrap();

    let product = store.api().get_product_by_id(&ProductId::from("12")).await;
    assert_eq!(product.map(|p| p.name).as_deref(), Some("Cream Crackers"));
    assert!(store.api().get_product_by_id(&ProductId::from(99_i64)).await.is_none());
}

#[tokio::test]
async fn test_unreachable_api_yields_empty_results() {
    let config = StorefrontConfig {
        api: ApiConfig::new("http://127.0.0.1:9/api"),
        storage_dir: ".pickpack-test".into(),
        directpay: Default::default(),
        sentry_dsn: None,
    };
    let store = Storefront::new(
        config,
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    assert!(store.api().list_categories().await.is_empty());
    let page = store.api().list_products(0, 12, None, None).await;
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
}
