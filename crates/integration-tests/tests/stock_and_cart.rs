//! Stock cache behavior and stock-checked cart adds against the mock API.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use pickpack_core::ProductId;
use pickpack_integration_tests::{MockApi, MockState};
use pickpack_storefront::api::types::Product;
use pickpack_storefront::cart::CartRejection;
use pickpack_storefront::stock::{ManualClock, STOCK_TTL_SECS, StockCache};
use rust_decimal::Decimal;

fn tea() -> Product {
    Product::new(10_i64, "Ceylon Black Tea", Decimal::new(850, 0))
}

#[tokio::test]
async fn test_stock_levels_summed_and_cached_for_ttl() {
    let api = MockApi::spawn().await.unwrap();
    api.state.set_stock(&[(10, 3), (10, 4), (11, 0)]);
    let (store, _, _) = api.storefront().unwrap();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let stock = StockCache::with_clock(store.api().clone(), clock.clone());

    let levels = stock.get_stock_map().await;
    assert_eq!(levels.available(&ProductId::from(10_i64)), Some(7));
    assert_eq!(levels.available(&ProductId::from(11_i64)), Some(0));
    assert_eq!(levels.available(&ProductId::from(12_i64)), None);

    clock.advance(TimeDelta::seconds(STOCK_TTL_SECS - 1));
    stock.get_stock_map().await;
    assert_eq!(MockState::count(&api.state.stock_fetches), 1);

    clock.advance(TimeDelta::seconds(1));
    stock.get_stock_map().await;
    assert_eq!(MockState::count(&api.state.stock_fetches), 2);
}

#[tokio::test]
async fn test_stock_request_is_anonymous() {
    let api = MockApi::spawn().await.unwrap();
    api.state.set_stock(&[(10, 1)]);
    let (store, _, _) = api.storefront().unwrap();

    store.stock().get_stock_map().await;
    assert_eq!(MockState::count(&api.state.stock_fetches), 1);
    assert_eq!(api.state.last_stock_auth(), None);
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let api = MockApi::spawn().await.unwrap();
    api.state.set_stock(&[(10, 5)]);
    let (store, _, _) = api.storefront().unwrap();

    store.stock().get_stock_map().await;
    store.stock().invalidate();
    api.state.set_stock(&[(10, 2)]);

    assert_eq!(store.stock().available(&ProductId::from(10_i64)).await, Some(2));
    assert_eq!(MockState::count(&api.state.stock_fetches), 2);
}

#[tokio::test]
async fn test_stale_levels_served_when_refresh_fails() {
    let api = MockApi::spawn().await.unwrap();
    api.state.set_stock(&[(10, 5)]);
    let (store, _, _) = api.storefront().unwrap();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let stock = StockCache::with_clock(store.api().clone(), clock.clone());
    stock.get_stock_map().await;

    api.state
        .stock_down
        .store(true, std::sync::atomic::Ordering::SeqCst);
    clock.advance(TimeDelta::seconds(STOCK_TTL_SECS * 2));

    assert_eq!(stock.available(&ProductId::from(10_i64)).await, Some(5));
    assert_eq!(MockState::count(&api.state.stock_fetches), 2);
}

#[tokio::test]
async fn test_checked_add_uses_live_stock_as_ceiling() {
    let api = MockApi::spawn().await.unwrap();
    api.state.set_stock(&[(10, 2), (10, 1)]);
    let (store, _, _) = api.storefront().unwrap();
    let cart = store.cart();

    let items = cart.add_item_with_stock_check(&tea(), 2).await.unwrap();
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].stock_ceiling, Some(3));

    // success invalidates, so the next check fetches again
    let err = cart.add_item_with_stock_check(&tea(), 2).await.unwrap_err();
    assert_eq!(err, CartRejection::OnlyRemaining { remaining: 1 });
    assert_eq!(MockState::count(&api.state.stock_fetches), 2);

    cart.add_item_with_stock_check(&tea(), 1).await.unwrap();
    let err = cart.add_item_with_stock_check(&tea(), 1).await.unwrap_err();
    assert_eq!(err, CartRejection::LimitReached { ceiling: 3 });
    assert_eq!(cart.get_count(), 3);
}

#[tokio::test]
async fn test_checked_add_rejects_out_of_stock() {
    let api = MockApi::spawn().await.unwrap();
    api.state.set_stock(&[(10, 0), (11, 4)]);
    let (store, _, _) = api.storefront().unwrap();

    let err = store
        .cart()
        .add_item_with_stock_check(&tea(), 1)
        .await
        .unwrap_err();
    assert_eq!(err, CartRejection::OutOfStock);

    // no record at all also reads as out of stock
    let unknown = Product::new(99_i64, "Unlisted", Decimal::ONE);
    let err = store
        .cart()
        .add_item_with_stock_check(&unknown, 1)
        .await
        .unwrap_err();
    assert_eq!(err, CartRejection::OutOfStock);
    assert!(store.cart().get_cart().is_empty());
}

#[tokio::test]
async fn test_checked_add_proceeds_when_stock_unavailable() {
    let api = MockApi::spawn().await.unwrap();
    api.state
        .stock_down
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let (store, _, _) = api.storefront().unwrap();

    let items = store
        .cart()
        .add_item_with_stock_check(&tea(), 5)
        .await
        .unwrap();
    assert_eq!(items[0].quantity, 5);
    assert_eq!(items[0].stock_ceiling, None);
}

#[tokio::test]
async fn test_update_quantity_respects_stored_ceiling() {
    let api = MockApi::spawn().await.unwrap();
    api.state.set_stock(&[(10, 4)]);
    let (store, _, _) = api.storefront().unwrap();
    let cart = store.cart();

    cart.add_item_with_stock_check(&tea(), 1).await.unwrap();
    let err = cart
        .update_quantity(&ProductId::from(10_i64), 5, None)
        .unwrap_err();
    assert_eq!(err, CartRejection::ExceedsStock { ceiling: 4 });

    let items = cart.update_quantity(&ProductId::from(10_i64), 4, None).unwrap();
    assert_eq!(items[0].quantity, 4);
    assert_eq!(cart.subtotal(), Decimal::new(3400, 0));
}
