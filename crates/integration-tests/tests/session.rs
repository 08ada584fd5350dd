//! Register, login, cart merge and logout against the mock API.

use pickpack_core::{ProductId, UserId};
use pickpack_integration_tests::{MockApi, TEST_PASSWORD};
use pickpack_storefront::api::types::{AuthResult, NewCustomer, Product};
use pickpack_storefront::cart::{GUEST_CART_KEY, user_cart_key};
use pickpack_storefront::events::StoreEvent;
use pickpack_storefront::session::SessionContext;
use pickpack_storefront::storage::KeyValueStore;
use rust_decimal::Decimal;
use secrecy::SecretString;

fn product(id: i64, price: i64) -> Product {
    Product::new(id, format!("Product {id}"), Decimal::new(price, 0))
}

fn password(raw: &str) -> SecretString {
    SecretString::from(raw.to_string())
}

#[tokio::test]
async fn test_login_merges_guest_cart_into_user_cart() {
    let api = MockApi::spawn().await.unwrap();
    api.state.add_account(7, "nimal@example.lk", "Nimal");
    let (store, _, persistent) = api.storefront().unwrap();
    let cart = store.cart();

    // a cart left from an earlier login
    cart.add_item(&product(1, 100), 1, None).unwrap();
    cart.add_item(&product(2, 200), 1, None).unwrap();
    let guest = persistent.get(GUEST_CART_KEY).unwrap().unwrap();
    persistent.set(&user_cart_key(&UserId::from(7_i64)), &guest).unwrap();
    persistent.remove(GUEST_CART_KEY).unwrap();

    cart.add_item(&product(1, 100), 3, None).unwrap();
    cart.add_item(&product(3, 300), 2, None).unwrap();

    let mut events = store.subscribe();
    let result = store.login("nimal@example.lk", &password(TEST_PASSWORD)).await;
    assert!(result.is_success(), "login failed: {result:?}");
    let AuthResult::Success(success) = result else {
        unreachable!();
    };
    assert_eq!(success.message, "Login successful");
    assert_eq!(success.user.id, UserId::from(7_i64));

    assert_eq!(cart.active_key(), "cart_7");
    let items = cart.get_cart();
    let quantity_of = |id: i64| {
        items
            .iter()
            .find(|item| item.product_id == ProductId::from(id))
            .map(|item| item.quantity)
    };
    assert_eq!(quantity_of(1), Some(3));
    assert_eq!(quantity_of(2), Some(1));
    assert_eq!(quantity_of(3), Some(2));
    assert_eq!(persistent.get(GUEST_CART_KEY).unwrap(), None);

    assert_eq!(events.try_recv().unwrap(), StoreEvent::CartChanged { count: 6 });
    assert_eq!(events.try_recv().unwrap(), StoreEvent::WishlistChanged { count: 0 });
}

#[tokio::test]
async fn test_login_stores_session_in_session_tier() {
    let api = MockApi::spawn().await.unwrap();
    api.state.add_account(7, "nimal@example.lk", "Nimal");
    let (store, session_tier, _) = api.storefront().unwrap();

    let result = store.login("nimal@example.lk", &password(TEST_PASSWORD)).await;
    assert!(result.is_success());

    let auth = store.auth();
    assert!(auth.is_logged_in());
    assert_eq!(auth.bearer_token().as_deref(), Some("token-7"));
    assert_eq!(auth.refresh_token().as_deref(), Some("refresh"));
    assert!(auth.token_expires_at().is_some());
    assert!(session_tier.get("loggedInUser").unwrap().is_some());
}

#[tokio::test]
async fn test_bad_password_keeps_guest_state() {
    let api = MockApi::spawn().await.unwrap();
    api.state.add_account(7, "nimal@example.lk", "Nimal");
    let (store, _, _) = api.storefront().unwrap();
    store.cart().add_item(&product(1, 100), 1, None).unwrap();

    let result = store.login("nimal@example.lk", &password("wrong")).await;
    assert_eq!(result.message(), "Invalid email or password");
    assert!(!store.auth().is_logged_in());
    assert_eq!(store.cart().active_key(), GUEST_CART_KEY);
    assert_eq!(store.cart().get_count(), 1);
}

#[tokio::test]
async fn test_logout_returns_to_guest_cart_and_keeps_user_cart() {
    let api = MockApi::spawn().await.unwrap();
    api.state.add_account(7, "nimal@example.lk", "Nimal");
    let (store, _, persistent) = api.storefront().unwrap();

    store.login("nimal@example.lk", &password(TEST_PASSWORD)).await;
    store.cart().add_item(&product(1, 100), 2, None).unwrap();

    let mut events = store.subscribe();
    store.logout().await;

    assert!(!store.auth().is_logged_in());
    assert_eq!(store.auth().current_user_id(), None);
    assert_eq!(store.cart().get_count(), 0);
    assert!(persistent.get("cart_7").unwrap().is_some());
    assert_eq!(events.try_recv().unwrap(), StoreEvent::CartChanged { count: 0 });
    assert_eq!(events.try_recv().unwrap(), StoreEvent::WishlistChanged { count: 0 });

    // logging back in finds the saved cart
    store.login("nimal@example.lk", &password(TEST_PASSWORD)).await;
    assert_eq!(store.cart().get_count(), 2);
}

#[tokio::test]
async fn test_register_does_not_log_in() {
    let api = MockApi::spawn().await.unwrap();
    let (store, _, _) = api.storefront().unwrap();

    let customer = NewCustomer {
        first_name: "Kamala".to_string(),
        last_name: "Silva".to_string(),
        email: None,
        email_address: Some("kamala@example.lk".to_string()),
        password: password("s3cret-pass"),
    };
    let result = store.register(&customer).await;
    assert!(result.is_success());
    assert_eq!(result.message(), "Account created");
    assert!(!store.auth().is_logged_in());

    let again = store.register(&customer).await;
    assert_eq!(again.message(), "Email already registered");

    let login = store.login("kamala@example.lk", &password("s3cret-pass")).await;
    assert!(login.is_success());
}
