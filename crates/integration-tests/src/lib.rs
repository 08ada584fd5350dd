//! Integration test harness for the PickPack storefront.
//!
//! [`MockApi`] serves the subset of the PickPack REST API the storefront
//! talks to from an in-process axum server on an ephemeral port. Tests seed
//! it with catalog, stock and account data, drive a real [`Storefront`]
//! against it and then read its request counters.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pickpack-integration-tests
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use pickpack_storefront::Storefront;
use pickpack_storefront::config::{ApiConfig, DirectPayConfig, StorefrontConfig};
use pickpack_storefront::storage::MemoryStorage;
use serde_json::{Value, json};

/// Password every seeded account accepts.
pub const TEST_PASSWORD: &str = "correct horse";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// State
// =============================================================================

/// A registered account: user object as the API returns it, plus password.
#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: Value,
}

/// Data served by the mock and counters of what was asked.
#[derive(Debug, Default)]
pub struct MockState {
    categories: Mutex<Vec<Value>>,
    products: Mutex<Vec<Value>>,
    stock: Mutex<Vec<Value>>,
    accounts: Mutex<HashMap<String, Account>>,
    wishlist: Mutex<Vec<Value>>,
    next_item_id: AtomicUsize,

    /// Answer stock requests with 503.
    pub stock_down: AtomicBool,
    /// Answer every wishlist request with 500.
    pub wishlist_down: AtomicBool,

    pub stock_fetches: AtomicUsize,
    pub product_fetches: AtomicUsize,
    pub wishlist_checks: AtomicUsize,
    pub wishlist_adds: AtomicUsize,
    pub wishlist_counts: AtomicUsize,
    pub wishlist_requests: AtomicUsize,

    /// `Authorization` header of the last stock request.
    last_stock_auth: Mutex<Option<String>>,
}

impl MockState {
    pub fn set_categories(&self, categories: Vec<Value>) {
        *lock(&self.categories) = categories;
    }

    pub fn set_products(&self, products: Vec<Value>) {
        *lock(&self.products) = products;
    }

    /// Replace stock records with `(product id, available)` pairs.
    pub fn set_stock(&self, levels: &[(i64, i64)]) {
        *lock(&self.stock) = levels
            .iter()
            .map(|(product_id, available)| {
                json!({"productId": product_id, "availableQuantity": available})
            })
            .collect();
    }

    /// Seed an account that logs in with [`TEST_PASSWORD`].
    pub fn add_account(&self, user_id: i64, email: &str, first_name: &str) {
        lock(&self.accounts).insert(
            email.to_string(),
            Account {
                password: TEST_PASSWORD.to_string(),
                user: json!({
                    "id": user_id,
                    "email": email,
                    "firstName": first_name,
                    "lastName": "Perera",
                }),
            },
        );
    }

    /// Put a product on the wishlist directly.
    pub fn seed_wishlist(&self, product_id: i64, name: &str) {
        let item_id = self.next_item_id.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.wishlist).push(json!({
            "itemId": item_id,
            "productId": product_id,
            "productName": name,
            "productPrice": 100,
        }));
    }

    #[must_use]
    pub fn wishlist_len(&self) -> usize {
        lock(&self.wishlist).len()
    }

    #[must_use]
    pub fn last_stock_auth(&self) -> Option<String> {
        lock(&self.last_stock_auth).clone()
    }

    #[must_use]
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Server
// =============================================================================

/// A running mock API.
pub struct MockApi {
    /// API root, e.g. `http://127.0.0.1:41234/api`.
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockApi {
    /// Bind to an ephemeral port and serve in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(MockState::default());

        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}/api"),
            state,
        })
    }

    /// Storefront pointed at this mock, over in-memory storage tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the storefront cannot be built.
    pub fn storefront(
        &self,
    ) -> Result<(Storefront, Arc<MemoryStorage>, Arc<MemoryStorage>), pickpack_storefront::StorefrontError>
    {
        let config = StorefrontConfig {
            api: ApiConfig::new(&self.base_url),
            storage_dir: PathBuf::from(".pickpack-test"),
            directpay: DirectPayConfig::default(),
            sentry_dsn: None,
        };
        let session_tier = Arc::new(MemoryStorage::new());
        let persistent_tier = Arc::new(MemoryStorage::new());
        let store = Storefront::new(config, session_tier.clone(), persistent_tier.clone())?;
        Ok((store, session_tier, persistent_tier))
    }
}

fn router(state: Arc<MockState>) -> Router {
    let api = Router::new()
        .route("/inventory/categories", get(categories))
        .route("/inventory/products", get(products))
        .route("/inventory/stock-levels", get(stock_levels))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/pos/wishlists/user/{user_id}", get(wishlist_items))
        .route("/pos/wishlists/items", post(add_wishlist_item))
        .route("/pos/wishlists/items/{item_id}", delete(remove_wishlist_item))
        .route("/pos/wishlists/products/{product_id}", delete(remove_wishlist_product))
        .route("/pos/wishlists/check/{product_id}", get(check_wishlist))
        .route("/pos/wishlists/count", get(wishlist_count))
        .route("/pos/wishlists/clear", delete(clear_wishlist))
        .with_state(state);

    Router::new().nest("/api", api)
}

type Reply = (StatusCode, Json<Value>);

fn ok(data: Value) -> Reply {
    (StatusCode::OK, Json(json!({"success": true, "data": data})))
}

fn failure(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({"success": false, "message": message})))
}

fn page(items: &[Value], query: &HashMap<String, String>) -> Value {
    let number = query
        .get("pageNumber")
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let size = query
        .get("pageSize")
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(items.len())
        .max(1);
    let slice: Vec<Value> = items
        .iter()
        .skip((number - 1) * size)
        .take(size)
        .cloned()
        .collect();
    json!({"items": slice, "totalCount": items.len()})
}

// ===== Catalog =====

async fn categories(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    ok(page(&lock(&state.categories), &query))
}

async fn products(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    state.product_fetches.fetch_add(1, Ordering::SeqCst);

    let keyword = query.get("keyword").map(|k| k.to_lowercase());
    let category = query.get("categoryId");
    let matching: Vec<Value> = lock(&state.products)
        .iter()
        .filter(|p| {
            keyword.as_ref().is_none_or(|k| {
                p.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.to_lowercase().contains(k))
            })
        })
        .filter(|p| {
            category.is_none_or(|c| {
                p.get("categoryId").map(|id| id.to_string().trim_matches('"').to_string())
                    == Some(c.clone())
            })
        })
        .cloned()
        .collect();

    ok(page(&matching, &query))
}

async fn stock_levels(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    state.stock_fetches.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_stock_auth) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if state.stock_down.load(Ordering::SeqCst) {
        return failure(StatusCode::SERVICE_UNAVAILABLE, "Stock service unavailable");
    }
    ok(page(&lock(&state.stock), &query))
}

// ===== Auth =====

fn token_for(user: &Value) -> String {
    format!("token-{}", user.get("id").map(Value::to_string).unwrap_or_default())
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();

    let account = lock(&state.accounts).get(email).cloned();
    match account {
        Some(account) if account.password == password => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Login successful",
                "data": {
                    "user": account.user,
                    "token": token_for(&account.user),
                    "refreshToken": "refresh",
                    "expiresAt": "2030-01-01T00:00:00Z",
                },
            })),
        ),
        _ => failure(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    if email.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Email is required");
    }

    let mut accounts = lock(&state.accounts);
    if accounts.contains_key(email) {
        return failure(StatusCode::CONFLICT, "Email already registered");
    }

    let user = json!({
        "id": 1000 + accounts.len(),
        "email": email,
        "firstName": body.get("firstName"),
        "lastName": body.get("lastName"),
    });
    accounts.insert(
        email.to_string(),
        Account {
            password: body
                .get("password")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            user: user.clone(),
        },
    );
    (
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "Account created", "data": user})),
    )
}

// ===== Wishlist =====

/// Common gate for wishlist endpoints: outage switch, then bearer token.
fn wishlist_gate(state: &MockState, headers: &HeaderMap) -> Option<Reply> {
    state.wishlist_requests.fetch_add(1, Ordering::SeqCst);
    if state.wishlist_down.load(Ordering::SeqCst) {
        return Some(failure(StatusCode::INTERNAL_SERVER_ERROR, "Wishlist unavailable"));
    }
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer token-"));
    (!authorized).then(|| failure(StatusCode::UNAUTHORIZED, "Unauthorized"))
}

fn same_id(value: Option<&Value>, id: &str) -> bool {
    value.is_some_and(|v| v.to_string().trim_matches('"') == id)
}

async fn wishlist_items(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(_user_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if let Some(reply) = wishlist_gate(&state, &headers) {
        return reply;
    }
    let items = lock(&state.wishlist).clone();
    let page = page(&items, &query);
    (
        StatusCode::OK,
        Json(json!({"success": true, "data": page["items"], "totalCount": page["totalCount"]})),
    )
}

async fn add_wishlist_item(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if let Some(reply) = wishlist_gate(&state, &headers) {
        return reply;
    }
    state.wishlist_adds.fetch_add(1, Ordering::SeqCst);

    let item_id = state.next_item_id.fetch_add(1, Ordering::SeqCst) + 1;
    let mut item = body;
    item["itemId"] = json!(item_id);
    lock(&state.wishlist).push(item.clone());
    (
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "Product added to wishlist", "data": item})),
    )
}

async fn remove_wishlist_item(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> Reply {
    if let Some(reply) = wishlist_gate(&state, &headers) {
        return reply;
    }
    let mut wishlist = lock(&state.wishlist);
    let before = wishlist.len();
    wishlist.retain(|item| !same_id(item.get("itemId"), &item_id));
    if wishlist.len() == before {
        return failure(StatusCode::NOT_FOUND, "Wishlist item not found");
    }
    ok(Value::Null)
}

async fn remove_wishlist_product(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Reply {
    if let Some(reply) = wishlist_gate(&state, &headers) {
        return reply;
    }
    lock(&state.wishlist).retain(|item| !same_id(item.get("productId"), &product_id));
    ok(Value::Null)
}

async fn check_wishlist(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Reply {
    if let Some(reply) = wishlist_gate(&state, &headers) {
        return reply;
    }
    state.wishlist_checks.fetch_add(1, Ordering::SeqCst);
    let exists = lock(&state.wishlist)
        .iter()
        .any(|item| same_id(item.get("productId"), &product_id));
    ok(json!(exists))
}

async fn wishlist_count(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if let Some(reply) = wishlist_gate(&state, &headers) {
        return reply;
    }
    state.wishlist_counts.fetch_add(1, Ordering::SeqCst);
    ok(json!({"count": lock(&state.wishlist).len()}))
}

async fn clear_wishlist(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if let Some(reply) = wishlist_gate(&state, &headers) {
        return reply;
    }
    lock(&state.wishlist).clear();
    (
        StatusCode::OK,
        Json(json!({"success": true, "message": "Wishlist emptied"})),
    )
}
