//! PickPack REST API gateway.
//!
//! # Architecture
//!
//! - Plain REST over `reqwest`; every endpoint answers with a JSON envelope
//!   `{success, message?, data}` whose inner shape varies by endpoint
//! - Catalog and auth calls fail open: they never return an error to the
//!   caller, only empty results or a failure variant
//! - Wishlist calls return the raw status and body; shape detection lives in
//!   the wishlist store because the upstream shapes drift between releases
//! - The gateway holds no state beyond the HTTP client
//!
//! # Example
//!
//! ```rust,ignore
//! use pickpack_storefront::api::ApiClient;
//!
//! let client = ApiClient::new(&config.api, session)?;
//!
//! let categories = client.list_categories().await;
//! let page = client.list_products(0, 8, None, Some("tea")).await;
//! ```

pub mod conversions;
pub mod types;

use std::sync::Arc;

use pickpack_core::{CategoryId, ProductId, UserId, WishlistItemId};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::session::SessionContext;

use conversions::{
    convert_category, convert_product, convert_stock_record, envelope_items,
    envelope_total_count, error_message, is_success_envelope,
};
use types::{
    AuthResult, AuthSuccess, Category, CurrentUser, NewCustomer, Product, ProductPage,
    StockRecord,
};

/// Page size used when a call needs "the whole catalog" in one request.
pub const FULL_CATALOG_PAGE_SIZE: u32 = 1000;

/// Errors that can occur when talking to the PickPack API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Response did not have the expected shape.
    #[error("Unexpected response shape: {0}")]
    Shape(String),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Status and decoded body of an API response.
///
/// Bodies that are not JSON decode to [`Value::Null`].
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl RawResponse {
    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// True for 401 and 403.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }
}

/// Whether a request carries the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bearer,
    Anonymous,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the PickPack REST API.
///
/// Cheap to clone; all clones share one connection pool and session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionContext>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client fails
    /// to build.
    pub fn new(config: &ApiConfig, session: Arc<dyn SessionContext>) -> Result<Self, ApiError> {
        Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                session,
            }),
        })
    }

    /// Session used for identity and bearer tokens.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn SessionContext> {
        &self.inner.session
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{path}", self.inner.base_url))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Send a request and decode the body as JSON.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        auth: Auth,
    ) -> Result<RawResponse, ApiError> {
        let headers = match auth {
            Auth::Bearer => self.inner.session.auth_headers(),
            Auth::Anonymous => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
                headers
            }
        };

        let mut request = self
            .inner
            .client
            .request(method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            debug!(
                %method,
                path = url.path(),
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "PickPack API returned non-success status"
            );
        }

        Ok(RawResponse { status, body })
    }

    async fn get(&self, url: Url, auth: Auth) -> Result<RawResponse, ApiError> {
        self.send(Method::GET, url, None, auth).await
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// List all categories, sorted by name (case-insensitive).
    ///
    /// Returns an empty list on any network or shape error.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Vec<Category> {
        let result = async {
            let url = self.url(
                "/inventory/categories",
                &[
                    ("pageNumber", "1".to_string()),
                    ("pageSize", FULL_CATALOG_PAGE_SIZE.to_string()),
                ],
            )?;
            let response = self.get(url, Auth::Bearer).await?;
            ensure_success(&response)?;
            let items = envelope_items(&response.body)
                .ok_or_else(|| ApiError::Shape("categories envelope".to_string()))?;
            Ok::<_, ApiError>(items.iter().filter_map(convert_category).collect::<Vec<_>>())
        }
        .await;

        match result {
            Ok(mut categories) => {
                categories.sort_by_key(|c| c.name.to_lowercase());
                categories
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch categories");
                Vec::new()
            }
        }
    }

    /// List one page of products.
    ///
    /// `offset`/`limit` are converted to `pageNumber = offset / limit + 1`.
    /// Blank keywords are not sent. Returns an empty page on any error.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        offset: u32,
        limit: u32,
        category_id: Option<&CategoryId>,
        keyword: Option<&str>,
    ) -> ProductPage {
        match self.try_list_products(offset, limit, category_id, keyword).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Failed to fetch products");
                ProductPage::default()
            }
        }
    }

    async fn try_list_products(
        &self,
        offset: u32,
        limit: u32,
        category_id: Option<&CategoryId>,
        keyword: Option<&str>,
    ) -> Result<ProductPage, ApiError> {
        let limit = limit.max(1);
        let page_number = offset / limit + 1;

        let mut query = vec![
            ("pageNumber", page_number.to_string()),
            ("pageSize", limit.to_string()),
        ];
        if let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) {
            query.push(("keyword", keyword.to_string()));
        }
        if let Some(category_id) = category_id.filter(|c| !c.is_blank()) {
            query.push(("categoryId", category_id.to_string()));
        }

        let url = self.url("/inventory/products", &query)?;
        let response = self.get(url, Auth::Bearer).await?;
        ensure_success(&response)?;

        let items = envelope_items(&response.body)
            .ok_or_else(|| ApiError::Shape("products envelope".to_string()))?;
        Ok(ProductPage {
            items: items.iter().filter_map(convert_product).collect(),
            total_count: envelope_total_count(&response.body),
        })
    }

    /// Find a product by ID.
    ///
    /// There is no single-product endpoint: this fetches one large listing
    /// page and scans it, so it costs a full catalog request and only sees
    /// what the listing sees.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product_by_id(&self, product_id: &ProductId) -> Option<Product> {
        self.list_products(0, FULL_CATALOG_PAGE_SIZE, None, None)
            .await
            .items
            .into_iter()
            .find(|p| &p.id == product_id)
    }

    /// Fetch per-warehouse stock levels. This endpoint is public and is
    /// called without a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with a
    /// non-success status, or the envelope is not recognized.
    #[instrument(skip(self))]
    pub async fn fetch_stock_levels(
        &self,
        page: u32,
        size: u32,
    ) -> Result<Vec<StockRecord>, ApiError> {
        let url = self.url(
            "/inventory/stock-levels",
            &[("pageNumber", page.to_string()), ("pageSize", size.to_string())],
        )?;
        let response = self.get(url, Auth::Anonymous).await?;
        ensure_success(&response)?;

        let items = envelope_items(&response.body)
            .ok_or_else(|| ApiError::Shape("stock levels envelope".to_string()))?;
        Ok(items.iter().filter_map(convert_stock_record).collect())
    }

    // =========================================================================
    // Auth Methods
    // =========================================================================

    /// Register a new customer.
    #[instrument(skip(self, customer), fields(email = customer.resolved_email().unwrap_or_default()))]
    pub async fn register(&self, customer: &NewCustomer) -> AuthResult {
        let body = json!({
            "firstName": customer.first_name,
            "lastName": customer.last_name,
            "email": customer.resolved_email(),
            "password": customer.password.expose_secret(),
        });

        self.authenticate(
            "/auth/register",
            &body,
            "Registration failed",
            "Registration failed. Please try again.",
            "Registration successful!",
        )
        .await
    }

    /// Log a customer in.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &secrecy::SecretString) -> AuthResult {
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
        });

        self.authenticate(
            "/auth/login",
            &body,
            "Login failed",
            "Login failed. Please check your credentials and try again.",
            "Login successful!",
        )
        .await
    }

    async fn authenticate(
        &self,
        path: &str,
        body: &Value,
        rejected_default: &str,
        transport_default: &str,
        success_default: &str,
    ) -> AuthResult {
        let response = match self.url(path, &[]) {
            Ok(url) => self.send(Method::POST, url, Some(body), Auth::Anonymous).await,
            Err(e) => Err(e),
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, path, "Auth request failed");
                return AuthResult::Failure {
                    message: transport_default.to_string(),
                };
            }
        };

        if !response.is_success() {
            return AuthResult::Failure {
                message: error_message(&response.body, rejected_default),
            };
        }

        match parse_auth_success(&response.body, success_default) {
            Some(success) => AuthResult::Success(Box::new(success)),
            None => AuthResult::Failure {
                message: error_message(&response.body, "Invalid response format"),
            },
        }
    }

    // =========================================================================
    // Wishlist Methods
    // =========================================================================

    /// `GET /pos/wishlists/user/{userId}`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn wishlist_items(
        &self,
        user_id: &UserId,
        page: u32,
        size: u32,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url(
            &format!("/pos/wishlists/user/{}", urlencoding::encode(user_id.as_str())),
            &[("pageNumber", page.to_string()), ("pageSize", size.to_string())],
        )?;
        self.get(url, Auth::Bearer).await
    }

    /// `POST /pos/wishlists/items`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    #[instrument(skip(self, product), fields(user_id = %user_id, product_id = %product.id))]
    pub async fn add_wishlist_item(
        &self,
        user_id: &UserId,
        product: &Product,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url("/pos/wishlists/items", &[])?;
        let body = json!({
            "userId": user_id,
            "productId": product.id,
            "productName": product.name,
            "productPrice": product.cart_price(),
        });
        self.send(Method::POST, url, Some(&body), Auth::Bearer).await
    }

    /// `DELETE /pos/wishlists/items/{itemId}?userId`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn remove_wishlist_item(
        &self,
        user_id: &UserId,
        item_id: &WishlistItemId,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url(
            &format!("/pos/wishlists/items/{}", urlencoding::encode(item_id.as_str())),
            &[("userId", user_id.to_string())],
        )?;
        self.send(Method::DELETE, url, None, Auth::Bearer).await
    }

    /// `DELETE /pos/wishlists/products/{productId}?userId`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_wishlist_product(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url(
            &format!("/pos/wishlists/products/{}", urlencoding::encode(product_id.as_str())),
            &[("userId", user_id.to_string())],
        )?;
        self.send(Method::DELETE, url, None, Auth::Bearer).await
    }

    /// `GET /pos/wishlists/check/{productId}?userId`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn check_wishlist_product(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url(
            &format!("/pos/wishlists/check/{}", urlencoding::encode(product_id.as_str())),
            &[("userId", user_id.to_string())],
        )?;
        self.get(url, Auth::Bearer).await
    }

    /// `GET /pos/wishlists/count?userId`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn wishlist_count(&self, user_id: &UserId) -> Result<RawResponse, ApiError> {
        let url = self.url("/pos/wishlists/count", &[("userId", user_id.to_string())])?;
        self.get(url, Auth::Bearer).await
    }

    /// `DELETE /pos/wishlists/clear?userId`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_wishlist(&self, user_id: &UserId) -> Result<RawResponse, ApiError> {
        let url = self.url("/pos/wishlists/clear", &[("userId", user_id.to_string())])?;
        self.send(Method::DELETE, url, None, Auth::Bearer).await
    }
}

/// Turn a non-2xx response into [`ApiError::Status`].
fn ensure_success(response: &RawResponse) -> Result<(), ApiError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ApiError::Status {
            status: response.status.as_u16(),
            message: error_message(&response.body, "request failed"),
        })
    }
}

/// Decode `{success: true, data: ...}` from register/login.
///
/// Login nests the user under `data.user`; register returns the user as
/// `data` itself. Both are accepted.
fn parse_auth_success(body: &Value, success_default: &str) -> Option<AuthSuccess> {
    if !is_success_envelope(body) {
        return None;
    }
    let data = body.get("data").filter(|d| d.is_object())?;
    let user_value = data.get("user").filter(|u| u.is_object()).unwrap_or(data);
    let user: CurrentUser = serde_json::from_value(user_value.clone()).ok()?;

    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(AuthSuccess {
        user,
        token: text("token"),
        refresh_token: text("refreshToken"),
        expires_at: text("expiresAt"),
        message: conversions::non_empty_str(body.get("message"))
            .unwrap_or(success_default)
            .to_string(),
    })
}
