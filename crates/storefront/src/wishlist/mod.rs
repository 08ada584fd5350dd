//! Server-side wishlist with a read-through cache.
//!
//! The wishlist lives only on the PickPack API. This store caches pages and
//! the item count per user (`moka`, 5 minute TTL) and drops the whole cache
//! after every successful mutation, then re-fetches the count so that
//! [`StoreEvent::WishlistChanged`] always carries the server's number.
//!
//! Every operation needs a logged-in user. Without one, reads return empty
//! results and mutations return [`WishlistRejection::LoginRequired`] without
//! touching the network.

mod cache;
pub mod shapes;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use pickpack_core::{ProductId, UserId, WishlistItemId};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::api::conversions::{error_message, non_empty_str};
use crate::api::types::{Product, WishlistPage};
use crate::api::{ApiClient, ApiError, RawResponse};
use crate::events::{EventBus, StoreEvent};

use cache::{CacheKey, CacheValue};

/// Default page size for wishlist listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// A wishlist change refused or failed. `Display` is the message shown to the
/// shopper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WishlistRejection {
    #[error("Please login to add items to your wishlist")]
    LoginRequired,

    #[error("This product is already in your wishlist")]
    AlreadyInWishlist,

    /// The API answered 401 or 403.
    #[error("Your session has expired. Please login again.")]
    SessionExpired,

    /// Any other failure, with the most specific message available.
    #[error("{0}")]
    Failed(String),
}

/// A successful wishlist change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistUpdate {
    pub message: String,
    /// Item count fetched after the change.
    pub count: u64,
}

/// Wishlist store over the API gateway.
///
/// Cheap to clone; clones share the cache. The duplicate check before an add
/// is not atomic with the add itself.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistStoreInner>,
}

struct WishlistStoreInner {
    api: ApiClient,
    events: EventBus,
    cache: Cache<CacheKey, CacheValue>,
}

impl WishlistStore {
    #[must_use]
    pub fn new(api: ApiClient, events: EventBus) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(300))
            .build();

        Self {
            inner: Arc::new(WishlistStoreInner { api, events, cache }),
        }
    }

    fn user_id(&self) -> Option<UserId> {
        self.inner.api.session().current_user_id()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// One page of the current user's wishlist.
    ///
    /// Empty when logged out, on any failure, or when the response matches
    /// none of the known layouts.
    #[instrument(skip(self))]
    pub async fn get_wishlist(&self, page: u32, size: u32) -> WishlistPage {
        let Some(user_id) = self.user_id() else {
            return WishlistPage::default();
        };

        let key = CacheKey::Items {
            user_id: user_id.clone(),
            page,
            size,
        };
        if let Some(CacheValue::Items(cached)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for wishlist page");
            return cached;
        }

        let response = match self.inner.api.wishlist_items(&user_id, page, size).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(status = %response.status, "Wishlist fetch rejected");
                return WishlistPage::default();
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch wishlist");
                return WishlistPage::default();
            }
        };

        let Some(parsed) = shapes::parse_list(&response.body) else {
            warn!("Unrecognized wishlist response shape");
            return WishlistPage::default();
        };

        let total_count = parsed
            .total_count
            .unwrap_or(parsed.items.len() as u64);
        let page = WishlistPage {
            items: parsed.items,
            total_count,
        };
        self.inner
            .cache
            .insert(key, CacheValue::Items(page.clone()))
            .await;
        page
    }

    /// Whether a product is on the current user's wishlist.
    ///
    /// Any failure reads as `false`, which lets an add go ahead rather than
    /// block it.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn check_product_in_wishlist(&self, product_id: &ProductId) -> bool {
        let Some(user_id) = self.user_id() else {
            return false;
        };

        match self
            .inner
            .api
            .check_wishlist_product(&user_id, product_id)
            .await
        {
            Ok(response) if response.is_success() => {
                shapes::parse_check(&response.body).unwrap_or(false)
            }
            Ok(response) => {
                debug!(status = %response.status, "Wishlist check rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "Wishlist check failed");
                false
            }
        }
    }

    /// Number of items on the current user's wishlist. Zero on any failure.
    #[instrument(skip(self))]
    pub async fn get_wishlist_count(&self) -> u64 {
        let Some(user_id) = self.user_id() else {
            return 0;
        };

        let key = CacheKey::Count(user_id.clone());
        if let Some(CacheValue::Count(count)) = self.inner.cache.get(&key).await {
            return count;
        }

        let count = match self.inner.api.wishlist_count(&user_id).await {
            Ok(response) if response.is_success() => shapes::parse_count(&response.body),
            Ok(response) => {
                debug!(status = %response.status, "Wishlist count rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch wishlist count");
                None
            }
        };

        match count {
            Some(count) => {
                self.inner.cache.insert(key, CacheValue::Count(count)).await;
                count
            }
            None => 0,
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product.
    ///
    /// When logged out, publishes [`StoreEvent::LoginRequired`] with
    /// `return_to` so the front end can redirect, and makes no request.
    ///
    /// # Errors
    ///
    /// Returns a [`WishlistRejection`] when logged out, when the product is
    /// already listed, or when the API refuses the add.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_wishlist(
        &self,
        product: &Product,
        return_to: Option<&str>,
    ) -> Result<WishlistUpdate, WishlistRejection> {
        let Some(user_id) = self.user_id() else {
            self.inner.events.publish(StoreEvent::LoginRequired {
                return_to: return_to.map(str::to_string),
            });
            return Err(WishlistRejection::LoginRequired);
        };

        if self.check_product_in_wishlist(&product.id).await {
            return Err(WishlistRejection::AlreadyInWishlist);
        }

        let response = self.inner.api.add_wishlist_item(&user_id, product).await;
        self.finish_mutation(
            response,
            "Failed to add to wishlist",
            "Added to wishlist",
        )
        .await
    }

    /// Remove an entry by its server-assigned ID.
    ///
    /// # Errors
    ///
    /// Returns a [`WishlistRejection`] when logged out or when the API
    /// refuses the removal.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_from_wishlist(
        &self,
        item_id: &WishlistItemId,
    ) -> Result<WishlistUpdate, WishlistRejection> {
        let user_id = self.user_id().ok_or(WishlistRejection::LoginRequired)?;
        let response = self.inner.api.remove_wishlist_item(&user_id, item_id).await;
        self.finish_mutation(
            response,
            "Failed to remove from wishlist",
            "Removed from wishlist",
        )
        .await
    }

    /// Remove a product, whatever entry holds it.
    ///
    /// # Errors
    ///
    /// Returns a [`WishlistRejection`] when logged out or when the API
    /// refuses the removal.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_product_from_wishlist(
        &self,
        product_id: &ProductId,
    ) -> Result<WishlistUpdate, WishlistRejection> {
        let user_id = self.user_id().ok_or(WishlistRejection::LoginRequired)?;
        let response = self
            .inner
            .api
            .remove_wishlist_product(&user_id, product_id)
            .await;
        self.finish_mutation(
            response,
            "Failed to remove from wishlist",
            "Removed from wishlist",
        )
        .await
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns a [`WishlistRejection`] when logged out or when the API
    /// refuses the clear.
    #[instrument(skip(self))]
    pub async fn clear_wishlist(&self) -> Result<WishlistUpdate, WishlistRejection> {
        let user_id = self.user_id().ok_or(WishlistRejection::LoginRequired)?;
        let response = self.inner.api.clear_wishlist(&user_id).await;
        self.finish_mutation(response, "Failed to clear wishlist", "Wishlist cleared")
            .await
    }

    /// Map a mutation response to a result; on success drop the cache and
    /// publish the refreshed count.
    async fn finish_mutation(
        &self,
        response: Result<RawResponse, ApiError>,
        failure_default: &str,
        success_default: &str,
    ) -> Result<WishlistUpdate, WishlistRejection> {
        let response = response.map_err(|e| {
            warn!(error = %e, "Wishlist request failed");
            WishlistRejection::Failed(format!("{failure_default}. Please try again."))
        })?;

        if response.is_auth_failure() {
            return Err(WishlistRejection::SessionExpired);
        }
        let flagged_failure =
            response.body.get("success").and_then(serde_json::Value::as_bool) == Some(false);
        if !response.is_success() || flagged_failure {
            return Err(WishlistRejection::Failed(error_message(
                &response.body,
                failure_default,
            )));
        }

        let count = self.refresh().await;
        Ok(WishlistUpdate {
            message: non_empty_str(response.body.get("message"))
                .unwrap_or(success_default)
                .to_string(),
            count,
        })
    }

    /// Drop all cached pages and counts, fetch the count again and publish it.
    pub async fn refresh(&self) -> u64 {
        self.invalidate_all().await;
        let count = self.get_wishlist_count().await;
        self.inner
            .events
            .publish(StoreEvent::WishlistChanged { count });
        count
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::config::ApiConfig;
    use crate::session::{SessionContext, StaticSession};

    fn offline_store(session: StaticSession) -> (WishlistStore, EventBus) {
        let session: Arc<dyn SessionContext> = Arc::new(session);
        let api = ApiClient::new(&ApiConfig::new("http://127.0.0.1:9/api"), session).unwrap();
        let events = EventBus::new();
        (WishlistStore::new(api, events.clone()), events)
    }

    fn logged_in() -> StaticSession {
        StaticSession {
            user_id: Some(UserId::from("u1")),
            token: Some("tok".into()),
        }
    }

    #[tokio::test]
    async fn test_add_requires_login() {
        let (store, events) = offline_store(StaticSession::default());
        let mut rx = events.subscribe();

        let result = store
            .add_to_wishlist(&Product::new("p1", "Tea", Decimal::ONE), Some("/product/p1"))
            .await;

        let rejection = result.unwrap_err();
        assert_eq!(rejection, WishlistRejection::LoginRequired);
        assert!(rejection.to_string().starts_with("Please login"));
        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::LoginRequired {
                return_to: Some("/product/p1".into())
            }
        );
    }

    #[tokio::test]
    async fn test_logged_out_reads_are_empty() {
        let (store, _) = offline_store(StaticSession::default());
        assert_eq!(store.get_wishlist(1, 10).await, WishlistPage::default());
        assert_eq!(store.get_wishlist_count().await, 0);
        assert!(!store.check_product_in_wishlist(&ProductId::from("p1")).await);
        assert_eq!(
            store.clear_wishlist().await,
            Err(WishlistRejection::LoginRequired)
        );
    }

    #[tokio::test]
    async fn test_failures_degrade_to_defaults() {
        let (store, _) = offline_store(logged_in());
        assert_eq!(store.get_wishlist_count().await, 0);
        assert!(store.get_wishlist(1, 10).await.items.is_empty());
        assert!(!store.check_product_in_wishlist(&ProductId::from("p1")).await);
    }

    #[tokio::test]
    async fn test_transport_failure_on_remove() {
        let (store, _) = offline_store(logged_in());
        let rejection = store
            .remove_product_from_wishlist(&ProductId::from("p1"))
            .await
            .unwrap_err();
        assert_eq!(
            rejection,
            WishlistRejection::Failed("Failed to remove from wishlist. Please try again.".into())
        );
    }
}
