//! Storefront handle shared across a shopping session.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::api::ApiClient;
use crate::api::types::{AuthResult, NewCustomer};
use crate::cart::CartStore;
use crate::config::StorefrontConfig;
use crate::error::StorefrontError;
use crate::events::{EventBus, StoreEvent};
use crate::payment::DirectPay;
use crate::session::{AuthSession, SessionContext};
use crate::stock::StockCache;
use crate::storage::{FileStorage, KeyValueStore};
use crate::wishlist::WishlistStore;

/// Gateway, stores, session and event bus wired together.
///
/// This struct is cheaply cloneable via `Arc`; every clone sees the same
/// caches and storage tiers.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    auth: AuthSession,
    api: ApiClient,
    stock: StockCache,
    cart: CartStore,
    wishlist: WishlistStore,
    payment: DirectPay,
    events: EventBus,
}

impl Storefront {
    /// Create a storefront over the given storage tiers.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `session_tier` - Auth state and payment results for this session
    /// * `persistent_tier` - Carts, plus legacy auth state
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        session_tier: Arc<dyn KeyValueStore>,
        persistent_tier: Arc<dyn KeyValueStore>,
    ) -> Result<Self, StorefrontError> {
        let auth = AuthSession::new(session_tier.clone(), persistent_tier.clone());
        let session: Arc<dyn SessionContext> = Arc::new(auth.clone());
        let events = EventBus::new();

        let api = ApiClient::new(&config.api, session.clone())?;
        let stock = StockCache::new(api.clone());
        let cart = CartStore::new(persistent_tier, session, stock.clone(), events.clone());
        let wishlist = WishlistStore::new(api.clone(), events.clone());
        let payment = DirectPay::new(config.directpay.clone(), session_tier);

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                auth,
                api,
                stock,
                cart,
                wishlist,
                payment,
                events,
            }),
        })
    }

    /// Create a storefront whose tiers are directories under
    /// `config.storage_dir` (`session/` and `local/`).
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created or the API
    /// client cannot be built.
    pub fn open(config: StorefrontConfig) -> Result<Self, StorefrontError> {
        let session_tier = Arc::new(FileStorage::open(config.storage_dir.join("session"))?);
        let persistent_tier = Arc::new(FileStorage::open(config.storage_dir.join("local"))?);
        Self::new(config, session_tier, persistent_tier)
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the auth session.
    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.inner.auth
    }

    /// Get a reference to the API gateway.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the stock cache.
    #[must_use]
    pub fn stock(&self) -> &StockCache {
        &self.inner.stock
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the wishlist store.
    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    /// Get a reference to the DirectPay client.
    #[must_use]
    pub fn payment(&self) -> &DirectPay {
        &self.inner.payment
    }

    /// Receive store events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    /// Register a customer. Does not log them in.
    pub async fn register(&self, customer: &NewCustomer) -> AuthResult {
        self.inner.api.register(customer).await
    }

    /// Log in, start the session, fold the guest cart into the user's cart
    /// and refresh the wishlist count.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> AuthResult {
        let success = match self.inner.api.login(email, password).await {
            AuthResult::Success(success) => success,
            failure @ AuthResult::Failure { .. } => return failure,
        };

        if let Err(e) = self.inner.auth.sign_in(&success) {
            warn!(error = %e, "Failed to persist session");
            return AuthResult::Failure {
                message: "Login failed. Please try again.".to_string(),
            };
        }

        info!(user_id = %success.user.id, "Logged in");
        self.inner.cart.merge_after_login(&success.user.id);
        self.inner.wishlist.refresh().await;
        AuthResult::Success(success)
    }

    /// End the session. The user's cart stays stored for their next login;
    /// the guest cart becomes active again.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.inner.auth.logout();
        self.inner.wishlist.invalidate_all().await;
        self.inner.events.publish(StoreEvent::CartChanged {
            count: self.inner.cart.get_count(),
        });
        self.inner
            .events
            .publish(StoreEvent::WishlistChanged { count: 0 });
    }
}
