//! Authentication token storage and identity resolution.
//!
//! Mirrors how the storefront kept auth state in the browser: an active
//! session tier (cleared when the shopping session ends) with a fallback to a
//! longer-lived persistent tier kept for backward compatibility.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pickpack_core::UserId;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::api::types::{AuthSuccess, CurrentUser, parse_expiry};
use crate::storage::{KeyValueStore, StorageError, read_json, write_json};

/// Storage keys for authentication data.
pub mod keys {
    /// Bearer token for authenticated API calls.
    pub const AUTH_TOKEN: &str = "authToken";

    /// JSON-encoded [`CurrentUser`](crate::api::types::CurrentUser).
    pub const LOGGED_IN_USER: &str = "loggedInUser";

    /// Refresh token issued at login.
    pub const REFRESH_TOKEN: &str = "refreshToken";

    /// RFC 3339 expiry of the bearer token (session tier only).
    pub const TOKEN_EXPIRES_AT: &str = "tokenExpiresAt";
}

/// Identity and credentials available to the stores and the API gateway.
///
/// Injected rather than discovered so that stores can be driven by a real
/// session, a fixed test identity, or anything in between.
pub trait SessionContext: Send + Sync {
    /// ID of the logged-in user, if any.
    fn current_user_id(&self) -> Option<UserId>;

    /// Bearer token for authenticated calls, if any.
    fn bearer_token(&self) -> Option<String>;

    /// JSON request headers, with `Authorization` when a token is present.
    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = self.bearer_token()
            && let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}"))
        {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

/// Session backed by a session tier and a persistent tier.
#[derive(Clone)]
pub struct AuthSession {
    session: Arc<dyn KeyValueStore>,
    persistent: Arc<dyn KeyValueStore>,
}

impl AuthSession {
    /// Create a session over the two storage tiers.
    #[must_use]
    pub fn new(session: Arc<dyn KeyValueStore>, persistent: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session,
            persistent,
        }
    }

    /// The session tier (also used for payment results).
    #[must_use]
    pub fn session_tier(&self) -> &Arc<dyn KeyValueStore> {
        &self.session
    }

    /// The persistent tier (also used for carts).
    #[must_use]
    pub fn persistent_tier(&self) -> &Arc<dyn KeyValueStore> {
        &self.persistent
    }

    /// Logged-in user: session tier first, then the persistent tier.
    ///
    /// Unreadable or corrupt entries count as "not logged in".
    #[must_use]
    pub fn current_user(&self) -> Option<CurrentUser> {
        [&self.session, &self.persistent]
            .into_iter()
            .find_map(|tier| match read_json::<CurrentUser>(tier.as_ref(), keys::LOGGED_IN_USER) {
                Ok(user) => user,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable logged-in user");
                    None
                }
            })
    }

    /// Bearer token: session tier first, then the persistent tier.
    #[must_use]
    pub fn auth_token(&self) -> Option<String> {
        [&self.session, &self.persistent]
            .into_iter()
            .find_map(|tier| tier.get(keys::AUTH_TOKEN).ok().flatten())
            .filter(|token| !token.is_empty())
    }

    /// Refresh token from the session tier.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.session.get(keys::REFRESH_TOKEN).ok().flatten()
    }

    /// Token expiry from the session tier.
    #[must_use]
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.session.get(keys::TOKEN_EXPIRES_AT).ok().flatten()?;
        parse_expiry(&raw)
    }

    /// True when the session tier holds an expiry that is not after `now`.
    #[must_use]
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at().is_some_and(|expiry| expiry <= now)
    }

    /// Persist a login into the session tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the session tier cannot be written.
    pub fn save_current_user(
        &self,
        user: &CurrentUser,
        token: Option<&str>,
        refresh_token: Option<&str>,
        expires_at: Option<&str>,
    ) -> Result<(), StorageError> {
        write_json(self.session.as_ref(), keys::LOGGED_IN_USER, user)?;
        if let Some(token) = token {
            self.session.set(keys::AUTH_TOKEN, token)?;
        }
        if let Some(refresh) = refresh_token {
            self.session.set(keys::REFRESH_TOKEN, refresh)?;
        }
        if let Some(expiry) = expires_at.or(user.expires_at.as_deref()) {
            self.session.set(keys::TOKEN_EXPIRES_AT, expiry)?;
        }
        tracing::info!(user_id = %user.id, "Session started");
        Ok(())
    }

    /// Persist a successful login response.
    ///
    /// # Errors
    ///
    /// Returns an error if the session tier cannot be written.
    pub fn sign_in(&self, auth: &AuthSuccess) -> Result<(), StorageError> {
        self.save_current_user(
            &auth.user,
            auth.token.as_deref(),
            auth.refresh_token.as_deref(),
            auth.expires_at.as_deref(),
        )
    }

    /// Clear auth state from both tiers. Carts are left untouched so the
    /// user's partition is still there at next login.
    pub fn logout(&self) {
        for key in [
            keys::LOGGED_IN_USER,
            keys::AUTH_TOKEN,
            keys::REFRESH_TOKEN,
            keys::TOKEN_EXPIRES_AT,
        ] {
            if let Err(e) = self.session.remove(key) {
                tracing::warn!(error = %e, key, "Failed to clear session key");
            }
        }
        for key in [keys::LOGGED_IN_USER, keys::AUTH_TOKEN, keys::REFRESH_TOKEN] {
            if let Err(e) = self.persistent.remove(key) {
                tracing::warn!(error = %e, key, "Failed to clear persistent key");
            }
        }
        tracing::info!("Session cleared");
    }

    /// Logged in means both a token and a user in the *session* tier.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        let token = self.session.get(keys::AUTH_TOKEN).ok().flatten();
        let user = self.session.get(keys::LOGGED_IN_USER).ok().flatten();
        token.is_some_and(|t| !t.is_empty()) && user.is_some()
    }
}

impl SessionContext for AuthSession {
    fn current_user_id(&self) -> Option<UserId> {
        self.current_user()
            .map(|user| user.id)
            .filter(|id| !id.is_blank())
    }

    fn bearer_token(&self) -> Option<String> {
        self.auth_token()
    }
}

/// Fixed identity, for tools and tests that do not keep a session.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    pub user_id: Option<UserId>,
    pub token: Option<String>,
}

impl SessionContext for StaticSession {
    fn current_user_id(&self) -> Option<UserId> {
        self.user_id.clone()
    }

    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}
