//! Top-level error type for building a storefront.
//!
//! Store operations never return these: they degrade to safe defaults and
//! only surface business rejections. `StorefrontError` covers start-up,
//! where a bad configuration or an unusable storage directory should stop
//! the caller.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::payment::PaymentError;
use crate::storage::StorageError;

/// Errors raised while wiring up a [`Storefront`](crate::state::Storefront).
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The API client could not be built.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A storage tier could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A checkout could not be prepared.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}
