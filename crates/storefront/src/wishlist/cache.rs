//! Cache types for wishlist responses.

use pickpack_core::UserId;

use crate::api::types::WishlistPage;

/// Cache key for wishlist pages and counts.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Items { user_id: UserId, page: u32, size: u32 },
    Count(UserId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Items(WishlistPage),
    Count(u64),
}
