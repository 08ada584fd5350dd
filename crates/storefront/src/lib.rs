//! PickPack storefront client library.
//!
//! Client-side storefront logic for the PickPack e-commerce API:
//!
//! - [`api`] - REST gateway for catalog, stock, auth and wishlist endpoints
//! - [`stock`] - 60 second cache of summed stock levels
//! - [`cart`] - per-identity persisted cart with stock ceilings and
//!   guest-to-user merge
//! - [`wishlist`] - read-through cache over the server-side wishlist
//! - [`payment`] - DirectPay IPG request signing and result handling
//! - [`state`] - the [`Storefront`] handle tying it all together
//!
//! Stores never fail on infrastructure problems: network, response shape and
//! storage errors are logged and turned into empty or unchanged results.
//! Only business rejections (stock ceilings, duplicate wishlist entries,
//! missing login) come back as errors.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod events;
pub mod payment;
pub mod session;
pub mod state;
pub mod stock;
pub mod storage;
pub mod wishlist;

pub use error::StorefrontError;
pub use state::Storefront;
