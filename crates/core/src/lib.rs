//! PickPack Core - Shared types library.
//!
//! This crate provides common types used across the PickPack workspace:
//! - `storefront` - Catalog gateway, cart, wishlist and payment client logic
//! - `cli` - Command-line tool driving the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers and LKR prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
