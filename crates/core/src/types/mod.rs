//! Core types for PickPack.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;

pub use id::*;
pub use price::{CURRENCY_CODE, PriceError, format_price, parse_price};
