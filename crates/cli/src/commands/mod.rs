//! Subcommand implementations.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod pay;
pub mod wishlist;

use pickpack_core::ProductId;
use pickpack_storefront::Storefront;
use pickpack_storefront::api::types::Product;
use thiserror::Error;

/// Errors reported by commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No product with this ID in the catalog listing.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The API or a store refused the request.
    #[error("{0}")]
    Rejected(String),
}

/// Look a product up in the catalog.
///
/// # Errors
///
/// Returns [`CommandError::ProductNotFound`] when the listing has no match.
pub async fn find_product(store: &Storefront, id: &str) -> Result<Product, CommandError> {
    let id = ProductId::from(id);
    store
        .api()
        .get_product_by_id(&id)
        .await
        .ok_or(CommandError::ProductNotFound(id))
}
