//! Wishlist commands.

use clap::Subcommand;
use pickpack_core::{ProductId, WishlistItemId, format_price};
use pickpack_storefront::Storefront;
use pickpack_storefront::wishlist::{DEFAULT_PAGE_SIZE, WishlistUpdate};

use super::find_product;

#[derive(Subcommand)]
pub enum WishlistAction {
    /// Show one page of the wishlist
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: u32,
    },
    /// Add a product
    Add {
        /// Product ID
        id: String,
    },
    /// Remove a product
    Remove {
        /// Product ID
        id: String,
    },
    /// Remove an entry by its wishlist item ID
    RemoveItem {
        /// Wishlist item ID
        item_id: String,
    },
    /// Check whether a product is listed
    Check {
        /// Product ID
        id: String,
    },
    /// Show the number of listed products
    Count,
    /// Remove everything
    Clear,
}

/// Run a wishlist subcommand.
///
/// # Errors
///
/// Returns an error if the product is unknown or the wishlist rejects the
/// change.
pub async fn run(
    store: &Storefront,
    action: WishlistAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let wishlist = store.wishlist();

    let update = match action {
        WishlistAction::List { page, size } => {
            let page = wishlist.get_wishlist(page, size).await;
            for item in &page.items {
                println!(
                    "{:>8}  {:>6}  {:<32} {}",
                    item.item_id,
                    item.product_id,
                    item.product_name.as_deref().unwrap_or("-"),
                    format_price(item.product_price),
                );
            }
            println!("{} of {} items", page.items.len(), page.total_count);
            return Ok(());
        }
        WishlistAction::Check { id } => {
            let listed = wishlist
                .check_product_in_wishlist(&ProductId::from(id.as_str()))
                .await;
            println!("{id}: {}", if listed { "in wishlist" } else { "not in wishlist" });
            return Ok(());
        }
        WishlistAction::Count => {
            println!("{}", wishlist.get_wishlist_count().await);
            return Ok(());
        }
        WishlistAction::Add { id } => {
            let product = find_product(store, &id).await?;
            wishlist.add_to_wishlist(&product, None).await?
        }
        WishlistAction::Remove { id } => {
            wishlist
                .remove_product_from_wishlist(&ProductId::from(id))
                .await?
        }
        WishlistAction::RemoveItem { item_id } => {
            wishlist
                .remove_from_wishlist(&WishlistItemId::from(item_id))
                .await?
        }
        WishlistAction::Clear => wishlist.clear_wishlist().await?,
    };

    print_update(&update);
    Ok(())
}

fn print_update(update: &WishlistUpdate) {
    println!("{} ({} items)", update.message, update.count);
}
