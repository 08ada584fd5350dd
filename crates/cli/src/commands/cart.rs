//! Cart commands.

use clap::Subcommand;
use pickpack_core::{ProductId, format_price};
use pickpack_storefront::Storefront;
use pickpack_storefront::cart::CartItem;

use super::find_product;

#[derive(Subcommand)]
pub enum CartAction {
    /// Show the active cart
    List,
    /// Add a product
    Add {
        /// Product ID
        id: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Check live stock and cap the line at what is available
        #[arg(long)]
        check_stock: bool,
    },
    /// Remove a product
    Remove {
        /// Product ID
        id: String,
    },
    /// Set a product's quantity (0 removes it)
    Update {
        /// Product ID
        id: String,

        quantity: i64,
    },
    /// Empty the active cart
    Clear,
}

/// Run a cart subcommand.
///
/// # Errors
///
/// Returns an error if the product is unknown or the cart rejects the change.
pub async fn run(store: &Storefront, action: CartAction) -> Result<(), Box<dyn std::error::Error>> {
    let cart = store.cart();

    let items = match action {
        CartAction::List => cart.get_cart(),
        CartAction::Add {
            id,
            quantity,
            check_stock,
        } => {
            let product = find_product(store, &id).await?;
            if check_stock {
                cart.add_item_with_stock_check(&product, quantity).await?
            } else {
                cart.add_item(&product, quantity, None)?
            }
        }
        CartAction::Remove { id } => cart.remove_item(&ProductId::from(id)),
        CartAction::Update { id, quantity } => {
            cart.update_quantity(&ProductId::from(id), quantity, None)?
        }
        CartAction::Clear => {
            cart.clear();
            Vec::new()
        }
    };

    print_cart(&cart.active_key(), &items);
    Ok(())
}

fn print_cart(partition: &str, items: &[CartItem]) {
    if items.is_empty() {
        println!("Cart is empty ({partition}).");
        return;
    }

    println!("Cart ({partition}):");
    for item in items {
        let ceiling = item
            .stock_ceiling
            .map(|c| format!("  [max {c}]"))
            .unwrap_or_default();
        println!(
            "{:>6}  {:<32} {:>3} x {:>14} = {:>14}{ceiling}",
            item.product_id,
            item.name,
            item.quantity,
            format_price(Some(item.unit_price)),
            format_price(Some(item.line_total())),
        );
    }
    let subtotal = items.iter().map(CartItem::line_total).sum();
    println!("Subtotal: {}", format_price(Some(subtotal)));
}
