//! Catalog browsing commands.

use pickpack_core::{CategoryId, ProductId, format_price};
use pickpack_storefront::Storefront;

use super::find_product;

/// Print all categories.
///
/// # Errors
///
/// Never fails; an unreachable API prints nothing.
pub async fn categories(store: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    let categories = store.api().list_categories().await;
    if categories.is_empty() {
        println!("No categories.");
    }
    for category in categories {
        println!("{:>6}  {}", category.id, category.name);
    }
    Ok(())
}

/// Print one page of products.
///
/// # Errors
///
/// Never fails; an unreachable API prints an empty page.
pub async fn products(
    store: &Storefront,
    offset: u32,
    limit: u32,
    category: Option<String>,
    keyword: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let category = category.map(CategoryId::from);
    let page = store
        .api()
        .list_products(offset, limit, category.as_ref(), keyword)
        .await;

    for product in &page.items {
        println!(
            "{:>6}  {:<40}  {}",
            product.id,
            product.name,
            format_price(Some(product.cart_price()))
        );
    }
    println!("{} of {} products", page.items.len(), page.total_count);
    Ok(())
}

/// Print one product with its current stock.
///
/// # Errors
///
/// Returns an error if the product is not in the catalog.
pub async fn product(store: &Storefront, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let product = find_product(store, id).await?;
    let available = store.stock().available(&product.id).await;

    println!("{} ({})", product.name, product.id);
    if let Some(category) = &product.category_name {
        println!("Category:  {category}");
    }
    if let Some(sku) = &product.sku {
        println!("SKU:       {sku}");
    }
    println!("Price:     {}", format_price(Some(product.cart_price())));
    match available {
        Some(qty) if qty > 0 => println!("Stock:     {qty}"),
        _ => println!("Stock:     out of stock"),
    }
    if let Some(description) = &product.description {
        println!("\n{description}");
    }
    Ok(())
}

/// Print stock levels, for one product or all of them.
///
/// # Errors
///
/// Returns an error if stock cannot be fetched and nothing is cached.
pub async fn stock(store: &Storefront, id: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let levels = store.stock().load().await?;

    if let Some(id) = id {
        let qty = levels.available(&ProductId::from(id)).unwrap_or(0);
        println!("{id}: {qty}");
        return Ok(());
    }

    let mut rows: Vec<_> = levels.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    for (product_id, qty) in rows {
        println!("{product_id:>6}  {qty}");
    }
    Ok(())
}
