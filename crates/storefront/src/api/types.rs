//! Normalized domain types returned by the PickPack API gateway.
//!
//! Upstream payloads are inconsistent about field names and identifier types;
//! these types are the canonical shapes the rest of the crate works with.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pickpack_core::{CategoryId, ProductId, UserId, WishlistItemId};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog Types
// =============================================================================

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A product with image and price fields normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    /// `imageUrl`, falling back to the legacy `imageURL` spelling.
    pub image_url: Option<String>,
    /// `unitPrice`, falling back to `sellingPrice`, then zero.
    pub unit_price: Decimal,
    /// Price the product is currently sold at, when the API reports one.
    pub selling_price: Option<Decimal>,
}

impl Product {
    /// Minimal product, mostly useful for callers that only hold an ID.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sku: None,
            description: None,
            category_id: None,
            category_name: None,
            image_url: None,
            unit_price,
            selling_price: None,
        }
    }

    /// Price a cart line is charged at: the selling price when positive,
    /// else the unit price when positive, else zero.
    #[must_use]
    pub fn cart_price(&self) -> Decimal {
        self.selling_price
            .filter(|p| *p > Decimal::ZERO)
            .or_else(|| Some(self.unit_price).filter(|p| *p > Decimal::ZERO))
            .unwrap_or(Decimal::ZERO)
    }
}

/// One page of the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total_count: u64,
}

/// Stock held for a product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub available_quantity: Option<i64>,
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(super::conversions::value_as_i64))
}

/// Summed available stock per product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockMap {
    levels: HashMap<ProductId, i64>,
}

impl StockMap {
    /// Sum `availableQuantity` across every warehouse record of each product.
    #[must_use]
    pub fn from_records(records: &[StockRecord]) -> Self {
        let mut levels: HashMap<ProductId, i64> = HashMap::new();
        for record in records {
            let total = levels.entry(record.product_id.clone()).or_insert(0);
            *total = total.saturating_add(record.available_quantity.unwrap_or(0));
        }
        Self { levels }
    }

    /// Available quantity for a product, if the API reported any record.
    #[must_use]
    pub fn available(&self, product_id: &ProductId) -> Option<i64> {
        self.levels.get(product_id).copied()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True when no stock records are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Iterate over `(product, available)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, i64)> {
        self.levels.iter().map(|(id, qty)| (id, *qty))
    }
}

// =============================================================================
// Auth Types
// =============================================================================

/// The logged-in customer as returned by the auth endpoints.
///
/// Unknown fields are kept so that storing and reloading the user never
/// loses data the API sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CurrentUser {
    /// Name for greetings: first and last name, else the email, else the ID.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            return name;
        }
        self.email
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Registration form input.
///
/// Older forms post the address as `emailAddress`; either field is accepted
/// and `email` wins when both are present.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub email_address: Option<String>,
    pub password: SecretString,
}

impl NewCustomer {
    /// Address sent upstream as `email`.
    #[must_use]
    pub fn resolved_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.email_address.as_deref())
    }
}

/// Successful register/login payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSuccess {
    pub user: CurrentUser,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<String>,
    pub message: String,
}

impl AuthSuccess {
    /// Parsed token expiry, when the API sent a valid RFC 3339 timestamp.
    #[must_use]
    pub fn expires_at_time(&self) -> Option<DateTime<Utc>> {
        parse_expiry(self.expires_at.as_deref()?)
    }
}

/// Outcome of a register or login call. Never an error: transport and API
/// failures become [`AuthResult::Failure`] with a displayable message.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthResult {
    Success(Box<AuthSuccess>),
    Failure { message: String },
}

impl AuthResult {
    /// True for [`AuthResult::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// User-facing message for either outcome.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(success) => &success.message,
            Self::Failure { message } => message,
        }
    }
}

/// Parse an upstream expiry timestamp.
pub(crate) fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// =============================================================================
// Wishlist Types
// =============================================================================

/// A server-side wishlist entry.
///
/// Upstream payloads name the entry ID either `itemId` or `id`; see
/// `wishlist::shapes` for the tolerant decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub item_id: WishlistItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_price: Option<Decimal>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One page of a user's wishlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WishlistPage {
    pub items: Vec<WishlistItem>,
    pub total_count: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_price_prefers_selling_price() {
        let mut product = Product::new("p1", "Tea", Decimal::new(500, 0));
        product.selling_price = Some(Decimal::new(450, 0));
        assert_eq!(product.cart_price(), Decimal::new(450, 0));

        product.selling_price = Some(Decimal::ZERO);
        assert_eq!(product.cart_price(), Decimal::new(500, 0));

        product.unit_price = Decimal::new(-1, 0);
        assert_eq!(product.cart_price(), Decimal::ZERO);
    }

    #[test]
    fn test_stock_map_sums_warehouses() {
        let records: Vec<StockRecord> = serde_json::from_value(serde_json::json!([
            {"productId": 1, "availableQuantity": 3},
            {"productId": "1", "availableQuantity": 4},
            {"productId": 2},
            {"productId": 2, "availableQuantity": "2.0"},
        ]))
        .unwrap();
        let map = StockMap::from_records(&records);
        assert_eq!(map.available(&ProductId::from(1_i64)), Some(7));
        assert_eq!(map.available(&ProductId::from("2")), Some(2));
        assert_eq!(map.available(&ProductId::from("3")), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_stock_map_saturates_huge_quantities() {
        let records: Vec<StockRecord> = serde_json::from_value(serde_json::json!([
            {"productId": 1, "availableQuantity": 9e18},
            {"productId": 1, "availableQuantity": 9e18},
            {"productId": 2, "availableQuantity": -9e18},
            {"productId": 2, "availableQuantity": -9e18},
        ]))
        .unwrap();
        let map = StockMap::from_records(&records);
        assert_eq!(map.available(&ProductId::from(1_i64)), Some(i64::MAX));
        assert_eq!(map.available(&ProductId::from(2_i64)), Some(i64::MIN));
    }

    #[test]
    fn test_current_user_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "id": 42,
            "email": "nimal@example.lk",
            "firstName": "Nimal",
            "roles": ["customer"],
        });
        let user: CurrentUser = serde_json::from_value(raw).unwrap();
        assert_eq!(user.id, UserId::from(42_i64));
        assert_eq!(user.display_name(), "Nimal");

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["roles"][0], "customer");
        assert_eq!(back["id"], "42");
    }

    #[test]
    fn test_resolved_email_falls_back_to_legacy_field() {
        let customer = NewCustomer {
            first_name: "Kamal".into(),
            last_name: "Perera".into(),
            email: None,
            email_address: Some("kamal@example.lk".into()),
            password: SecretString::from("pw".to_string()),
        };
        assert_eq!(customer.resolved_email(), Some("kamal@example.lk"));
    }

    #[test]
    fn test_auth_success_expiry_parsing() {
        let success = AuthSuccess {
            user: serde_json::from_value(serde_json::json!({"id": "u1"})).unwrap(),
            token: Some("t".into()),
            refresh_token: None,
            expires_at: Some("2026-10-18T10:00:00Z".into()),
            message: "ok".into(),
        };
        assert!(success.expires_at_time().is_some());
    }
}
