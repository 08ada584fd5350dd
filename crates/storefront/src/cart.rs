//! Per-identity persisted shopping cart.
//!
//! # Partitions
//!
//! Each identity has its own cart under the persistent tier: `cart_<userId>`
//! when logged in, `cart_guest` otherwise. The active partition is derived
//! from the session on every call, so logging in or out switches carts
//! without any explicit hand-off. [`CartStore::merge_after_login`] folds the
//! guest cart into the user's.
//!
//! # Stock ceilings
//!
//! A line may carry a `stockCeiling`: the available stock at the time it was
//! last written. Adds and quantity updates above the ceiling are rejected.
//! The ceiling is a snapshot and is only refreshed by the next stock-checked
//! write.
//!
//! # Failure model
//!
//! Storage problems never reach the caller. Unreadable partitions read as
//! empty and failed writes leave the previous cart in place. Only business
//! rejections ([`CartRejection`]) are returned as errors.

use std::sync::Arc;

use pickpack_core::{ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::api::conversions::{non_empty_str, value_as_i64};
use crate::api::types::Product;
use crate::events::{EventBus, StoreEvent};
use crate::session::SessionContext;
use crate::stock::StockCache;
use crate::storage::{KeyValueStore, write_json};

/// Partition key for carts built while logged out.
pub const GUEST_CART_KEY: &str = "cart_guest";

/// Partition key for a user's cart.
#[must_use]
pub fn user_cart_key(user_id: &UserId) -> String {
    format!("cart_{user_id}")
}

/// Partition key for an optional identity.
#[must_use]
pub fn partition_key(user_id: Option<&UserId>) -> String {
    user_id.map_or_else(|| GUEST_CART_KEY.to_string(), user_cart_key)
}

fn clamp_ceiling(ceiling: i64) -> u32 {
    u32::try_from(ceiling.max(0)).unwrap_or(u32::MAX)
}

// =============================================================================
// CartItem
// =============================================================================

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub image_ref: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_ceiling: Option<u32>,
}

impl CartItem {
    /// New line for a product at its cart price.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32, stock_ceiling: Option<u32>) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            image_ref: product.image_url.clone(),
            unit_price: product.cart_price(),
            quantity,
            stock_ceiling,
        }
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Decode a stored entry, accepting legacy field names
    /// (`id`, `price`, `imageURL`, `maxStock`).
    ///
    /// Entries without a product ID or with a non-positive quantity are
    /// rejected.
    fn from_stored(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;

        let product_id = ["productId", "id"]
            .iter()
            .filter_map(|key| entry.get(*key))
            .find(|v| !v.is_null())
            .and_then(|v| ProductId::deserialize(v).ok())
            .filter(|id| !id.is_blank())?;

        let quantity = entry
            .get("quantity")
            .and_then(value_as_i64)
            .filter(|q| *q > 0)?;

        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| non_empty_str(entry.get(*key)))
                .map(str::to_string)
        };

        let unit_price = ["unitPrice", "price"]
            .iter()
            .find_map(|key| {
                entry
                    .get(*key)
                    .and_then(|v| <Decimal as Deserialize>::deserialize(v).ok())
            })
            .filter(|p| *p > Decimal::ZERO)
            .unwrap_or(Decimal::ZERO);

        let stock_ceiling = ["stockCeiling", "maxStock"]
            .iter()
            .find_map(|key| entry.get(*key).and_then(value_as_i64))
            .map(clamp_ceiling);

        Some(Self {
            product_id,
            name: text(&["name"]).unwrap_or_default(),
            image_ref: text(&["imageRef", "imageUrl", "imageURL"]),
            unit_price,
            quantity: u32::try_from(quantity).unwrap_or(u32::MAX),
            stock_ceiling,
        })
    }
}

/// Sum of quantities.
#[must_use]
pub fn item_count(items: &[CartItem]) -> u32 {
    items
        .iter()
        .map(|item| item.quantity)
        .fold(0, u32::saturating_add)
}

// =============================================================================
// CartRejection
// =============================================================================

/// A cart change refused by a business rule. `Display` is the message shown
/// to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartRejection {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("This product is out of stock")]
    OutOfStock,

    /// The ceiling allows some, but not all, of the requested quantity.
    #[error("Only {remaining} more can be added to your cart")]
    OnlyRemaining { remaining: i64 },

    /// The cart already holds the whole ceiling.
    #[error("You already have the maximum available quantity ({ceiling}) in your cart")]
    LimitReached { ceiling: i64 },

    /// A quantity update went above the ceiling.
    #[error("Only {ceiling} available in stock")]
    ExceedsStock { ceiling: i64 },
}

// =============================================================================
// CartStore
// =============================================================================

/// Cart store over the persistent storage tier.
///
/// Cheap to clone. Read-modify-write sequences are not serialized: two
/// concurrent mutations of the same partition race and the last write wins.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn KeyValueStore>,
    session: Arc<dyn SessionContext>,
    stock: StockCache,
    events: EventBus,
}

impl CartStore {
    #[must_use]
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        session: Arc<dyn SessionContext>,
        stock: StockCache,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                storage,
                session,
                stock,
                events,
            }),
        }
    }

    /// Key of the partition the current identity reads and writes.
    #[must_use]
    pub fn active_key(&self) -> String {
        partition_key(self.inner.session.current_user_id().as_ref())
    }

    // =========================================================================
    // Partition I/O
    // =========================================================================

    /// Read a partition, pruning invalid entries and writing the pruned
    /// result back.
    fn read_partition(&self, key: &str) -> Vec<CartItem> {
        let raw = match self.inner.storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, key, "Failed to read cart");
                return Vec::new();
            }
        };

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) | Err(_) => {
                warn!(key, "Discarding unreadable cart");
                self.remove_partition(key);
                return Vec::new();
            }
        };

        let items: Vec<CartItem> = entries.iter().filter_map(CartItem::from_stored).collect();
        if items.len() != entries.len() {
            debug!(key, pruned = entries.len() - items.len(), "Pruned invalid cart entries");
            self.write_partition(key, &items);
        }
        items
    }

    fn write_partition(&self, key: &str, items: &[CartItem]) -> bool {
        match write_json(self.inner.storage.as_ref(), key, items) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, key, "Failed to write cart");
                false
            }
        }
    }

    fn remove_partition(&self, key: &str) -> bool {
        match self.inner.storage.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, key, "Failed to remove cart");
                false
            }
        }
    }

    /// Write the active partition and notify subscribers. Returns what the
    /// cart holds afterwards: `items` on success, the previous cart otherwise.
    fn commit(&self, key: &str, items: Vec<CartItem>, previous: Vec<CartItem>) -> Vec<CartItem> {
        if self.write_partition(key, &items) {
            self.inner.events.publish(StoreEvent::CartChanged {
                count: item_count(&items),
            });
            items
        } else {
            previous
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Items in the active partition. Never contains a line with quantity 0.
    #[must_use]
    pub fn get_cart(&self) -> Vec<CartItem> {
        self.read_partition(&self.active_key())
    }

    /// Total quantity across the active partition.
    #[must_use]
    pub fn get_count(&self) -> u32 {
        item_count(&self.get_cart())
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.get_cart().iter().map(CartItem::line_total).sum()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of a product.
    ///
    /// With a ceiling, the check is against the existing quantity plus
    /// `quantity`. A ceiling of zero or less means out of stock.
    ///
    /// # Errors
    ///
    /// Returns a [`CartRejection`] when the quantity is zero or the ceiling
    /// would be exceeded. The cart is unchanged in that case.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_item(
        &self,
        product: &Product,
        quantity: u32,
        stock_ceiling: Option<i64>,
    ) -> Result<Vec<CartItem>, CartRejection> {
        if quantity == 0 {
            return Err(CartRejection::InvalidQuantity);
        }
        if let Some(ceiling) = stock_ceiling
            && ceiling <= 0
        {
            return Err(CartRejection::OutOfStock);
        }

        let key = self.active_key();
        let previous = self.read_partition(&key);
        let position = previous.iter().position(|item| item.product_id == product.id);
        let current = position.map_or(0, |i| previous[i].quantity);

        if let Some(ceiling) = stock_ceiling
            && i64::from(current) + i64::from(quantity) > ceiling
        {
            let remaining = ceiling - i64::from(current);
            return Err(if remaining > 0 {
                CartRejection::OnlyRemaining { remaining }
            } else {
                CartRejection::LimitReached { ceiling }
            });
        }

        let mut items = previous.clone();
        if let Some(i) = position {
            let item = &mut items[i];
            item.quantity = item.quantity.saturating_add(quantity);
            if let Some(ceiling) = stock_ceiling {
                item.stock_ceiling = Some(clamp_ceiling(ceiling));
            }
        } else {
            items.push(CartItem::from_product(
                product,
                quantity,
                stock_ceiling.map(clamp_ceiling),
            ));
        }

        debug!(quantity, "Adding to cart");
        Ok(self.commit(&key, items, previous))
    }

    /// Add after checking live stock.
    ///
    /// The freshly fetched availability becomes the line's ceiling. When
    /// stock cannot be determined at all, the add proceeds unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`CartRejection::OutOfStock`] when the product has no
    /// available stock, or any rejection from [`CartStore::add_item`].
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_item_with_stock_check(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<Vec<CartItem>, CartRejection> {
        let levels = match self.inner.stock.load().await {
            Ok(levels) => levels,
            Err(e) => {
                warn!(error = %e, "Stock unavailable, adding without a ceiling");
                return self.add_item(product, quantity, None);
            }
        };

        let available = levels.available(&product.id).unwrap_or(0);
        if available <= 0 {
            return Err(CartRejection::OutOfStock);
        }

        let items = self.add_item(product, quantity, Some(available))?;
        self.inner.stock.invalidate();
        Ok(items)
    }

    /// Remove a product's line. Removing an absent product changes nothing.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn remove_item(&self, product_id: &ProductId) -> Vec<CartItem> {
        let key = self.active_key();
        let previous = self.read_partition(&key);
        if !previous.iter().any(|item| &item.product_id == product_id) {
            return previous;
        }

        let items = previous
            .iter()
            .filter(|item| &item.product_id != product_id)
            .cloned()
            .collect();
        self.commit(&key, items, previous)
    }

    /// Set a line's quantity.
    ///
    /// Zero or less removes the line. The effective ceiling is `stock_ceiling`
    /// when given, else the line's stored snapshot; an explicit ceiling
    /// replaces the snapshot. Updating a product that is not in the cart
    /// changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CartRejection::ExceedsStock`] when `quantity` is above the
    /// effective ceiling.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
        stock_ceiling: Option<i64>,
    ) -> Result<Vec<CartItem>, CartRejection> {
        if quantity <= 0 {
            return Ok(self.remove_item(product_id));
        }

        let key = self.active_key();
        let previous = self.read_partition(&key);
        let Some(position) = previous.iter().position(|item| &item.product_id == product_id)
        else {
            return Ok(previous);
        };

        let effective = stock_ceiling.or_else(|| previous[position].stock_ceiling.map(i64::from));
        if let Some(ceiling) = effective
            && quantity > ceiling
        {
            return Err(CartRejection::ExceedsStock { ceiling });
        }

        let mut items = previous.clone();
        let item = &mut items[position];
        item.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(ceiling) = stock_ceiling {
            item.stock_ceiling = Some(clamp_ceiling(ceiling));
        }
        Ok(self.commit(&key, items, previous))
    }

    /// Empty the active partition.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        if self.remove_partition(&self.active_key()) {
            self.inner.events.publish(StoreEvent::CartChanged { count: 0 });
        }
    }

    /// Fold the guest cart into a user's cart and delete the guest cart.
    ///
    /// Products in both carts keep the larger quantity; guest-only products
    /// are appended. Without a guest cart this does nothing, which makes
    /// repeated calls harmless.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn merge_after_login(&self, user_id: &UserId) -> Vec<CartItem> {
        let user_key = user_cart_key(user_id);

        match self.inner.storage.get(GUEST_CART_KEY) {
            Ok(Some(_)) => {}
            Ok(None) => return self.read_partition(&user_key),
            Err(e) => {
                warn!(error = %e, "Failed to read guest cart");
                return self.read_partition(&user_key);
            }
        }

        let guest = self.read_partition(GUEST_CART_KEY);
        let previous = self.read_partition(&user_key);
        let mut merged = previous.clone();

        for guest_item in guest {
            if let Some(existing) = merged
                .iter_mut()
                .find(|item| item.product_id == guest_item.product_id)
            {
                // The winning quantity brings its own ceiling, so a line is
                // never stored above its snapshot.
                if guest_item.quantity > existing.quantity {
                    existing.quantity = guest_item.quantity;
                    existing.stock_ceiling = guest_item.stock_ceiling;
                }
            } else {
                merged.push(guest_item);
            }
        }

        if !self.write_partition(&user_key, &merged) {
            return previous;
        }
        self.remove_partition(GUEST_CART_KEY);

        debug!(lines = merged.len(), "Merged guest cart");
        self.inner.events.publish(StoreEvent::CartChanged {
            count: item_count(&merged),
        });
        merged
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::ApiClient;
    use crate::config::ApiConfig;
    use crate::session::{AuthSession, StaticSession};
    use crate::storage::MemoryStorage;

    fn offline_stock() -> StockCache {
        let api = ApiClient::new(
            &ApiConfig::new("http://127.0.0.1:9/api"),
            Arc::new(StaticSession::default()),
        )
        .unwrap();
        StockCache::new(api)
    }

    fn store_with(session: Arc<dyn SessionContext>) -> (CartStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = CartStore::new(storage.clone(), session, offline_stock(), EventBus::new());
        (store, storage)
    }

    fn guest_store() -> (CartStore, Arc<MemoryStorage>) {
        store_with(Arc::new(StaticSession::default()))
    }

    fn tea() -> Product {
        let mut product = Product::new("p1", "Ceylon Tea", Decimal::new(500, 0));
        product.selling_price = Some(Decimal::new(450, 0));
        product
    }

    fn quantity_of(items: &[CartItem], id: &str) -> Option<u32> {
        items
            .iter()
            .find(|item| item.product_id.as_str() == id)
            .map(|item| item.quantity)
    }

    #[test]
    fn test_partition_keys() {
        assert_eq!(partition_key(None), "cart_guest");
        assert_eq!(partition_key(Some(&UserId::from(12_i64))), "cart_12");
    }

    #[test]
    fn test_add_and_re_add() {
        let (store, _) = guest_store();

        let items = store.add_item(&tea(), 2, None).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, Decimal::new(450, 0));

        store.add_item(&tea(), 3, None).unwrap();
        assert_eq!(quantity_of(&store.get_cart(), "p1"), Some(5));
        assert_eq!(store.get_count(), 5);
        assert_eq!(store.subtotal(), Decimal::new(2250, 0));
    }

    #[test]
    fn test_add_zero_quantity_rejected() {
        let (store, _) = guest_store();
        assert_eq!(store.add_item(&tea(), 0, None), Err(CartRejection::InvalidQuantity));
    }

    #[test]
    fn test_add_out_of_stock() {
        let (store, _) = guest_store();
        assert_eq!(store.add_item(&tea(), 1, Some(0)), Err(CartRejection::OutOfStock));
        assert!(store.get_cart().is_empty());
    }

    #[test]
    fn test_add_over_ceiling_reports_remaining() {
        let (store, _) = guest_store();
        store.add_item(&tea(), 3, Some(5)).unwrap();

        let rejection = store.add_item(&tea(), 4, Some(5)).unwrap_err();
        assert_eq!(rejection, CartRejection::OnlyRemaining { remaining: 2 });
        assert_eq!(rejection.to_string(), "Only 2 more can be added to your cart");
        assert_eq!(quantity_of(&store.get_cart(), "p1"), Some(3));

        store.add_item(&tea(), 2, Some(5)).unwrap();
        assert_eq!(
            store.add_item(&tea(), 1, Some(5)),
            Err(CartRejection::LimitReached { ceiling: 5 })
        );
        assert_eq!(quantity_of(&store.get_cart(), "p1"), Some(5));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let (store, _) = guest_store();
        store.add_item(&tea(), 1, None).unwrap();
        let before = store.get_cart();
        assert_eq!(store.remove_item(&ProductId::from("missing")), before);
        assert_eq!(store.get_cart(), before);
    }

    #[test]
    fn test_update_quantity() {
        let (store, _) = guest_store();
        store.add_item(&tea(), 1, Some(4)).unwrap();

        // Stored snapshot applies when no ceiling is passed
        assert_eq!(
            store.update_quantity(&ProductId::from("p1"), 5, None),
            Err(CartRejection::ExceedsStock { ceiling: 4 })
        );
        assert_eq!(quantity_of(&store.get_cart(), "p1"), Some(1));

        // Explicit ceiling wins and replaces the snapshot
        let items = store.update_quantity(&ProductId::from("p1"), 6, Some(10)).unwrap();
        assert_eq!(items[0].quantity, 6);
        assert_eq!(items[0].stock_ceiling, Some(10));

        let items = store.update_quantity(&ProductId::from("p1"), 0, None).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_read_prunes_invalid_entries() {
        let (store, storage) = guest_store();
        storage
            .set(
                GUEST_CART_KEY,
                &json!([
                    {"id": 7, "name": "Legacy", "price": "120.00", "imageURL": "x.png", "quantity": 2, "maxStock": 9},
                    {"productId": "p2", "quantity": 0},
                    {"productId": "p3", "quantity": -1},
                    {"name": "no id", "quantity": 1},
                ])
                .to_string(),
            )
            .unwrap();

        let items = store.get_cart();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, ProductId::from("7"));
        assert_eq!(items[0].unit_price, Decimal::new(120, 0));
        assert_eq!(items[0].image_ref.as_deref(), Some("x.png"));
        assert_eq!(items[0].stock_ceiling, Some(9));

        // Written back in canonical form
        let stored: Value = serde_json::from_str(&storage.get(GUEST_CART_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 1);
        assert_eq!(stored[0]["productId"], "7");
    }

    #[test]
    fn test_corrupt_partition_reads_empty() {
        let (store, storage) = guest_store();
        storage.set(GUEST_CART_KEY, "{not json").unwrap();
        assert!(store.get_cart().is_empty());
        assert_eq!(store.get_count(), 0);
    }

    #[test]
    fn test_merge_keeps_max_quantity() {
        let session_tier = Arc::new(MemoryStorage::new());
        let persistent = Arc::new(MemoryStorage::new());
        let auth = AuthSession::new(session_tier, persistent.clone());
        let store = CartStore::new(
            persistent.clone(),
            Arc::new(auth.clone()),
            offline_stock(),
            EventBus::new(),
        );

        let p2 = Product::new("p2", "Cinnamon", Decimal::new(300, 0));
        store.add_item(&tea(), 2, None).unwrap();
        store.add_item(&p2, 5, None).unwrap();
        persistent
            .set("cart_u1", &json!([{"productId": "p1", "quantity": 7}]).to_string())
            .unwrap();

        let user: crate::api::types::CurrentUser =
            serde_json::from_value(json!({"id": "u1"})).unwrap();
        auth.save_current_user(&user, Some("tok"), None, None).unwrap();

        let merged = store.merge_after_login(&UserId::from("u1"));
        assert_eq!(quantity_of(&merged, "p1"), Some(7));
        assert_eq!(quantity_of(&merged, "p2"), Some(5));
        assert_eq!(persistent.get(GUEST_CART_KEY).unwrap(), None);
        assert_eq!(store.active_key(), "cart_u1");
        assert_eq!(store.get_cart(), merged);

        // Second merge is a no-op
        assert_eq!(store.merge_after_login(&UserId::from("u1")), merged);
    }

    #[test]
    fn test_file_backed_cart_for_opaque_user_id() {
        let dir = std::env::temp_dir().join(format!("pickpack-cart-opaque-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let storage = Arc::new(crate::storage::FileStorage::open(&dir).unwrap());
        let session = StaticSession {
            user_id: Some(UserId::from("auth0|42")),
            token: Some("tok".to_string()),
        };
        let store = CartStore::new(storage, Arc::new(session), offline_stock(), EventBus::new());

        let items = store.add_item(&tea(), 2, None).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(store.active_key(), "cart_auth0|42");
        assert_eq!(store.get_count(), 2);
        assert_eq!(quantity_of(&store.get_cart(), "p1"), Some(2));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_merge_carries_ceiling_of_winning_quantity() {
        let (store, persistent) = guest_store();
        persistent
            .set(
                "cart_u1",
                &json!([
                    {"productId": "p1", "quantity": 2, "stockCeiling": 3},
                    {"productId": "p2", "quantity": 4, "stockCeiling": 6},
                ])
                .to_string(),
            )
            .unwrap();
        let p2 = Product::new("p2", "Cinnamon", Decimal::new(300, 0));
        persistent
            .set(
                GUEST_CART_KEY,
                &serde_json::to_string(&[
                    CartItem::from_product(&tea(), 5, None),
                    CartItem::from_product(&p2, 1, Some(1)),
                ])
                .unwrap(),
            )
            .unwrap();

        let merged = store.merge_after_login(&UserId::from("u1"));
        let line = |id: &str| {
            merged
                .iter()
                .find(|item| item.product_id.as_str() == id)
                .cloned()
                .unwrap()
        };

        // guest quantity wins: its (absent) ceiling replaces the stale one
        assert_eq!(line("p1").quantity, 5);
        assert_eq!(line("p1").stock_ceiling, None);
        // user quantity wins: its own ceiling stays
        assert_eq!(line("p2").quantity, 4);
        assert_eq!(line("p2").stock_ceiling, Some(6));

        for item in &merged {
            assert!(item.stock_ceiling.is_none_or(|c| item.quantity <= c));
        }
    }

    #[tokio::test]
    async fn test_stock_check_fails_open() {
        let (store, _) = guest_store();
        let items = store.add_item_with_stock_check(&tea(), 2).await.unwrap();
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].stock_ceiling, None);
    }

    #[tokio::test]
    async fn test_mutations_publish_count() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let store = CartStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(StaticSession::default()),
            offline_stock(),
            events,
        );

        store.add_item(&tea(), 2, None).unwrap();
        store.clear();

        assert_eq!(rx.recv().await.unwrap(), StoreEvent::CartChanged { count: 2 });
        assert_eq!(rx.recv().await.unwrap(), StoreEvent::CartChanged { count: 0 });
    }
}
