//! Response shape detection for the wishlist endpoints.
//!
//! The wishlist service has shipped several envelope layouts over time and
//! older deployments are still live. Each layout is a matcher; matchers are
//! tried in table order and the first hit wins. Reordering the tables
//! changes which field wins for ambiguous bodies.

use pickpack_core::{ProductId, WishlistItemId};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::api::conversions::{is_success_envelope, non_empty_str, value_as_i64};
use crate::api::types::WishlistItem;

/// Items found in a list response, plus the total when the envelope has one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedList {
    pub items: Vec<WishlistItem>,
    pub total_count: Option<u64>,
}

pub type ListMatcher = fn(&Value) -> Option<ParsedList>;
pub type CountMatcher = fn(&Value) -> Option<i64>;
pub type CheckMatcher = fn(&Value) -> Option<bool>;

/// List layouts, in trial order.
pub const LIST_SHAPES: &[(&str, ListMatcher)] = &[
    ("data array", data_array),
    ("data.items", data_items),
    ("data.data", nested_data),
    ("top-level array", top_level_array),
    ("success items", success_items),
];

/// Count layouts, in trial order.
pub const COUNT_SHAPES: &[(&str, CountMatcher)] = &[
    ("data number", data_number),
    ("data.count", data_count),
    ("top-level count", top_level_count),
    ("bare number", bare_number),
];

/// Existence-check layouts, in trial order.
pub const CHECK_SHAPES: &[(&str, CheckMatcher)] = &[
    ("data bool", data_bool),
    ("data.exists", data_exists),
    ("top-level exists", top_level_exists),
];

/// First matching list layout.
pub fn parse_list(body: &Value) -> Option<ParsedList> {
    LIST_SHAPES.iter().find_map(|(name, matcher)| {
        let parsed = matcher(body)?;
        tracing::trace!(shape = name, items = parsed.items.len(), "Matched wishlist shape");
        Some(parsed)
    })
}

/// First matching count layout, clamped at zero.
pub fn parse_count(body: &Value) -> Option<u64> {
    COUNT_SHAPES
        .iter()
        .find_map(|(_, matcher)| matcher(body))
        .map(|n| u64::try_from(n).unwrap_or(0))
}

/// First matching existence layout.
pub fn parse_check(body: &Value) -> Option<bool> {
    CHECK_SHAPES.iter().find_map(|(_, matcher)| matcher(body))
}

// =============================================================================
// Items
// =============================================================================

/// Decode one entry. The entry ID may be `itemId` or `id`; entries missing
/// either ID are dropped.
pub fn decode_item(value: &Value) -> Option<WishlistItem> {
    let entry = value.as_object()?;

    let id_field = |keys: &[&str]| {
        keys.iter()
            .filter_map(|key| entry.get(*key))
            .find(|v| !v.is_null())
    };

    let item_id = id_field(&["itemId", "id"])
        .and_then(|v| WishlistItemId::deserialize(v).ok())
        .filter(|id| !id.is_blank())?;
    let product_id = id_field(&["productId"])
        .and_then(|v| ProductId::deserialize(v).ok())
        .filter(|id| !id.is_blank())?;

    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| non_empty_str(entry.get(*key)))
            .map(str::to_string)
    };

    Some(WishlistItem {
        item_id,
        product_id,
        product_name: text(&["productName", "name"]),
        product_price: ["productPrice", "price"]
            .iter()
            .find_map(|key| {
                entry
                    .get(*key)
                    .and_then(|v| <Decimal as Deserialize>::deserialize(v).ok())
            }),
        image_url: text(&["imageUrl", "productImageUrl", "imageURL"]),
    })
}

fn decode_items(values: &[Value]) -> Vec<WishlistItem> {
    values.iter().filter_map(decode_item).collect()
}

fn total_of(value: Option<&Value>) -> Option<u64> {
    value
        .and_then(value_as_i64)
        .map(|n| u64::try_from(n).unwrap_or(0))
}

// =============================================================================
// List matchers
// =============================================================================

fn data_array(body: &Value) -> Option<ParsedList> {
    let items = body.get("data")?.as_array()?;
    Some(ParsedList {
        items: decode_items(items),
        total_count: None,
    })
}

fn data_items(body: &Value) -> Option<ParsedList> {
    let data = body.get("data")?;
    let items = data.get("items")?.as_array()?;
    Some(ParsedList {
        items: decode_items(items),
        total_count: total_of(data.get("totalCount")),
    })
}

fn nested_data(body: &Value) -> Option<ParsedList> {
    let data = body.get("data")?;
    let items = data.get("data")?.as_array()?;
    Some(ParsedList {
        items: decode_items(items),
        total_count: total_of(data.get("totalCount")),
    })
}

fn top_level_array(body: &Value) -> Option<ParsedList> {
    Some(ParsedList {
        items: decode_items(body.as_array()?),
        total_count: None,
    })
}

fn success_items(body: &Value) -> Option<ParsedList> {
    if !is_success_envelope(body) {
        return None;
    }
    Some(ParsedList {
        items: decode_items(body.get("items")?.as_array()?),
        total_count: total_of(body.get("totalCount")),
    })
}

// =============================================================================
// Count matchers
// =============================================================================

fn data_number(body: &Value) -> Option<i64> {
    body.get("data").filter(|d| d.is_number()).and_then(value_as_i64)
}

fn data_count(body: &Value) -> Option<i64> {
    body.get("data")?.get("count").and_then(value_as_i64)
}

fn top_level_count(body: &Value) -> Option<i64> {
    body.get("count").and_then(value_as_i64)
}

fn bare_number(body: &Value) -> Option<i64> {
    body.is_number().then(|| value_as_i64(body)).flatten()
}

// =============================================================================
// Check matchers
// =============================================================================

fn data_bool(body: &Value) -> Option<bool> {
    body.get("data")?.as_bool()
}

fn data_exists(body: &Value) -> Option<bool> {
    let data = body.get("data")?;
    data.get("exists")
        .or_else(|| data.get("isInWishlist"))
        .and_then(Value::as_bool)
}

fn top_level_exists(body: &Value) -> Option<bool> {
    body.get("exists").and_then(Value::as_bool)
}
