//! Conversions from raw PickPack payloads to normalized types.

use pickpack_core::{CategoryId, ProductId};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::types::{Category, Product, StockRecord};

/// Product exactly as the listing endpoint sends it.
///
/// Both image spellings and both price fields are kept separately so the
/// normalization order is explicit rather than left to serde aliasing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProduct {
    id: ProductId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category_id: Option<CategoryId>,
    #[serde(default)]
    category_name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default, rename = "imageURL")]
    image_url_legacy: Option<String>,
    #[serde(default)]
    unit_price: Option<Decimal>,
    #[serde(default)]
    selling_price: Option<Decimal>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}

impl From<RawProduct> for Product {
    fn from(raw: RawProduct) -> Self {
        Self {
            id: raw.id,
            name: raw.name.unwrap_or_default(),
            sku: non_empty(raw.sku),
            description: non_empty(raw.description),
            category_id: raw.category_id,
            category_name: non_empty(raw.category_name),
            image_url: non_empty(raw.image_url).or_else(|| non_empty(raw.image_url_legacy)),
            unit_price: positive(raw.unit_price)
                .or_else(|| positive(raw.selling_price))
                .unwrap_or(Decimal::ZERO),
            selling_price: raw.selling_price,
        }
    }
}

/// Decode one product, logging and skipping entries that do not parse.
pub fn convert_product(value: &Value) -> Option<Product> {
    match RawProduct::deserialize(value) {
        Ok(raw) => Some(raw.into()),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed product");
            None
        }
    }
}

/// Decode one category; entries without an ID are skipped.
pub fn convert_category(value: &Value) -> Option<Category> {
    Category::deserialize(value).ok()
}

/// Decode one stock record; entries without a product ID are skipped.
pub fn convert_stock_record(value: &Value) -> Option<StockRecord> {
    StockRecord::deserialize(value).ok()
}

/// `data.items` of a `{success: true, data: {items: [...]}}` envelope.
pub fn envelope_items(body: &Value) -> Option<&Vec<Value>> {
    if !is_success_envelope(body) {
        return None;
    }
    body.get("data")?.get("items")?.as_array()
}

/// `data.totalCount` of a success envelope, defaulting to zero.
pub fn envelope_total_count(body: &Value) -> u64 {
    body.get("data")
        .and_then(|d| d.get("totalCount"))
        .and_then(value_as_i64)
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

/// True when the body carries `success: true`.
pub fn is_success_envelope(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool) == Some(true)
}

/// Best-effort human readable message: `message`, then `error.message`, then
/// `default`.
pub fn error_message(body: &Value, default: &str) -> String {
    non_empty_str(body.get("message"))
        .or_else(|| non_empty_str(body.get("error").and_then(|e| e.get("message"))))
        .map_or_else(|| default.to_string(), str::to_string)
}

/// String field, ignoring blanks.
pub fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Integer from a JSON number or numeric string. Fractions are truncated.
#[allow(clippy::cast_possible_truncation)]
pub fn value_as_i64(value: &Value) -> Option<i64> {
    let from_float = |f: f64| f.is_finite().then(|| f.trunc() as i64);
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(from_float)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(from_float))
        }
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_product_image_prefers_canonical_field() {
        let product = convert_product(&json!({
            "id": 1,
            "name": "Ceylon Tea",
            "imageUrl": "https://cdn/a.png",
            "imageURL": "https://cdn/legacy.png",
        }))
        .unwrap();
        assert_eq!(product.image_url.as_deref(), Some("https://cdn/a.png"));

        let legacy = convert_product(&json!({"id": 2, "imageURL": "https://cdn/b.png"})).unwrap();
        assert_eq!(legacy.image_url.as_deref(), Some("https://cdn/b.png"));

        let none = convert_product(&json!({"id": 3})).unwrap();
        assert_eq!(none.image_url, None);
    }

    #[test]
    fn test_product_price_fallback_order() {
        let unit = convert_product(&json!({"id": 1, "unitPrice": 500, "sellingPrice": 450})).unwrap();
        assert_eq!(unit.unit_price, Decimal::new(500, 0));
        assert_eq!(unit.selling_price, Some(Decimal::new(450, 0)));

        let selling = convert_product(&json!({"id": 2, "unitPrice": 0, "sellingPrice": "450.50"})).unwrap();
        assert_eq!(selling.unit_price, Decimal::new(45050, 2));

        let missing = convert_product(&json!({"id": 3})).unwrap();
        assert_eq!(missing.unit_price, Decimal::ZERO);
    }

    #[test]
    fn test_product_without_id_is_skipped() {
        assert!(convert_product(&json!({"name": "Ghost"})).is_none());
    }

    #[test]
    fn test_envelope_items_requires_success() {
        let ok = json!({"success": true, "data": {"items": [1, 2], "totalCount": 7}});
        assert_eq!(envelope_items(&ok).map(Vec::len), Some(2));
        assert_eq!(envelope_total_count(&ok), 7);

        let failed = json!({"success": false, "data": {"items": [1]}});
        assert!(envelope_items(&failed).is_none());
    }

    #[test]
    fn test_error_message_order() {
        assert_eq!(
            error_message(&json!({"message": "Email taken", "error": {"message": "x"}}), "d"),
            "Email taken"
        );
        assert_eq!(
            error_message(&json!({"error": {"message": "Bad password"}}), "d"),
            "Bad password"
        );
        assert_eq!(error_message(&json!({"message": ""}), "Login failed"), "Login failed");
        assert_eq!(error_message(&Value::Null, "Login failed"), "Login failed");
    }

    #[test]
    fn test_value_as_i64() {
        assert_eq!(value_as_i64(&json!(3)), Some(3));
        assert_eq!(value_as_i64(&json!(3.9)), Some(3));
        assert_eq!(value_as_i64(&json!(" 4 ")), Some(4));
        assert_eq!(value_as_i64(&json!("2.5")), Some(2));
        assert_eq!(value_as_i64(&json!("two")), None);
        assert_eq!(value_as_i64(&json!(null)), None);
    }
}
