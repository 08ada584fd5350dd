//! DirectPay request and result types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the shopper is paying for and who they are.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentRequest {
    pub amount: Decimal,
    /// Generated with the default prefix when not given.
    pub order_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// HTTPS URL of the merchant logo shown on the checkout form.
    pub logo_url: Option<String>,
    /// Server-side webhook notified by DirectPay.
    pub response_url: Option<String>,
    /// Page the shopper returns to after paying.
    pub return_url: Option<String>,
    /// Element hosting the inline checkout form.
    pub container_id: Option<String>,
    /// Use the popup checkout instead of an inline container.
    pub use_popup: bool,
}

impl PaymentRequest {
    #[must_use]
    pub fn new(amount: Decimal, email: impl Into<String>) -> Self {
        Self {
            amount,
            email: Some(email.into()),
            ..Self::default()
        }
    }
}

/// One-time payment payload, signed and handed to the checkout widget.
///
/// Field order is the order the gateway documents; the signature covers the
/// encoded bytes, so it matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectPayPayload {
    pub merchant_id: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub payment_type: String,
    pub order_id: String,
    pub currency: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub logo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

/// Everything the checkout widget needs to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInit {
    /// Hex HMAC-SHA256 of `data_string`.
    pub signature: String,
    /// Base64 of the JSON payload.
    pub data_string: String,
    /// `DEV` or `PROD`.
    pub stage: &'static str,
    /// Inline container, absent for popup checkout.
    pub container: Option<String>,
    #[serde(skip)]
    pub order_id: String,
}

/// Interpreted gateway result. Successful results are kept in the session
/// tier for order processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub success: bool,
    pub status: String,
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub message: String,
    #[serde(default)]
    pub raw_response: Value,
}
