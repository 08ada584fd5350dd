//! DirectPay IPG checkout.
//!
//! The hosted checkout widget takes a base64 JSON payload (`dataString`) and
//! an HMAC-SHA256 signature of that string keyed with the merchant secret.
//! This module builds both and interprets what the widget reports back. The
//! widget itself runs in the browser and is not part of this crate.
//!
//! See <https://doc.directpay.lk/>.

pub mod types;

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use pickpack_core::CURRENCY_CODE;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::DirectPayConfig;
use crate::storage::{KeyValueStore, read_json, write_json};

pub use types::{CheckoutInit, DirectPayPayload, PaymentOutcome, PaymentRequest};

/// Session-tier key holding the last successful payment.
pub const PAYMENT_RESULT_KEY: &str = "directpay_payment_result";

/// Order ID prefix when the caller does not choose one.
pub const DEFAULT_ORDER_PREFIX: &str = "ORD";

/// Container used for inline checkout when none is named.
pub const DEFAULT_CONTAINER: &str = "card_container";

const ORDER_SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ORDER_SUFFIX_LEN: usize = 6;

/// Reasons a checkout cannot be prepared.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Valid amount is required")]
    InvalidAmount,

    #[error("Customer email is required")]
    MissingEmail,

    #[error("DirectPay secret key is not configured")]
    MissingSecretKey,

    #[error("Failed to sign payload: {0}")]
    Signature(String),

    #[error("Failed to encode payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

// =============================================================================
// Pure helpers
// =============================================================================

/// `<prefix><epoch millis><6 uppercase alphanumerics>`.
#[must_use]
pub fn generate_order_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| char::from(ORDER_SUFFIX_CHARSET[rng.random_range(0..ORDER_SUFFIX_CHARSET.len())]))
        .collect();
    format!("{prefix}{}{suffix}", Utc::now().timestamp_millis())
}

/// Amount with exactly two decimal places, as the gateway expects.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Base64 of the payload's JSON.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized.
pub fn encode_payload(payload: &DirectPayPayload) -> Result<String, PaymentError> {
    let json = serde_json::to_string(payload)?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Hex HMAC-SHA256 of `data_string`.
///
/// # Errors
///
/// Returns an error if the key is rejected by the MAC.
pub fn sign(data_string: &str, secret_key: &str) -> Result<String, PaymentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .map_err(|e| PaymentError::Signature(e.to_string()))?;
    mac.update(data_string.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// String or number field as text.
fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpret what the checkout widget resolved with.
///
/// `status: SUCCESS` succeeds; `FAILED` and `CANCELLED` fail. Any other
/// body succeeds when `status` is `200` or `success` is `true`, with the
/// transaction details possibly nested under `data`.
#[must_use]
pub fn interpret_response(response: Option<&Value>, order_id: &str) -> PaymentOutcome {
    let Some(result) = response.filter(|r| !r.is_null()) else {
        return PaymentOutcome {
            success: false,
            status: "ERROR".to_string(),
            order_id: order_id.to_string(),
            transaction_id: None,
            amount: None,
            currency: None,
            message: "No response received from payment gateway. Please try again.".to_string(),
            raw_response: Value::Null,
        };
    };

    let status = result.get("status");
    let status_text = status.and_then(Value::as_str);
    let message = |default: &str| text_field(result.get("message")).unwrap_or_else(|| default.to_string());
    let data = result.get("data");

    match status_text {
        Some("SUCCESS") => PaymentOutcome {
            success: true,
            status: "SUCCESS".to_string(),
            order_id: order_id.to_string(),
            transaction_id: text_field(result.get("transaction_id"))
                .or_else(|| text_field(result.get("transactionId"))),
            amount: text_field(result.get("amount")),
            currency: text_field(result.get("currency")).or_else(|| Some(CURRENCY_CODE.to_string())),
            message: message("Payment successful"),
            raw_response: result.clone(),
        },
        Some(failed @ ("FAILED" | "CANCELLED")) => PaymentOutcome {
            success: false,
            status: failed.to_string(),
            order_id: order_id.to_string(),
            transaction_id: None,
            amount: None,
            currency: None,
            message: message(if failed == "CANCELLED" {
                "Payment cancelled"
            } else {
                "Payment failed"
            }),
            raw_response: result.clone(),
        },
        _ => {
            let succeeded = status.and_then(Value::as_i64) == Some(200)
                || result.get("success").and_then(Value::as_bool) == Some(true);

            if succeeded {
                PaymentOutcome {
                    success: true,
                    status: "SUCCESS".to_string(),
                    order_id: order_id.to_string(),
                    transaction_id: text_field(result.get("transaction_id"))
                        .or_else(|| text_field(result.get("transactionId")))
                        .or_else(|| text_field(data.and_then(|d| d.get("transactionId")))),
                    amount: text_field(result.get("amount"))
                        .or_else(|| text_field(data.and_then(|d| d.get("amount")))),
                    currency: None,
                    message: message("Payment successful"),
                    raw_response: result.clone(),
                }
            } else {
                PaymentOutcome {
                    success: false,
                    status: text_field(status).unwrap_or_else(|| "UNKNOWN".to_string()),
                    order_id: order_id.to_string(),
                    transaction_id: None,
                    amount: None,
                    currency: None,
                    message: message("Payment failed"),
                    raw_response: result.clone(),
                }
            }
        }
    }
}

/// Interpret what the checkout widget rejected with.
///
/// The message comes from the first of: the error itself when it is a
/// string, `message`, `description`, `error_description`, `responseMessage`.
/// The status comes from `status`, then `code`, then `FAILED`.
#[must_use]
pub fn interpret_error(error: &Value, order_id: &str) -> PaymentOutcome {
    let message = match error {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => ["message", "description", "error_description", "responseMessage"]
            .iter()
            .find_map(|key| text_field(error.get(*key))),
    };
    let status = text_field(error.get("status")).or_else(|| text_field(error.get("code")));

    PaymentOutcome {
        success: false,
        status: status.unwrap_or_else(|| "FAILED".to_string()),
        order_id: order_id.to_string(),
        transaction_id: None,
        amount: None,
        currency: None,
        message: message.unwrap_or_else(|| "Payment failed. Please try again.".to_string()),
        raw_response: error.clone(),
    }
}

// =============================================================================
// DirectPay client
// =============================================================================

/// Prepares checkouts and records their results.
#[derive(Clone)]
pub struct DirectPay {
    config: DirectPayConfig,
    session: Arc<dyn KeyValueStore>,
}

impl DirectPay {
    /// `session` is the tier successful results are stored in.
    #[must_use]
    pub fn new(config: DirectPayConfig, session: Arc<dyn KeyValueStore>) -> Self {
        Self { config, session }
    }

    #[must_use]
    pub const fn config(&self) -> &DirectPayConfig {
        &self.config
    }

    /// Build the signed payload for a one-time payment.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive, the email is missing,
    /// no secret key is configured, or signing fails.
    #[instrument(skip(self, request), fields(amount = %request.amount))]
    pub fn prepare_checkout(&self, request: &PaymentRequest) -> Result<CheckoutInit, PaymentError> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        let email = request
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(PaymentError::MissingEmail)?;
        let secret = self.config.secret().ok_or(PaymentError::MissingSecretKey)?;

        let order_id = request
            .order_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| generate_order_id(DEFAULT_ORDER_PREFIX));
        let or_empty = |field: &Option<String>| field.clone().unwrap_or_default();

        let payload = DirectPayPayload {
            merchant_id: self.config.merchant_id.clone(),
            amount: format_amount(request.amount),
            payment_type: "ONE_TIME".to_string(),
            order_id: order_id.clone(),
            currency: CURRENCY_CODE.to_string(),
            first_name: or_empty(&request.first_name),
            last_name: or_empty(&request.last_name),
            email: email.to_string(),
            phone: or_empty(&request.phone),
            logo: or_empty(&request.logo_url),
            response_url: request.response_url.clone().filter(|u| !u.is_empty()),
            return_url: request.return_url.clone().filter(|u| !u.is_empty()),
        };

        let data_string = encode_payload(&payload)?;
        let signature = sign(&data_string, secret)?;

        info!(
            order_id = %order_id,
            merchant_id = %self.config.merchant_id,
            stage = self.config.environment.stage(),
            "Prepared DirectPay checkout"
        );

        Ok(CheckoutInit {
            signature,
            data_string,
            stage: self.config.environment.stage(),
            container: (!request.use_popup).then(|| {
                request
                    .container_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CONTAINER.to_string())
            }),
            order_id,
        })
    }

    /// Interpret a widget response and store it when successful.
    pub fn handle_response(&self, response: Option<&Value>, order_id: &str) -> PaymentOutcome {
        let outcome = interpret_response(response, order_id);
        if outcome.success {
            self.store_result(&outcome);
        } else {
            warn!(order_id, status = %outcome.status, "Payment not completed");
        }
        outcome
    }

    fn store_result(&self, outcome: &PaymentOutcome) {
        if let Err(e) = write_json(self.session.as_ref(), PAYMENT_RESULT_KEY, outcome) {
            warn!(error = %e, "Could not store payment result");
        }
    }

    /// Last stored successful payment.
    #[must_use]
    pub fn stored_result(&self) -> Option<PaymentOutcome> {
        read_json(self.session.as_ref(), PAYMENT_RESULT_KEY).unwrap_or_else(|e| {
            warn!(error = %e, "Could not read payment result");
            None
        })
    }

    /// Forget the stored payment.
    pub fn clear_stored_result(&self) {
        if let Err(e) = self.session.remove(PAYMENT_RESULT_KEY) {
            warn!(error = %e, "Could not clear payment result");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::storage::MemoryStorage;

    const KEY: &str = "2f8832325b0d1b593ed486a0c0b7b1ad";

    fn directpay() -> DirectPay {
        let config = DirectPayConfig {
            secret_key: Some(SecretString::from(KEY.to_string())),
            ..DirectPayConfig::default()
        };
        DirectPay::new(config, Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_order_id_format() {
        let id = generate_order_id("ORD");
        assert!(id.starts_with("ORD"));
        let suffix = &id[id.len() - ORDER_SUFFIX_LEN..];
        assert!(suffix.bytes().all(|b| ORDER_SUFFIX_CHARSET.contains(&b)));
        let millis = &id[3..id.len() - ORDER_SUFFIX_LEN];
        assert!(millis.parse::<i64>().is_ok());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(1500, 0)), "1500.00");
        assert_eq!(format_amount(Decimal::new(12345, 3)), "12.35");
        assert_eq!(format_amount(Decimal::new(5, 1)), "0.50");
    }

    #[test]
    fn test_prepare_checkout_signs_data_string() {
        let mut request = PaymentRequest::new(Decimal::new(250_050, 2), "nimal@example.lk");
        request.order_id = Some("ORD1".into());
        request.return_url = Some("https://shop.lk/done".into());

        let init = directpay().prepare_checkout(&request).unwrap();
        assert_eq!(init.stage, "DEV");
        assert_eq!(init.container.as_deref(), Some(DEFAULT_CONTAINER));
        assert_eq!(init.signature, sign(&init.data_string, KEY).unwrap());

        let decoded: Value =
            serde_json::from_slice(&STANDARD.decode(&init.data_string).unwrap()).unwrap();
        assert_eq!(decoded["merchant_id"], "LA13502");
        assert_eq!(decoded["amount"], "2500.50");
        assert_eq!(decoded["type"], "ONE_TIME");
        assert_eq!(decoded["currency"], "LKR");
        assert_eq!(decoded["phone"], "");
        assert_eq!(decoded["return_url"], "https://shop.lk/done");
        assert!(decoded.get("response_url").is_none());
    }

    #[test]
    fn test_prepare_checkout_validation() {
        let dp = directpay();
        assert!(matches!(
            dp.prepare_checkout(&PaymentRequest::new(Decimal::ZERO, "a@b.lk")),
            Err(PaymentError::InvalidAmount)
        ));
        assert!(matches!(
            dp.prepare_checkout(&PaymentRequest::new(Decimal::ONE, " ")),
            Err(PaymentError::MissingEmail)
        ));

        let unsigned = DirectPay::new(DirectPayConfig::default(), Arc::new(MemoryStorage::new()));
        assert!(matches!(
            unsigned.prepare_checkout(&PaymentRequest::new(Decimal::ONE, "a@b.lk")),
            Err(PaymentError::MissingSecretKey)
        ));
    }

    #[test]
    fn test_interpret_response_variants() {
        let ok = interpret_response(Some(&json!({"status": "SUCCESS", "transaction_id": 991})), "O1");
        assert!(ok.success);
        assert_eq!(ok.transaction_id.as_deref(), Some("991"));
        assert_eq!(ok.currency.as_deref(), Some("LKR"));

        let cancelled = interpret_response(Some(&json!({"status": "CANCELLED"})), "O1");
        assert!(!cancelled.success);
        assert_eq!(cancelled.message, "Payment cancelled");

        let nested = interpret_response(
            Some(&json!({"status": 200, "data": {"transactionId": "T9", "amount": "10.00"}})),
            "O1",
        );
        assert!(nested.success);
        assert_eq!(nested.transaction_id.as_deref(), Some("T9"));
        assert_eq!(nested.amount.as_deref(), Some("10.00"));

        let unknown = interpret_response(Some(&json!({"foo": 1})), "O1");
        assert_eq!(unknown.status, "UNKNOWN");
        assert_eq!(unknown.message, "Payment failed");

        let missing = interpret_response(None, "O1");
        assert_eq!(missing.status, "ERROR");
    }

    #[test]
    fn test_interpret_error() {
        let plain = interpret_error(&json!("Card declined"), "O1");
        assert_eq!(plain.message, "Card declined");
        assert_eq!(plain.status, "FAILED");

        let coded = interpret_error(&json!({"error_description": "Timeout", "code": 504}), "O1");
        assert_eq!(coded.message, "Timeout");
        assert_eq!(coded.status, "504");
    }

    #[test]
    fn test_successful_result_is_stored() {
        let dp = directpay();
        dp.handle_response(Some(&json!({"status": "FAILED"})), "O1");
        assert!(dp.stored_result().is_none());

        dp.handle_response(Some(&json!({"status": "SUCCESS"})), "O2");
        assert_eq!(dp.stored_result().unwrap().order_id, "O2");

        dp.clear_stored_result();
        assert!(dp.stored_result().is_none());
    }
}
