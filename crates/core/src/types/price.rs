//! Sri Lankan rupee price formatting and parsing.
//!
//! All storefront prices are LKR amounts held as [`Decimal`] so that cart
//! subtotals never pick up binary floating point drift.

use rust_decimal::{Decimal, RoundingStrategy};

/// ISO 4217 code of the only currency the storefront sells in.
pub const CURRENCY_CODE: &str = "LKR";

/// Errors that can occur when parsing a price string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input string is empty.
    #[error("price cannot be empty")]
    Empty,
    /// The input is not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),
}

/// Format an amount for display, e.g. `LKR 1,234.50`.
///
/// Missing and zero amounts render as `LKR 0.00`. Amounts are rounded half
/// away from zero to two decimal places.
///
/// ```
/// use pickpack_core::format_price;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_price(None), "LKR 0.00");
/// assert_eq!(format_price(Some(Decimal::new(12345, 1))), "LKR 1,234.50");
/// ```
#[must_use]
pub fn format_price(amount: Option<Decimal>) -> String {
    let amount = match amount {
        Some(a) if !a.is_zero() => a,
        _ => return format!("{CURRENCY_CODE} 0.00"),
    };

    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    format!("{CURRENCY_CODE} {sign}{}.{fraction}", group_thousands(whole))
}

/// Parse a price from user or API text. Surrounding whitespace and thousands
/// separators are ignored.
///
/// # Errors
///
/// Returns [`PriceError`] if the input is empty or not a decimal number.
pub fn parse_price(s: &str) -> Result<Decimal, PriceError> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(PriceError::Empty);
    }
    cleaned
        .parse::<Decimal>()
        .map_err(|_| PriceError::Invalid(s.to_owned()))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
