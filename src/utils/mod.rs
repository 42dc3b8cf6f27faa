//! Numeric text normalization
//!
//! Amounts reach the calculator from spreadsheets, scraped pages and hand
//! typed forms in either comma-decimal (`1.234,56`) or dot-decimal
//! (`1,234.56`) notation. [`normalize_decimal`] turns such text into an exact
//! [`Decimal`] using these rules, applied after stripping everything except
//! digits, `.`, `,` and `-`:
//!
//! 1. With both separators present, the one appearing last is the decimal
//!    separator and every occurrence of the other is grouping.
//! 2. With only commas, a single comma is the decimal separator
//!    (`31,50`, and `1,500` reads as 1.5); several commas are grouping.
//! 3. With only dots, a single dot is the decimal separator; several dots are
//!    grouping (`1.234.567`).
//! 4. A minus sign is only accepted in front of the digits.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumberFormatError {
    #[error("no digits in '{0}'")]
    Empty(String),

    #[error("invalid number '{input}': {reason}")]
    Invalid { input: String, reason: String },
}

/// Parse locale-ambiguous numeric text into an exact decimal
///
/// # Examples
/// ```
/// use gainbook::utils::normalize_decimal;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(normalize_decimal("1.234,56").unwrap(), dec!(1234.56));
/// assert_eq!(normalize_decimal("1,234.56").unwrap(), dec!(1234.56));
/// assert_eq!(normalize_decimal("$ 31,50").unwrap(), dec!(31.50));
/// ```
pub fn normalize_decimal(input: &str) -> Result<Decimal, NumberFormatError> {
    let invalid = |reason: &str| NumberFormatError::Invalid {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let kept: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return Err(NumberFormatError::Empty(input.to_string()));
    }

    let (negative, body) = match kept.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, kept.as_str()),
    };
    if body.contains('-') {
        return Err(invalid("minus sign inside the number"));
    }

    let commas = body.matches(',').count();
    let dots = body.matches('.').count();

    let (grouping, decimal) = match (body.rfind(','), body.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => (Some('.'), Some(',')),
        (Some(_), Some(_)) => (Some(','), Some('.')),
        (Some(_), None) if commas == 1 => (None, Some(',')),
        (Some(_), None) => (Some(','), None),
        (None, Some(_)) if dots == 1 => (None, Some('.')),
        (None, Some(_)) => (Some('.'), None),
        (None, None) => (None, None),
    };

    if let Some(sep) = decimal {
        if body.matches(sep).count() > 1 {
            return Err(invalid("decimal separator appears more than once"));
        }
    }

    let mut normalized = String::with_capacity(body.len() + 1);
    if negative {
        normalized.push('-');
    }
    for c in body.chars() {
        if Some(c) == grouping {
            continue;
        }
        normalized.push(if Some(c) == decimal { '.' } else { c });
    }

    Decimal::from_str(&normalized).map_err(|err| invalid(&err.to_string()))
}

/// Parse a price-like value, keeping it only when strictly positive
pub fn parse_positive_price(input: &str) -> Option<Decimal> {
    normalize_decimal(input)
        .ok()
        .filter(|value| *value > Decimal::ZERO)
}
