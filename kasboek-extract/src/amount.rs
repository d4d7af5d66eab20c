//! Currency amounts: locate the first euro-marked number and normalize its
//! separators.
//!
//! Normalization, in priority order:
//!   1. both "." and "," present: the rightmost one is the decimal point
//!   2. only ",": decimal comma ("10,50")
//!   3. only ".": decimal point as-is, so "1.000" stays 1.000
//!   4. neither: whole number

use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::patterns;

/// Amount of the first euro-marked token in `text`.
///
/// Only the first token is considered: if it does not parse, the result is
/// `None` even when a later token would.
pub fn resolve_amount(text: &str) -> Option<Decimal> {
    let token = patterns::first_amount_token(text)?;
    let amount = normalize_amount(token.raw);
    match amount {
        Some(a) => trace!(raw = token.raw, amount = %a, "amount token"),
        None => debug!(raw = token.raw, "amount token did not parse"),
    }
    amount
}

/// Turn a digit/separator run into an exact decimal.
pub fn normalize_amount(raw: &str) -> Option<Decimal> {
    let cleaned = match (raw.rfind('.'), raw.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (None, Some(_)) => raw.replace(',', "."),
        _ => raw.to_string(),
    };
    parse_plain_decimal(&cleaned)
}

/// Accepts `digits[.digits]`, also "5." and ".5". Anything else is `None`,
/// including values that do not fit a `Decimal` without rounding.
fn parse_plain_decimal(s: &str) -> Option<Decimal> {
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !digits(frac) || (whole.is_empty() && frac.is_empty()) {
        return None;
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let canonical = if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    };
    Decimal::from_str_exact(&canonical).ok()
}
