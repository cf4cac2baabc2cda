//! Shared JSON field extraction helpers used by all source parsers.
//!
//! Exchanges disagree on whether numeric fields arrive as JSON strings or
//! native numbers; these helpers accept both so the per-source mapping
//! functions stay focused on field choice and unit conversion.

use ctc_core::types::TradeId;
use serde_json::Value;

/// Extract a decimal field as a validated string.
///
/// Strings are kept verbatim after a `fast-float` parseability check (the
/// canonical record carries prices and amounts as decimal strings, so no
/// precision is lost). Native numbers are rendered to their JSON text form.
#[inline]
pub fn parse_decimal(v: Option<&Value>) -> Option<String> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse::<f64, _>(s).ok()?;
        Some(s.to_string())
    } else if v.is_number() {
        Some(v.to_string())
    } else {
        None
    }
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.parse().ok()
    } else {
        v.as_u64()
    }
}

/// Extract a source-native trade id, keeping its shape.
#[inline]
pub fn parse_trade_id(v: Option<&Value>) -> Option<TradeId> {
    let v = v?;
    if let Some(n) = v.as_u64() {
        Some(TradeId::Num(n))
    } else {
        v.as_str().map(|s| TradeId::Text(s.to_string()))
    }
}
