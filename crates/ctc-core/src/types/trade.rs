//! The canonical trade record — the common shape all sources are mapped into.
//!
//! Every adapter owns an explicit mapping function from its source's native
//! message shape into [`TradeRecord`]; nothing downstream of the buffer ever
//! sees a source-specific field again. Prices and amounts stay decimal
//! strings end to end so no precision is lost between the exchange and the
//! persistence boundary.
//!
//! # Timestamp convention
//!
//! `timestamp` is always **milliseconds since Unix epoch**. The conversion
//! from each source's native unit (seconds, microseconds, ISO-8601) happens
//! in the adapter's mapping function, never later.

use serde::{Deserialize, Serialize};

/// Taker side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Source-native trade identifier, kept opaque.
///
/// Exchanges disagree on whether trade ids are integers or strings; both are
/// carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TradeId {
    Num(u64),
    Text(String),
}

/// A single trade, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// `"source:pair"`, e.g. `"binance:ETH/BTC"`. Never empty.
    pub market: String,
    /// Source-native pair identifier, e.g. `"ETHBTC"` or `"btcusd"`.
    pub symbol: String,
    /// Decimal string, numeric-parseable.
    pub price: String,
    /// Decimal string, numeric-parseable.
    pub amount: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
    /// Source-native trade id.
    pub id: TradeId,
    /// Taker side.
    pub side: Side,
}

impl std::fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = match self.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        write!(f, "Trade({} {side} {}x{} ts={})", self.market, self.price, self.amount, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let record = TradeRecord {
            market: "hitbtc:BTC/USD".into(),
            symbol: "BTCUSD".into(),
            price: "100".into(),
            amount: "0.5".into(),
            timestamp: 1700000000000,
            id: TradeId::Num(1),
            side: Side::Buy,
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "market": "hitbtc:BTC/USD",
                "symbol": "BTCUSD",
                "price": "100",
                "amount": "0.5",
                "timestamp": 1700000000000u64,
                "id": 1,
                "side": "BUY"
            })
        );
    }

    #[test]
    fn trade_id_accepts_numbers_and_strings() {
        let n: TradeId = serde_json::from_value(serde_json::json!(21565524)).unwrap();
        assert_eq!(n, TradeId::Num(21565524));
        let s: TradeId = serde_json::from_value(serde_json::json!("a1b2c3")).unwrap();
        assert_eq!(s, TradeId::Text("a1b2c3".into()));
    }

    #[test]
    fn side_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Side::Sell).unwrap(), serde_json::json!("SELL"));
        let side: Side = serde_json::from_value(serde_json::json!("BUY")).unwrap();
        assert_eq!(side, Side::Buy);
    }
}
