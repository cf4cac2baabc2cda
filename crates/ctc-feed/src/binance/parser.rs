//! Binance message parser.
//!
//! Maps `@trade` stream events into canonical records.
//!
//! # Field contract
//!
//! | canonical   | raw                                |
//! |-------------|------------------------------------|
//! | `price`     | `p` (decimal string)               |
//! | `amount`    | `q` (decimal string)               |
//! | `timestamp` | `E` (event time, already epoch ms) |
//! | `id`        | `t` (number)                       |
//! | `symbol`    | `s`                                |
//! | `market`    | `"binance:" + dictionary[s]`       |
//! | `side`      | always BUY — see below             |
//!
//! The taker side is **not** derived from the buyer-maker flag (`m`); every
//! trade is tagged BUY. Downstream consumers compensate for this, so it is
//! pinned by `side_is_always_buy` below.
//! TODO: derive side from `m` once downstream consumers stop assuming BUY.

use ctc_core::types::{Side, SymbolDictionary, TradeRecord};

use crate::json_util::{parse_decimal, parse_trade_id};

/// Build the `SUBSCRIBE` frame covering every symbol's trade stream.
pub fn build_trade_subscribe(symbols: &[String]) -> String {
    let params: Vec<String> =
        symbols.iter().map(|s| format!("{}@trade", s.to_lowercase())).collect();
    serde_json::json!({
        "method": "SUBSCRIBE",
        "params": params,
        "id": 1
    })
    .to_string()
}

/// Parse a Binance WebSocket message into a canonical record.
///
/// Returns `None` for messages that are not trade events (subscription acks
/// and other stream types).
pub fn parse_message(text: &str, dict: &SymbolDictionary) -> Option<TradeRecord> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;

    if v.get("e")?.as_str()? != "trade" {
        return None;
    }
    let symbol = v.get("s")?.as_str()?;

    Some(TradeRecord {
        market: format!("binance:{}", dict.display_name(symbol)),
        symbol: symbol.to_string(),
        price: parse_decimal(v.get("p"))?,
        amount: parse_decimal(v.get("q"))?,
        timestamp: v.get("E")?.as_u64()?,
        id: parse_trade_id(v.get("t"))?,
        side: Side::Buy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctc_core::types::TradeId;

    fn dict() -> SymbolDictionary {
        let mut dict = SymbolDictionary::new();
        dict.insert("ETHBTC", "ETH/BTC");
        dict
    }

    const TRADE: &str = r#"{
        "e": "trade",
        "E": 1508614495052,
        "s": "ETHBTC",
        "t": 2148226,
        "p": "0.04923600",
        "q": "3.43500000",
        "b": 88,
        "a": 50,
        "T": 1508614495050,
        "m": false,
        "M": true
    }"#;

    #[test]
    fn parse_trade_msg() {
        let record = parse_message(TRADE, &dict()).unwrap();
        assert_eq!(record.market, "binance:ETH/BTC");
        assert_eq!(record.symbol, "ETHBTC");
        assert_eq!(record.price, "0.04923600");
        assert_eq!(record.amount, "3.43500000");
        assert_eq!(record.timestamp, 1508614495052);
        assert_eq!(record.id, TradeId::Num(2148226));
    }

    /// Pins the known quirk: the side is BUY no matter what `m` says.
    #[test]
    fn side_is_always_buy() {
        let dict = dict();
        let taker_buy = parse_message(TRADE, &dict).unwrap();
        let taker_sell = parse_message(&TRADE.replace(r#""m": false"#, r#""m": true"#), &dict).unwrap();
        assert_eq!(taker_buy.side, Side::Buy);
        assert_eq!(taker_sell.side, Side::Buy);
    }

    #[test]
    fn mapping_is_pure() {
        let dict = dict();
        assert_eq!(parse_message(TRADE, &dict), parse_message(TRADE, &dict));
    }

    #[test]
    fn non_trade_events_are_skipped() {
        assert!(parse_message(r#"{"result":null,"id":1}"#, &dict()).is_none());
        assert!(parse_message(r#"{"e":"aggTrade","s":"ETHBTC"}"#, &dict()).is_none());
    }

    #[test]
    fn subscribe_frame_lowercases_symbols() {
        let frame = build_trade_subscribe(&["ETHBTC".to_string(), "BTCUSDT".to_string()]);
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["method"], "SUBSCRIBE");
        assert_eq!(v["params"], serde_json::json!(["ethbtc@trade", "btcusdt@trade"]));
    }

    #[test]
    fn unknown_symbol_still_tags_market() {
        let record =
            parse_message(&TRADE.replace("ETHBTC", "NEWCOIN"), &dict()).unwrap();
        assert_eq!(record.market, "binance:NEWCOIN");
    }
}
