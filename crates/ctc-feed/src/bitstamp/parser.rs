//! Bitstamp message parser.
//!
//! Maps `live_trades_<symbol>` channel events into canonical records.
//!
//! # Field contract
//!
//! | canonical   | raw                                  |
//! |-------------|--------------------------------------|
//! | `price`     | `price_str` (decimal string)         |
//! | `amount`    | `amount_str` (decimal string)        |
//! | `timestamp` | `microtimestamp` (string **µs**) / 1000, falling back to `timestamp` (string **s**) × 1000 |
//! | `id`        | `id` (number)                        |
//! | `side`      | `type` (0 = BUY, 1 = SELL)           |
//! | `symbol`    | channel name minus `live_trades_`    |
//! | `market`    | `"bitstamp:" + dictionary[symbol]`   |

use ctc_core::types::{Side, SymbolDictionary, TradeRecord};

use crate::json_util::{parse_decimal, parse_str_u64, parse_trade_id};

/// Build the subscription frame for one pair's live-trades channel.
pub fn build_subscribe(symbol: &str) -> String {
    serde_json::json!({
        "event": "bts:subscribe",
        "data": { "channel": format!("live_trades_{symbol}") }
    })
    .to_string()
}

/// Parse a Bitstamp WebSocket message into a canonical record.
///
/// Returns `None` for messages that are not trades (subscription acks,
/// heartbeats) and for trades that fail field validation.
pub fn parse_message(text: &str, dict: &SymbolDictionary) -> Option<TradeRecord> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;

    if v.get("event")?.as_str()? != "trade" {
        return None;
    }
    let symbol = v.get("channel")?.as_str()?.strip_prefix("live_trades_")?;
    let data = v.get("data")?;

    let timestamp = match parse_str_u64(data.get("microtimestamp")) {
        Some(us) => us / 1000,
        None => parse_str_u64(data.get("timestamp"))?.checked_mul(1000)?,
    };
    let side = match data.get("type")?.as_u64()? {
        0 => Side::Buy,
        1 => Side::Sell,
        _ => return None,
    };

    Some(TradeRecord {
        market: format!("bitstamp:{}", dict.display_name(symbol)),
        symbol: symbol.to_string(),
        price: parse_decimal(data.get("price_str"))?,
        amount: parse_decimal(data.get("amount_str"))?,
        timestamp,
        id: parse_trade_id(data.get("id"))?,
        side,
    })
}
