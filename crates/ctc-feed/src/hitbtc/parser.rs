//! HitBTC message parser.
//!
//! Maps `updateTrades` push notifications (batched per symbol) into
//! canonical records.
//!
//! # Field contract
//!
//! | canonical   | raw                                              |
//! |-------------|--------------------------------------------------|
//! | `price`     | `price` (decimal string)                         |
//! | `amount`    | `quantity` (decimal string)                      |
//! | `timestamp` | `timestamp` — epoch-ms number, or ISO-8601 string parsed to epoch ms |
//! | `id`        | `id`                                             |
//! | `side`      | `side` (`"buy"` / `"sell"`)                      |
//! | `symbol`    | notification-level `symbol`                      |
//! | `market`    | `"hitbtc:" + dictionary[symbol]`                 |

use ctc_core::time_util;
use ctc_core::types::{Side, SymbolDictionary, TradeRecord};
use serde_json::Value;

use crate::json_util::{parse_decimal, parse_trade_id};

/// Map one `updateTrades` notification into canonical records.
///
/// Trades that fail field validation are dropped individually; the rest of
/// the batch still maps.
pub fn map_update(params: &Value, dict: &SymbolDictionary) -> Vec<TradeRecord> {
    let Some(symbol) = params.get("symbol").and_then(Value::as_str) else {
        return Vec::new();
    };
    let Some(data) = params.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    data.iter().filter_map(|raw| map_trade(raw, symbol, dict)).collect()
}

fn map_trade(raw: &Value, symbol: &str, dict: &SymbolDictionary) -> Option<TradeRecord> {
    let side = match raw.get("side")?.as_str()? {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        _ => return None,
    };

    Some(TradeRecord {
        market: format!("hitbtc:{}", dict.display_name(symbol)),
        symbol: symbol.to_string(),
        price: parse_decimal(raw.get("price"))?,
        amount: parse_decimal(raw.get("quantity"))?,
        timestamp: time_util::event_time_ms(raw.get("timestamp")?)?,
        id: parse_trade_id(raw.get("id"))?,
        side,
    })
}
