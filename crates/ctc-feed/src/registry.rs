//! Module registry — factory for creating feed modules from config.

use anyhow::{Result, anyhow};
use ctc_core::buffer::TradeWriter;
use ctc_core::config::SourceConfig;

use crate::{FeedModule, binance::BinanceFeed, bitstamp::BitstampFeed, hitbtc::HitbtcFeed};

/// Create a `FeedModule` based on the `exchange` field in the config.
///
/// Every module gets its own clone of the shared buffer's writer.
pub fn create_feed(source: &SourceConfig, writer: TradeWriter) -> Result<Box<dyn FeedModule>> {
    match source.exchange.to_lowercase().as_str() {
        "bitstamp" => Ok(Box::new(BitstampFeed::new(source, writer))),
        "binance" => Ok(Box::new(BinanceFeed::new(source, writer))),
        "hitbtc" => Ok(Box::new(HitbtcFeed::new(source, writer))),
        other => Err(anyhow!("Unknown exchange: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctc_core::buffer::trade_buffer;

    #[test]
    fn known_exchanges_resolve() {
        let (writer, _drain) = trade_buffer();
        for exchange in ["bitstamp", "Binance", "HITBTC"] {
            let source: SourceConfig =
                serde_json::from_str(&format!(r#"{{"exchange": "{exchange}"}}"#)).unwrap();
            assert!(create_feed(&source, writer.clone()).is_ok(), "{exchange}");
        }
    }

    #[test]
    fn unknown_exchange_is_rejected() {
        let (writer, _drain) = trade_buffer();
        let source: SourceConfig = serde_json::from_str(r#"{"exchange": "mtgox"}"#).unwrap();
        assert!(create_feed(&source, writer).is_err());
    }
}
