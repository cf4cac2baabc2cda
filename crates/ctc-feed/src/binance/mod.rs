//! Binance market data feed.
//!
//! Multiplexed push-stream adapter: a one-shot REST `exchangeInfo` call
//! builds the symbol dictionary, then a single WebSocket connection carries
//! one `SUBSCRIBE` frame covering the `@trade` stream of every symbol. The
//! stream client owns reconnects and replays the subscription.

pub mod parser;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ctc_core::buffer::TradeWriter;
use ctc_core::config::SourceConfig;
use ctc_core::error::CollectorError;
use ctc_core::types::SymbolDictionary;
use ctc_core::ws::{OnMessageCallback, StreamConfig, StreamConnection};
use serde::Deserialize;
use tracing::info;

use crate::FeedModule;

const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";
const BINANCE_EXCHANGE_INFO_URL: &str = "https://api.binance.com/api/v3/exchangeInfo";

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<PairInfo>,
}

/// One tradable pair from `exchangeInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
}

/// Binance feed module.
pub struct BinanceFeed {
    source: SourceConfig,
    writer: TradeWriter,
    conn: Option<StreamConnection>,
}

impl BinanceFeed {
    pub fn new(source: &SourceConfig, writer: TradeWriter) -> Self {
        Self { source: source.clone(), writer, conn: None }
    }
}

/// Fetch `exchangeInfo` and build the symbol dictionary + subscribe list.
async fn discover_symbols(
    rest_url: &str,
    source: &SourceConfig,
) -> Result<(SymbolDictionary, Vec<String>)> {
    let info: ExchangeInfo =
        reqwest::get(rest_url).await?.error_for_status()?.json().await?;

    let mut dict = SymbolDictionary::new();
    let mut subscribe = Vec::new();
    for pair in &info.symbols {
        if !source.accepts_symbol(&pair.symbol) {
            continue;
        }
        dict.insert(&pair.symbol, &format!("{}/{}", pair.base_asset, pair.quote_asset));
        subscribe.push(pair.symbol.clone());
    }
    Ok((dict, subscribe))
}

#[async_trait]
impl FeedModule for BinanceFeed {
    fn name(&self) -> &str {
        "binance"
    }

    async fn start(&mut self) -> Result<()> {
        let rest_url =
            self.source.rest_url.clone().unwrap_or_else(|| BINANCE_EXCHANGE_INFO_URL.to_string());
        let (dict, subscribe) = discover_symbols(&rest_url, &self.source)
            .await
            .map_err(|e| CollectorError::Discovery(format!("binance exchangeInfo: {e}")))?;
        info!("[binance] discovered {} symbols", dict.len());

        let dict = Arc::new(dict);
        let writer = self.writer.clone();
        let on_text: OnMessageCallback = Arc::new(move |text| {
            if let Some(record) = parser::parse_message(text, &dict) {
                writer.push(record);
            }
        });

        let mut conn = StreamConnection::new(StreamConfig {
            url: self.source.ws_url.clone().unwrap_or_else(|| BINANCE_WS_URL.to_string()),
            subscribe_msgs: vec![parser::build_trade_subscribe(&subscribe)],
            ping_interval: None,
            label: "binance".into(),
        });
        conn.start(on_text);
        self.conn = Some(conn);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(mut conn) = self.conn.take() {
            conn.stop().await;
        }
        Ok(())
    }
}
