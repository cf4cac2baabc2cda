//! Bitstamp market data feed.
//!
//! Push-stream adapter: a one-shot REST discovery call fetches the
//! tradable-pair list, then a single WebSocket connection subscribes to one
//! `live_trades_<symbol>` channel per pair. The stream client owns
//! reconnects and re-sends every subscription frame on each reconnect.

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

const BITSTAMP_WS_URL: &str = "wss://ws.bitstamp.net";
const BITSTAMP_PAIRS_URL: &str = "https://www.bitstamp.net/api/v2/trading-pairs-info/";

/// One tradable pair from the discovery endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PairInfo {
    /// Channel symbol (e.g. `btcusd`).
    pub url_symbol: String,
    /// Display name (e.g. `BTC/USD`).
    pub name: String,
}

/// Bitstamp feed module.
pub struct BitstampFeed {
    source: SourceConfig,
    writer: TradeWriter,
    conn: Option<StreamConnection>,
}

impl BitstampFeed {
    pub fn new(source: &SourceConfig, writer: TradeWriter) -> Self {
        Self { source: source.clone(), writer, conn: None }
    }
}

/// Fetch the tradable-pair list.
async fn discover_pairs(rest_url: &str) -> Result<Vec<PairInfo>> {
    let pairs: Vec<PairInfo> =
        reqwest::get(rest_url).await?.error_for_status()?.json().await?;
    Ok(pairs)
}

#[async_trait]
impl FeedModule for BitstampFeed {
    fn name(&self) -> &str {
        "bitstamp"
    }

    async fn start(&mut self) -> Result<()> {
        let rest_url =
            self.source.rest_url.clone().unwrap_or_else(|| BITSTAMP_PAIRS_URL.to_string());
        let pairs = discover_pairs(&rest_url)
            .await
            .map_err(|e| CollectorError::Discovery(format!("bitstamp pairs: {e}")))?;

        let mut dict = SymbolDictionary::new();
        let mut subscribe_msgs = Vec::new();
        for pair in &pairs {
            if !self.source.accepts_symbol(&pair.url_symbol) {
                continue;
            }
            dict.insert(&pair.url_symbol, &pair.name);
            subscribe_msgs.push(parser::build_subscribe(&pair.url_symbol));
        }
        info!("[bitstamp] discovered {} pairs", dict.len());

        let dict = Arc::new(dict);
        let writer = self.writer.clone();
        let on_text: OnMessageCallback = Arc::new(move |text| {
            if let Some(record) = parser::parse_message(text, &dict) {
                writer.push(record);
            }
        });

        let mut conn = StreamConnection::new(StreamConfig {
            url: self.source.ws_url.clone().unwrap_or_else(|| BITSTAMP_WS_URL.to_string()),
            subscribe_msgs,
            ping_interval: None,
            label: "bitstamp".into(),
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
