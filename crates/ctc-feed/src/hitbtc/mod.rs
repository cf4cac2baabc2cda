//! HitBTC market data feed.
//!
//! Correlation-client adapter: HitBTC exposes a JSON-RPC-style socket, so
//! discovery and subscription are `request()` calls on the shared
//! [`RpcClient`] rather than REST. The client's `on_open` hook reruns
//! discovery and resubscribes every symbol on each (re)connect, rebuilding
//! the symbol dictionary — the tradable list may have changed while
//! disconnected. Trades arrive as `updateTrades` push notifications, batched
//! per symbol.

pub mod parser;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use ctc_core::buffer::TradeWriter;
use ctc_core::config::SourceConfig;
use ctc_core::error::RpcError;
use ctc_core::types::SymbolDictionary;
use ctc_core::ws::{OnOpenCallback, RpcClient};
use serde_json::Value;
use tracing::{info, warn};

use crate::FeedModule;

const HITBTC_WS_URL: &str = "wss://api.hitbtc.com/api/2/ws";

/// HitBTC feed module.
pub struct HitbtcFeed {
    source: SourceConfig,
    writer: TradeWriter,
    client: Option<RpcClient>,
}

impl HitbtcFeed {
    pub fn new(source: &SourceConfig, writer: TradeWriter) -> Self {
        Self { source: source.clone(), writer, client: None }
    }
}

#[async_trait]
impl FeedModule for HitbtcFeed {
    fn name(&self) -> &str {
        "hitbtc"
    }

    async fn start(&mut self) -> Result<()> {
        let dict = Arc::new(Mutex::new(SymbolDictionary::new()));
        let client =
            RpcClient::new(self.source.ws_url.clone().unwrap_or_else(|| HITBTC_WS_URL.to_string()));

        // Register the push handler before the socket opens so no trade
        // accepted after resubscription can slip past it.
        let writer = self.writer.clone();
        let handler_dict = dict.clone();
        client.subscribe(
            "updateTrades",
            Arc::new(move |params: &Value| {
                let dict = handler_dict.lock().unwrap();
                for record in parser::map_update(params, &dict) {
                    writer.push(record);
                }
            }),
        );

        let source = self.source.clone();
        let on_open: OnOpenCallback = Arc::new(move |client: RpcClient| {
            let dict = dict.clone();
            let source = source.clone();
            Box::pin(async move {
                // Failures here don't tear anything down: the connection is
                // still owned by the reconnect loop, which reruns this hook.
                if let Err(e) = resubscribe(&client, &dict, &source).await {
                    warn!("[hitbtc] (re)subscription failed: {e}");
                }
            })
        });
        client.start(on_open);
        self.client = Some(client);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.stop();
        }
        Ok(())
    }
}

/// Rebuild the symbol dictionary and subscribe every symbol's trade stream.
///
/// Runs on every transition to Open. The fresh dictionary is swapped in
/// before the first `subscribeTrades` request goes out, so every accepted
/// trade is tagged against current symbols.
async fn resubscribe(
    client: &RpcClient,
    dict: &Mutex<SymbolDictionary>,
    source: &SourceConfig,
) -> Result<(), RpcError> {
    let symbols = client.request("getSymbols", serde_json::json!({})).await?;

    let mut fresh = SymbolDictionary::new();
    let mut subscribe = Vec::new();
    for info in symbols.as_array().map(Vec::as_slice).unwrap_or_default() {
        let (Some(id), Some(base), Some(quote)) = (
            info.get("id").and_then(Value::as_str),
            info.get("baseCurrency").and_then(Value::as_str),
            info.get("quoteCurrency").and_then(Value::as_str),
        ) else {
            continue;
        };
        if !source.accepts_symbol(id) {
            continue;
        }
        fresh.insert(id, &format!("{base}/{quote}"));
        subscribe.push(id.to_string());
    }
    info!("[hitbtc] discovered {} symbols", fresh.len());
    *dict.lock().unwrap() = fresh;

    for symbol in subscribe {
        client.request("subscribeTrades", serde_json::json!({ "symbol": symbol })).await?;
    }
    Ok(())
}
