//! # ctc-feed
//!
//! Source adapters for the trade collector — one module per market-data
//! source. Each adapter discovers its tradable symbols, subscribes to the
//! source's trade stream, and maps every observed trade into the canonical
//! [`TradeRecord`](ctc_core::TradeRecord) pushed into the shared buffer.
//!
//! ## Sources
//!
//! | Source   | Module     | Feed style                                   |
//! |----------|------------|----------------------------------------------|
//! | Bitstamp | `bitstamp` | push stream, one channel per pair            |
//! | Binance  | `binance`  | push stream, all symbols on one connection   |
//! | HitBTC   | `hitbtc`   | request/response correlation client          |
//!
//! ## Shared infrastructure
//!
//! - [`registry`] — factory mapping config entries to feed modules
//! - [`json_util`] — field extraction helpers shared by the parsers

pub mod binance;
pub mod bitstamp;
pub mod hitbtc;
pub mod json_util;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;

/// Trait implemented by all source adapters.
///
/// Only `Send` is required (not `Sync`) because modules are accessed
/// sequentially by the runner, never concurrently.
#[async_trait]
pub trait FeedModule: Send {
    /// Human-readable module name.
    fn name(&self) -> &str;
    /// Discover symbols, connect, and begin producing trade records.
    ///
    /// A discovery failure here is fatal to this adapter; sources whose
    /// connection owns a reconnect loop retry discovery there instead.
    async fn start(&mut self) -> Result<()>;
    /// Stop the connection and all tasks.
    async fn stop(&mut self) -> Result<()>;
}
