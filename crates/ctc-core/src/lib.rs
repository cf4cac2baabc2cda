//! # ctc-core
//!
//! Core crate for the CTC trade collector, providing:
//!
//! - **Types** (`types`) — the canonical trade record and symbol dictionary
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific errors via thiserror
//! - **Trade buffer** (`buffer`) — many-producer/one-consumer record channel
//! - **Flush loop** (`flush`) — batch drain + `TradeStore` boundary
//! - **WebSocket** (`ws`) — push-stream client and request/response
//!   correlation client, both with auto-reconnect
//! - **Time utilities** (`time_util`) — epoch timestamps and event-time parsing
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod buffer;
pub mod config;
pub mod error;
pub mod flush;
pub mod logging;
pub mod time_util;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
