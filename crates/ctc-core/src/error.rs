//! Typed error definitions for the CTC trade collector.
//!
//! Provides [`CollectorError`] for domain-specific errors that are more
//! informative than plain `anyhow::Error` strings, and [`RpcError`] for the
//! per-request failure modes of the socket correlation client. All variants
//! implement `std::error::Error` via `thiserror`, so they integrate seamlessly
//! with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the CTC trade collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Tradable-pair discovery call failed (fatal to that adapter's startup).
    #[error("discovery error: {0}")]
    Discovery(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Trade message parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Persistence boundary error.
    #[error("store error: {0}")]
    Store(String),
}

/// Failure modes of a single correlation-client request.
///
/// Each variant surfaces only to the caller of that `request()`; none of them
/// affect other pending requests or the connection itself.
#[derive(Debug, Error)]
pub enum RpcError {
    /// `request()` was called while the socket is not open.
    #[error("websocket connection not established")]
    NotConnected,

    /// The connection closed while the request was pending.
    #[error("disconnected")]
    Disconnected,

    /// No response arrived within the request timeout window.
    #[error("request timed out")]
    Timeout,

    /// The far end rejected the request with an explicit error object.
    #[error("remote error: {0}")]
    Remote(serde_json::Value),
}
