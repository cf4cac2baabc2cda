//! WebSocket plumbing.
//!
//! Two clients over `tokio-tungstenite`, both running as background tasks
//! that own their reconnect policy:
//!
//! - [`stream`] — fire-and-forget push stream: subscribe on connect, forward
//!   every text frame to a callback. Used by the Bitstamp and Binance feeds.
//! - [`rpc`] — request/response correlation over the same kind of socket,
//!   plus push-notification dispatch. Used by the HitBTC feed.

pub mod rpc;
pub mod stream;

pub use rpc::{OnOpenCallback, PushHandler, RpcClient};
pub use stream::{OnMessageCallback, StreamConfig, StreamConnection};
