//! Single push-stream WebSocket connection with auto-reconnect.
//!
//! Each `StreamConnection` runs as a tokio task that:
//! 1. Connects to the source's WebSocket endpoint (TLS).
//! 2. Sends the subscription messages.
//! 3. Reads messages and forwards them to a callback.
//! 4. Answers server pings, optionally sends its own keep-alive pings.
//! 5. Automatically reconnects on disconnection with exponential backoff,
//!    re-sending every subscription message so the feed resumes where it was.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Callback invoked for each received text frame.
pub type OnMessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration for a single push-stream connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Full WebSocket URL (e.g. `wss://ws.bitstamp.net`).
    pub url: String,
    /// Messages sent immediately after every (re)connect — one subscription
    /// frame per channel.
    pub subscribe_msgs: Vec<String>,
    /// Interval between keep-alive ping frames, if the source needs them.
    pub ping_interval: Option<Duration>,
    /// Human-readable label for log lines (e.g. `"bitstamp"`).
    pub label: String,
}

/// A push-stream connection managed by a background tokio task.
pub struct StreamConnection {
    /// Connection configuration.
    pub config: StreamConfig,
    /// Channel to send outbound messages.
    outbound_tx: Option<mpsc::Sender<String>>,
    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Task join handle.
    task: Option<tokio::task::JoinHandle<()>>,
}

impl StreamConnection {
    /// Create a new (not yet started) connection.
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            outbound_tx: None,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Start the connection task. Text frames are forwarded to `on_text`.
    pub fn start(&mut self, on_text: OnMessageCallback) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(64);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            connection_loop(config, on_text, outbound_rx, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.outbound_tx = Some(outbound_tx);
        self.task = Some(task);
    }

    /// Send a text message on this connection.
    pub async fn send(&self, msg: String) -> anyhow::Result<()> {
        if let Some(tx) = &self.outbound_tx {
            tx.send(msg).await?;
        }
        Ok(())
    }

    /// Stop the connection and wait for the task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Main connection loop — connects, subscribes, reads, reconnects.
async fn connection_loop(
    config: StreamConfig,
    on_text: OnMessageCallback,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = Duration::from_millis(100);
    let max_backoff = Duration::from_secs(30);
    let label = config.label.clone();

    loop {
        // Check shutdown before connecting
        if *shutdown_rx.borrow() {
            info!("[{label}] shutdown requested");
            return;
        }

        info!("[{label}] connecting to {}", config.url);

        let ws_stream = match tokio_tungstenite::connect_async(config.url.as_str()).await {
            Ok((s, _)) => {
                backoff = Duration::from_millis(100); // reset backoff on success
                info!("[{label}] connected");
                s
            }
            Err(e) => {
                error!("[{label}] connection failed: {e}, retrying in {backoff:?}");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown_rx.changed() => return,
                }
                backoff = (backoff * 2).min(max_backoff);
                continue;
            }
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();

        // (Re)subscribe — one frame per channel.
        let mut subscribed = true;
        for sub_msg in &config.subscribe_msgs {
            debug!("[{label}] subscribing: {sub_msg}");
            if let Err(e) = ws_write.send(Message::Text(sub_msg.clone().into())).await {
                error!("[{label}] subscribe send failed: {e}");
                subscribed = false;
                break;
            }
        }
        if !subscribed {
            continue;
        }

        // Set up keep-alive ping timer
        let ping_interval = config.ping_interval.map(tokio::time::interval);

        // Pin the interval for use in select!
        tokio::pin! {
            let ping_tick = async {
                if let Some(mut interval) = ping_interval {
                    loop {
                        interval.tick().await;
                    }
                } else {
                    // No pinging — wait forever
                    std::future::pending::<()>().await
                }
            };
        }

        // Main read/write loop
        loop {
            tokio::select! {
                // Shutdown signal
                _ = shutdown_rx.changed() => {
                    info!("[{label}] shutdown signal received");
                    let _ = ws_write.close().await;
                    return;
                }

                // Incoming message
                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            on_text(&text);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("[{label}] received close frame");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("[{label}] read error: {e}");
                            break;
                        }
                        None => {
                            warn!("[{label}] stream ended");
                            break;
                        }
                        _ => {} // Binary, Pong, Frame — ignore
                    }
                }

                // Outbound message from user
                Some(msg) = outbound_rx.recv() => {
                    if let Err(e) = ws_write.send(Message::Text(msg.into())).await {
                        error!("[{label}] send error: {e}");
                        break;
                    }
                }

                // Ping timer
                _ = &mut ping_tick => {
                    if let Err(e) = ws_write.send(Message::Ping(vec![].into())).await {
                        error!("[{label}] ping send error: {e}");
                        break;
                    }
                }
            }
        }

        // Disconnected — will reconnect at the top of the outer loop
        warn!("[{label}] disconnected, reconnecting in {backoff:?}");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {},
            _ = shutdown_rx.changed() => return,
        }
        backoff = (backoff * 2).min(max_backoff);
    }
}
