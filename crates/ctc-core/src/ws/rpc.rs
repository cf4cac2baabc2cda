//! Request/response correlation over a persistent WebSocket.
//!
//! Some sources (HitBTC) speak a JSON-RPC-style protocol on one socket:
//! outbound `{method, params, id}` requests, inbound `{id, result}` /
//! `{id, error}` responses, and unsolicited `{method, params}` push
//! notifications. [`RpcClient`] multiplexes all of that:
//!
//! - `request()` correlates a response to its caller via a pending-request
//!   registry keyed by a monotonically increasing id.
//! - `subscribe()` registers push handlers per method, invoked in
//!   registration order.
//! - A background task owns the connection and loops
//!   `Connecting → Open → Closed → Connecting` for the process lifetime,
//!   with a fixed reconnect delay (no backoff, unbounded retries).
//!
//! On every transition to Open the caller-supplied `on_open` routine runs,
//! so the owning adapter can rediscover symbols and resubscribe. On every
//! transition to Closed each outstanding request fails with
//! [`RpcError::Disconnected`] and the registry is left empty.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ahash::AHashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::RpcError;

/// Delay between a disconnect and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// How long a `request()` waits for its response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback invoked for every inbound push notification matching its method.
///
/// Handlers must not block; they append and return.
pub type PushHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Initialization routine invoked on every transition to Open.
pub type OnOpenCallback =
    Arc<dyn Fn(RpcClient) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

type PendingSender = oneshot::Sender<Result<Value, RpcError>>;

/// Shared client state, owned jointly by callers and the connection task.
struct RpcShared {
    url: String,
    /// Request id allocator. Ids are unique for the client lifetime.
    next_id: AtomicU64,
    /// `Some(sender)` iff the connection is Open.
    conn: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Pending request registry: id → response slot.
    pending: Mutex<AHashMap<u64, PendingSender>>,
    /// Push dispatch table: method → handlers in registration order.
    handlers: Mutex<AHashMap<String, Vec<PushHandler>>>,
    /// Connection task handle, for `stop()`.
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RpcShared {
    /// Transition to Open.
    fn open(&self, tx: mpsc::UnboundedSender<String>) {
        *self.conn.lock().unwrap() = Some(tx);
    }

    /// Transition to Closed: drop the sender and reject every pending
    /// request. The registry is empty afterwards.
    fn close(&self) {
        *self.conn.lock().unwrap() = None;
        let rejected: Vec<PendingSender> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().map(|(_, tx)| tx).collect()
        };
        if !rejected.is_empty() {
            warn!("rejecting {} pending request(s) on disconnect", rejected.len());
        }
        for tx in rejected {
            let _ = tx.send(Err(RpcError::Disconnected));
        }
    }
}

/// Handle to a correlation-client connection. Cheap to clone; all clones
/// share one socket.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<RpcShared>,
}

impl RpcClient {
    /// Create a client for `url`. No connection is opened until
    /// [`start`](RpcClient::start).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RpcShared {
                url: url.into(),
                next_id: AtomicU64::new(0),
                conn: Mutex::new(None),
                pending: Mutex::new(AHashMap::new()),
                handlers: Mutex::new(AHashMap::new()),
                task: Mutex::new(None),
            }),
        }
    }

    /// Spawn the connection task. `on_open` runs on every (re)connect with a
    /// clone of this client — issue discovery and subscription requests from
    /// there so they are repeated after every reconnect.
    pub fn start(&self, on_open: OnOpenCallback) {
        let inner = self.inner.clone();
        let task = tokio::spawn(connection_loop(inner, on_open));
        *self.inner.task.lock().unwrap() = Some(task);
    }

    /// Abort the connection task and reject anything still pending.
    pub fn stop(&self) {
        if let Some(task) = self.inner.task.lock().unwrap().take() {
            task.abort();
        }
        self.inner.close();
    }

    /// Register `handler` for inbound push notifications with `method`.
    ///
    /// Multiple handlers per method are permitted; all are invoked, in
    /// registration order.
    pub fn subscribe(&self, method: &str, handler: PushHandler) {
        self.inner
            .handlers
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push(handler);
    }

    /// Send `{method, params, id}` and await the matching response.
    ///
    /// Fails immediately with [`RpcError::NotConnected`] unless the
    /// connection is Open. Fails with [`RpcError::Timeout`] after
    /// [`REQUEST_TIMEOUT`], at which point the pending entry is removed so a
    /// late response is silently ignored.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let tx = self
            .inner
            .conn
            .lock()
            .unwrap()
            .clone()
            .ok_or(RpcError::NotConnected)?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (resp_tx, resp_rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(id, resp_tx);

        let frame = serde_json::json!({"method": method, "params": params, "id": id}).to_string();
        debug!("> {frame}");
        if tx.send(frame).is_err() {
            // Connection dropped between the state check and the send.
            self.inner.pending.lock().unwrap().remove(&id);
            return Err(RpcError::NotConnected);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, resp_rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without a value: the connection went away.
            Ok(Err(_)) => Err(RpcError::Disconnected),
            Err(_) => {
                self.inner.pending.lock().unwrap().remove(&id);
                Err(RpcError::Timeout)
            }
        }
    }
}

/// Dispatch one inbound text frame.
///
/// Anything that is neither a recognized response nor a registered push
/// notification is logged and discarded; nothing here can terminate the
/// connection.
fn handle_frame(inner: &RpcShared, text: &str) {
    debug!("< {text}");
    let msg: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!("discarding unparseable frame: {e}");
            return;
        }
    };

    if let Some(id) = msg.get("id").and_then(Value::as_u64) {
        let has_result = msg.get("result").is_some();
        let has_error = msg.get("error").is_some();
        if !has_result && !has_error {
            // Leave the pending entry in place; the request resolves via its
            // timeout.
            warn!("discarding response {id} with neither result nor error");
            return;
        }
        let Some(tx) = inner.pending.lock().unwrap().remove(&id) else {
            debug!("discarding response for unknown request id {id}");
            return;
        };
        let outcome = if has_result {
            Ok(msg.get("result").cloned().unwrap_or(Value::Null))
        } else {
            Err(RpcError::Remote(msg.get("error").cloned().unwrap_or(Value::Null)))
        };
        let _ = tx.send(outcome);
        return;
    }

    match (msg.get("method").and_then(Value::as_str), msg.get("params")) {
        (Some(method), Some(params)) => {
            // Snapshot the handler list so a handler can subscribe without
            // deadlocking.
            let handlers: Vec<PushHandler> = inner
                .handlers
                .lock()
                .unwrap()
                .get(method)
                .cloned()
                .unwrap_or_default();
            if handlers.is_empty() {
                debug!("no handler registered for push method '{method}'");
            }
            for handler in &handlers {
                handler(params);
            }
        }
        _ => warn!("discarding frame with no id and no method"),
    }
}

/// Connection task: `Connecting → Open → Closed → Connecting`, forever.
async fn connection_loop(inner: Arc<RpcShared>, on_open: OnOpenCallback) {
    loop {
        info!("connecting to {}", inner.url);

        let ws_stream = match tokio_tungstenite::connect_async(inner.url.as_str()).await {
            Ok((s, _)) => s,
            Err(e) => {
                warn!("connection failed: {e}, retrying in {RECONNECT_DELAY:?}");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        info!("connected");

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        inner.open(out_tx);

        // Rediscover and resubscribe. Runs as its own task so its requests
        // can be answered by the read loop below.
        tokio::spawn(on_open(RpcClient { inner: inner.clone() }));

        loop {
            tokio::select! {
                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => handle_frame(&inner, &text),
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("received close frame");
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("read error: {e}");
                            break;
                        }
                        None => {
                            warn!("stream ended");
                            break;
                        }
                        _ => {} // Binary, Pong, Frame — ignore
                    }
                }

                Some(frame) = out_rx.recv() => {
                    if let Err(e) = ws_write.send(Message::Text(frame.into())).await {
                        warn!("send error: {e}");
                        break;
                    }
                }
            }
        }

        inner.close();
        warn!("disconnected, reconnecting in {RECONNECT_DELAY:?}");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Client with a fake Open connection; returns the outbound frame
    /// receiver so tests can inspect what was sent.
    fn open_client() -> (RpcClient, mpsc::UnboundedReceiver<String>) {
        let client = RpcClient::new("wss://example.invalid/ws");
        let (tx, rx) = mpsc::unbounded_channel();
        client.inner.open(tx);
        (client, rx)
    }

    fn sent_id(frame: &str) -> u64 {
        let v: Value = serde_json::from_str(frame).unwrap();
        v["id"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn request_while_disconnected_fails_immediately() {
        let client = RpcClient::new("wss://example.invalid/ws");
        let err = client.request("getSymbols", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, RpcError::NotConnected));
        assert!(client.inner.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn response_with_result_resolves_request() {
        let (client, mut out_rx) = open_client();
        let requester = {
            let client = client.clone();
            tokio::spawn(async move { client.request("getSymbols", serde_json::json!({})).await })
        };

        tokio::task::yield_now().await;
        let frame = out_rx.recv().await.unwrap();
        let id = sent_id(&frame);
        handle_frame(&client.inner, &format!(r#"{{"id":{id},"result":["BTCUSD"]}}"#));

        let result = requester.await.unwrap().unwrap();
        assert_eq!(result, serde_json::json!(["BTCUSD"]));
        assert!(client.inner.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn response_with_error_rejects_request() {
        let (client, mut out_rx) = open_client();
        let requester = {
            let client = client.clone();
            tokio::spawn(async move {
                client.request("subscribeTrades", serde_json::json!({"symbol": "NOPE"})).await
            })
        };

        tokio::task::yield_now().await;
        let id = sent_id(&out_rx.recv().await.unwrap());
        handle_frame(
            &client.inner,
            &format!(r#"{{"id":{id},"error":{{"code":2001,"message":"symbol not found"}}}}"#),
        );

        match requester.await.unwrap().unwrap_err() {
            RpcError::Remote(e) => assert_eq!(e["code"], 2001),
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_pending_and_late_response_is_discarded() {
        let (client, mut out_rx) = open_client();
        let requester = {
            let client = client.clone();
            tokio::spawn(async move { client.request("getSymbols", serde_json::json!({})).await })
        };

        tokio::task::yield_now().await;
        let id = sent_id(&out_rx.recv().await.unwrap());

        // No response; the paused clock auto-advances past the timeout.
        let err = requester.await.unwrap().unwrap_err();
        assert!(matches!(err, RpcError::Timeout));
        assert!(client.inner.pending.lock().unwrap().is_empty());

        // A response arriving after the timeout is dropped without effect.
        handle_frame(&client.inner, &format!(r#"{{"id":{id},"result":[]}}"#));
        assert!(client.inner.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disconnect_rejects_every_pending_request() {
        let (client, mut out_rx) = open_client();
        let mut requesters = Vec::new();
        for _ in 0..3 {
            let client = client.clone();
            requesters.push(tokio::spawn(async move {
                client.request("subscribeTrades", serde_json::json!({})).await
            }));
        }

        tokio::task::yield_now().await;
        for _ in 0..3 {
            out_rx.recv().await.unwrap();
        }
        assert_eq!(client.inner.pending.lock().unwrap().len(), 3);

        client.inner.close();
        for requester in requesters {
            let err = requester.await.unwrap().unwrap_err();
            assert!(matches!(err, RpcError::Disconnected));
        }
        assert!(client.inner.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_handlers_run_in_registration_order() {
        let (client, _out_rx) = open_client();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            client.subscribe(
                "updateTrades",
                Arc::new(move |params: &Value| {
                    seen.lock().unwrap().push((tag, params["symbol"].clone()));
                }),
            );
        }

        handle_frame(
            &client.inner,
            r#"{"method":"updateTrades","params":{"symbol":"BTCUSD","data":[]}}"#,
        );
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", serde_json::json!("BTCUSD")), ("second", serde_json::json!("BTCUSD"))]
        );

        // Unregistered method: discarded, handlers untouched.
        handle_frame(&client.inner, r#"{"method":"snapshotOrderbook","params":{}}"#);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn garbage_frames_do_not_disturb_pending_requests() {
        let (client, mut out_rx) = open_client();
        let requester = {
            let client = client.clone();
            tokio::spawn(async move { client.request("getSymbols", serde_json::json!({})).await })
        };

        tokio::task::yield_now().await;
        let id = sent_id(&out_rx.recv().await.unwrap());

        handle_frame(&client.inner, "not json at all");
        handle_frame(&client.inner, r#"{"jsonrpc":"2.0"}"#);
        // A response with the right id but neither result nor error must not
        // consume the pending entry.
        handle_frame(&client.inner, &format!(r#"{{"id":{id}}}"#));
        assert_eq!(client.inner.pending.lock().unwrap().len(), 1);

        handle_frame(&client.inner, &format!(r#"{{"id":{id},"result":[]}}"#));
        assert!(requester.await.unwrap().is_ok());
    }
}
