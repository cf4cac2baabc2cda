//! Shared trade buffer — many concurrent producers, one draining consumer.
//!
//! Backed by an unbounded mpsc channel: adapters hold clonable
//! [`TradeWriter`]s and the flush loop holds the single [`TradeDrain`]. A
//! batch is formed by suspending until at least one record is available and
//! then taking everything already buffered, so the detach point is exact:
//! every record sent before it is in that batch once, every record sent
//! during an in-flight flush lands in the next batch, and within one
//! producer's stream arrival order is preserved.

use tokio::sync::mpsc;
use tracing::warn;

use crate::types::TradeRecord;

/// Create a connected writer/drain pair.
pub fn trade_buffer() -> (TradeWriter, TradeDrain) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TradeWriter { tx }, TradeDrain { rx })
}

/// Producer handle, cloned into every adapter context.
#[derive(Clone)]
pub struct TradeWriter {
    tx: mpsc::UnboundedSender<TradeRecord>,
}

impl TradeWriter {
    /// Append one record. Never blocks.
    ///
    /// A send can only fail after the drain has been dropped, i.e. during
    /// shutdown; the record is dropped with a warning.
    pub fn push(&self, record: TradeRecord) {
        if self.tx.send(record).is_err() {
            warn!("trade buffer closed, dropping record");
        }
    }
}

/// Consumer handle, owned by the flush loop.
pub struct TradeDrain {
    rx: mpsc::UnboundedReceiver<TradeRecord>,
}

impl TradeDrain {
    /// Wait until at least one record is buffered, then detach everything
    /// buffered so far as one batch.
    ///
    /// Returns `None` once all writers are gone and the buffer is empty.
    pub async fn next_batch(&mut self) -> Option<Vec<TradeRecord>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];
        while let Ok(record) = self.rx.try_recv() {
            batch.push(record);
        }
        Some(batch)
    }

    /// Detach whatever is buffered right now without waiting.
    ///
    /// Returns `None` when the buffer is empty. Used for the final drain at
    /// shutdown.
    pub fn drain_now(&mut self) -> Option<Vec<TradeRecord>> {
        let mut batch = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            batch.push(record);
        }
        if batch.is_empty() { None } else { Some(batch) }
    }
}
