//! # ctc-store
//!
//! Redis-backed implementation of the persistence boundary
//! ([`TradeStore`]).
//!
//! Two modes, selected by config:
//!
//! - **Script mode** (`script_path` set): the Lua file is loaded once via
//!   `SCRIPT LOAD` at connect time; every flush becomes
//!   `EVALSHA <sha> 0 <json-batch> <flush-ts>`. What the script does with
//!   the batch is the store's business, not the collector's.
//! - **List mode** (default): every record is `RPUSH`ed to `list_key` as one
//!   JSON object, pipelined per batch.

use anyhow::Result;
use async_trait::async_trait;
use ctc_core::config::StoreConfig;
use ctc_core::error::CollectorError;
use ctc_core::flush::TradeStore;
use ctc_core::types::TradeRecord;
use tracing::info;

enum StoreMode {
    Script { sha: String },
    List { key: String },
}

/// Redis persistence boundary.
pub struct RedisStore {
    conn: redis::aio::MultiplexedConnection,
    mode: StoreMode,
}

impl RedisStore {
    /// Connect, health-check, and (in script mode) load the Lua script.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("connected to Redis at {}", config.url);

        let mode = match &config.script_path {
            Some(path) => {
                let script = std::fs::read_to_string(path)
                    .map_err(|e| CollectorError::Store(format!("read {path}: {e}")))?;
                let sha: String = redis::cmd("SCRIPT")
                    .arg("LOAD")
                    .arg(script)
                    .query_async(&mut conn)
                    .await?;
                info!("trade-processing script loaded into Redis (sha {sha})");
                StoreMode::Script { sha }
            }
            None => StoreMode::List { key: config.list_key.clone() },
        };

        Ok(Self { conn, mode })
    }
}

/// Serialize a batch to the wire form handed to the script.
fn batch_payload(batch: &[TradeRecord]) -> Result<String> {
    Ok(serde_json::to_string(batch)?)
}

#[async_trait]
impl TradeStore for RedisStore {
    async fn process_trades(&self, batch: &[TradeRecord], flush_ts_ms: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        match &self.mode {
            StoreMode::Script { sha } => {
                let _: redis::Value = redis::cmd("EVALSHA")
                    .arg(sha)
                    .arg(0)
                    .arg(batch_payload(batch)?)
                    .arg(flush_ts_ms)
                    .query_async(&mut conn)
                    .await?;
            }
            StoreMode::List { key } => {
                let mut pipe = redis::pipe();
                for record in batch {
                    pipe.rpush(key, serde_json::to_string(record)?);
                }
                let _: () = pipe.query_async(&mut conn).await?;
            }
        }
        Ok(())
    }
}
