//! Configuration parsing for the trade collector.
//!
//! All modules read their settings from a single JSON config file. The
//! top-level structure contains logging metadata, a `sources` array where
//! each entry describes one market-data source, and the persistence boundary
//! settings.
//!
//! # Example config
//!
//! ```json
//! {
//!   "collector": { "module_name": "ctc", "log_path": "/tmp/log" },
//!   "sources": [
//!     { "exchange": "bitstamp" },
//!     { "exchange": "binance", "symbols": ["BTCUSDT", "ETHUSDT"] },
//!     { "exchange": "hitbtc" }
//!   ],
//!   "store": { "url": "redis://localhost:6379", "script_path": "redis.lua" }
//! }
//! ```

use serde::Deserialize;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    pub collector: Option<ModuleMeta>,

    /// Array of source configs — one per market-data source.
    pub sources: Vec<SourceConfig>,

    /// Persistence boundary settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// A single market-data source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source identifier: `"bitstamp"`, `"binance"`, `"hitbtc"`.
    pub exchange: String,

    /// WebSocket endpoint override (defaults to the source's public URL).
    pub ws_url: Option<String>,

    /// Discovery REST endpoint override.
    pub rest_url: Option<String>,

    /// Optional native-symbol filter. When present, only these symbols are
    /// subscribed; otherwise every discovered symbol is.
    pub symbols: Option<Vec<String>>,
}

impl SourceConfig {
    /// Returns `true` if `native` passes this source's symbol filter.
    pub fn accepts_symbol(&self, native: &str) -> bool {
        match &self.symbols {
            Some(list) => list.iter().any(|s| s == native),
            None => true,
        }
    }
}

/// Persistence boundary configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL.
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Optional Lua script file. When set, batches are handed to the script
    /// via `EVALSHA`; when unset, records are appended to `list_key`.
    pub script_path: Option<String>,

    /// List key used in scriptless mode.
    #[serde(default = "default_list_key")]
    pub list_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            script_path: None,
            list_key: default_list_key(),
        }
    }
}

fn default_store_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_list_key() -> String {
    "trades".to_string()
}

impl AppConfig {
    /// Returns the module name from the top-level config.
    pub fn module_name(&self) -> String {
        self.collector
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| "ctc".to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.collector.as_ref().and_then(|m| m.log_path.clone())
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
