//! Per-connection mapping from a source's native symbol to a display pair
//! name.
//!
//! Built once from a discovery call when a connection is established and
//! consulted when tagging every subsequent trade with its `market` string.
//! Adapters whose connection can drop rebuild the dictionary on reconnect —
//! the tradable-symbol list may have changed in the meantime.

use ahash::AHashMap;

/// Native symbol → display pair name (e.g. `BTCUSD` → `BTC/USD`).
#[derive(Debug, Clone, Default)]
pub struct SymbolDictionary {
    names: AHashMap<String, String>,
}

impl SymbolDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native symbol with its display name.
    pub fn insert(&mut self, native: &str, display: &str) {
        self.names.insert(native.to_string(), display.to_string());
    }

    /// Display name for a native symbol.
    ///
    /// Returns the native symbol unchanged if no mapping exists, so a
    /// `market` tag is always populated even for symbols that appeared after
    /// discovery.
    pub fn display_name<'a>(&'a self, native: &'a str) -> &'a str {
        self.names.get(native).map(|s| s.as_str()).unwrap_or(native)
    }

    /// Number of mappings currently stored.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no mappings are stored.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over the registered native symbols.
    pub fn native_symbols(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(|s| s.as_str())
    }
}
