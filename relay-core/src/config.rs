//! # Relay Configuration
//!
//! A minimal string key/value store, mirroring `app.set()` / `app.get()`.
//! Keys are dotted (`http.port`, `queue.retry_delay_secs`). Values are
//! strings; typed access goes through a [`RelayConfigSnapshot`].
//!
//! ## Setting and reading values
//! ```rust
//! use relay_core::RelayConfig;
//! let mut config = RelayConfig::new();
//!
//! config.set("http.port", "3040");
//!
//! assert_eq!(config.get("http.port"), Some("3040"));
//! assert_eq!(config.snapshot().get_u64("http.port"), Some(3040));
//! ```
//!
//! ## Environment overrides
//! [`RelayConfig::load_env`] copies every variable carrying the given
//! prefix into the store, lower-casing it and turning `__` into `.`:
//!
//! ```bash
//! export RELAY__QUEUE__RETRY_DELAY_SECS=30   # queue.retry_delay_secs
//! ```

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct RelayConfig {
    values: HashMap<String, String>,
}

impl RelayConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set a key only if it has no value yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Check whether a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy prefixed environment variables into the store.
    ///
    /// `RELAY__HTTP__PORT=8080` with prefix `RELAY__` becomes `http.port`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    /// Same as [`load_env`](Self::load_env) over an explicit variable list.
    pub fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if !normalized.is_empty() {
                    self.set(normalized, value);
                }
            }
        }
    }

    pub fn snapshot(&self) -> RelayConfigSnapshot {
        RelayConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelayConfigSnapshot {
    map: HashMap<String, String>,
}

impl RelayConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }
}
