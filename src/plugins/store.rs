//! Per-plugin persistent key/value storage.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Key/value store handed to plugin hooks.
///
/// Values are JSON so plugins can keep structured state between slots.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: serde_json::Value);

    /// Removes `key`; returns the previous value.
    fn remove(&self, key: &str) -> Option<serde_json::Value>;
}

/// In-memory store.
#[derive(Default, Debug)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) {
        self.values.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.values.lock().remove(key)
    }
}
