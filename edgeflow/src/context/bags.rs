//! Thread-safe attribute bag for session state.

use parking_lot::RwLock;
use std::collections::HashMap;

/// A thread-safe key/value bag for request-scoped state.
///
/// Filters on any stage may read and write attributes; the bag is shared,
/// never copied, for the lifetime of a pipeline run.
#[derive(Debug, Default)]
pub struct AttributeBag {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl AttributeBag {
    /// Creates a new empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Gets a string value from the bag.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.data
            .read()
            .get(key)
            .and_then(|v| v.as_str().map(String::from))
    }

    /// Gets a boolean value, treating a missing key as false.
    #[must_use]
    pub fn get_flag(&self, key: &str) -> bool {
        self.data
            .read()
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Sets a value, returning the previous one.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.data.write().insert(key.into(), value)
    }

    /// Sets a value only if the key is absent.
    ///
    /// Returns false if the key was already present.
    pub fn set_if_absent(&self, key: impl Into<String>, value: serde_json::Value) -> bool {
        let key = key.into();
        let mut data = self.data.write();
        if data.contains_key(&key) {
            return false;
        }
        data.insert(key, value);
        true
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().remove(key)
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.data.read().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}
