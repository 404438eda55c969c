//! In-memory local store for testing and headless embedding.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use super::LocalStore;

/// Error type for the in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MemoryStoreError {
    /// Write rejected (scripted failure).
    #[error("store write rejected")]
    WriteRejected,
}

/// In-memory [`LocalStore`] backed by a map.
///
/// Supports scripted write failures so callers can exercise their
/// storage error paths.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    cells: Mutex<HashMap<String, Value>>,
    fail_writes: Mutex<bool>,
}

impl MemoryLocalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.cells.lock().is_empty()
    }
}

impl LocalStore for MemoryLocalStore {
    type Error = MemoryStoreError;

    fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        Ok(self.cells.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), Self::Error> {
        if *self.fail_writes.lock() {
            return Err(MemoryStoreError::WriteRejected);
        }
        self.cells.lock().insert(key.to_string(), value.clone());
        Ok(())
    }
}
