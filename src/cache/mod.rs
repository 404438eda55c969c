//! Browser-scoped registry of bins the user has created.
//!
//! The cache persists through an injected [`LocalStore`] capability
//! (durable key/value storage scoped to the browser) and prunes expired
//! entries on every read. Entries are written inside an envelope
//! stamped with [`ENGINE_SCHEMA_VERSION`]; corrupt, absent, or
//! foreign-version storage is never fatal: it resets to an empty list.

pub mod memory;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BinId, BinSummary};
use crate::ENGINE_SCHEMA_VERSION;

pub use memory::{MemoryLocalStore, MemoryStoreError};

/// Default storage namespace, matching the original browser key.
pub const DEFAULT_NAMESPACE: &str = "geobin";

/// Trait for durable key/value storage scoped to one browser.
///
/// Implementations must tolerate first-run absence (`get` returns
/// `None`). Writes are synchronous: when `set` returns, the value is
/// flushed.
pub trait LocalStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>, Self::Error>;

    /// Store `value` under `key`, flushing before returning.
    fn set(&self, key: &str, value: &Value) -> Result<(), Self::Error>;
}

impl<S: LocalStore> LocalStore for std::sync::Arc<S> {
    type Error = S::Error;

    fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), Self::Error> {
        (**self).set(key, value)
    }
}

/// Persisted cache shape: the bin list stamped with the schema version
/// that wrote it.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    version: String,
    bins: Vec<BinSummary>,
}

/// Error type for cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The underlying local store rejected a write.
    #[error("local store error: {0}")]
    Store(String),
}

/// Registry of bins the user has created, pruned on every access.
pub struct BinCache<S: LocalStore> {
    store: S,
    namespace: String,
}

impl<S: LocalStore> BinCache<S> {
    /// Create a cache over the given store under [`DEFAULT_NAMESPACE`].
    pub fn new(store: S) -> Self {
        Self::with_namespace(store, DEFAULT_NAMESPACE)
    }

    /// Create a cache under an explicit namespace key.
    pub fn with_namespace(store: S, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Record a freshly created bin, flushing immediately so a crash
    /// right after creation cannot lose it.
    pub fn record(&self, summary: BinSummary) -> Result<(), CacheError> {
        let mut bins = self.read();
        bins.push(summary);
        self.write(&bins)
    }

    /// Surviving bins, oldest first, after pruning expired entries.
    ///
    /// The pruned list is persisted before returning, so a second call
    /// sees the same survivors (pruning is idempotent).
    pub fn list(&self) -> Vec<BinSummary> {
        self.list_at(Utc::now().timestamp())
    }

    /// [`list`](Self::list) with an explicit clock, for deterministic tests.
    pub fn list_at(&self, now: i64) -> Vec<BinSummary> {
        let bins = self.read();
        let survivors: Vec<BinSummary> = bins
            .into_iter()
            .filter(|bin| !bin.is_expired(now))
            .collect();
        if let Err(e) = self.write(&survivors) {
            tracing::warn!(error = %e, "failed to persist pruned bin list");
        }
        survivors
    }

    /// Ids of the surviving bins, for request-count lookups.
    pub fn ids(&self) -> Vec<BinId> {
        self.list().into_iter().map(|bin| bin.id).collect()
    }

    /// Remove every entry and persist the empty state.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.write(&[])
    }

    fn read(&self) -> Vec<BinSummary> {
        let value = match self.store.get(&self.namespace) {
            Ok(Some(value)) => value,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable bin cache, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_value::<CacheEnvelope>(value.clone()) {
            Ok(envelope) if envelope.version == ENGINE_SCHEMA_VERSION => envelope.bins,
            Ok(envelope) => {
                tracing::warn!(
                    found = %envelope.version,
                    expected = %ENGINE_SCHEMA_VERSION,
                    "bin cache written under another schema version, resetting to empty"
                );
                Vec::new()
            }
            // Caches written before the envelope stored the bare list.
            Err(_) => match serde_json::from_value(value) {
                Ok(bins) => bins,
                Err(e) => {
                    tracing::warn!(error = %e, "corrupt bin cache, resetting to empty");
                    Vec::new()
                }
            },
        }
    }

    fn write(&self, bins: &[BinSummary]) -> Result<(), CacheError> {
        let envelope = CacheEnvelope {
            version: ENGINE_SCHEMA_VERSION.to_string(),
            bins: bins.to_vec(),
        };
        let value =
            serde_json::to_value(&envelope).map_err(|e| CacheError::Store(e.to_string()))?;
        self.store
            .set(&self.namespace, &value)
            .map_err(|e| CacheError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(id: &str, created: i64, expires: i64) -> BinSummary {
        BinSummary::new(BinId::from(id), created, expires).unwrap()
    }

    #[test]
    fn test_record_then_list() {
        let cache = BinCache::new(MemoryLocalStore::new());
        cache.record(summary("a", 0, 1000)).unwrap();
        cache.record(summary("b", 10, 2000)).unwrap();
        let bins = cache.list_at(500);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].id.as_str(), "a");
        assert_eq!(bins[1].id.as_str(), "b");
    }

    #[test]
    fn test_expired_entry_pruned_and_stays_pruned() {
        let cache = BinCache::new(MemoryLocalStore::new());
        cache.record(summary("old", 0, 100)).unwrap();
        // expires_at is 10 seconds in the past
        assert!(cache.list_at(110).is_empty());
        // idempotent: it does not come back
        assert!(cache.list_at(110).is_empty());
    }

    #[test]
    fn test_pruning_preserves_survivor_order() {
        let cache = BinCache::new(MemoryLocalStore::new());
        cache.record(summary("a", 0, 50)).unwrap();
        cache.record(summary("b", 0, 500)).unwrap();
        cache.record(summary("c", 0, 60)).unwrap();
        cache.record(summary("d", 0, 900)).unwrap();
        let bins = cache.list_at(100);
        let ids: Vec<&str> = bins.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
    }

    #[test]
    fn test_boundary_is_strict() {
        let cache = BinCache::new(MemoryLocalStore::new());
        cache.record(summary("edge", 0, 100)).unwrap();
        // expires exactly now: gone
        assert!(cache.list_at(100).is_empty());

        let cache = BinCache::new(MemoryLocalStore::new());
        cache.record(summary("edge", 0, 101)).unwrap();
        // one full second left: survives
        assert_eq!(cache.list_at(100).len(), 1);
    }

    #[test]
    fn test_corrupt_cache_resets_to_empty() {
        let store = MemoryLocalStore::new();
        store
            .set(DEFAULT_NAMESPACE, &json!("definitely not a bin list"))
            .unwrap();
        let cache = BinCache::new(store);
        assert!(cache.list_at(0).is_empty());
        // and recording afterwards works normally
        cache.record(summary("fresh", 0, 100)).unwrap();
        assert_eq!(cache.list_at(0).len(), 1);
    }

    #[test]
    fn test_clear_persists_empty_state() {
        let cache = BinCache::new(MemoryLocalStore::new());
        cache.record(summary("a", 0, 1000)).unwrap();
        cache.clear().unwrap();
        assert!(cache.list_at(0).is_empty());
    }

    #[test]
    fn test_failing_store_surfaces_on_record() {
        let store = MemoryLocalStore::new();
        store.set_fail_writes(true);
        let cache = BinCache::new(store);
        assert!(cache.record(summary("a", 0, 1000)).is_err());
    }

    #[test]
    fn test_persisted_shape_carries_schema_version() {
        let store = std::sync::Arc::new(MemoryLocalStore::new());
        let cache = BinCache::new(store.clone());
        cache.record(summary("a", 0, 1000)).unwrap();

        let value = store.get(DEFAULT_NAMESPACE).unwrap().unwrap();
        assert_eq!(value["version"], ENGINE_SCHEMA_VERSION);
        assert_eq!(value["bins"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_pre_envelope_bare_list_still_readable() {
        let store = MemoryLocalStore::new();
        store
            .set(
                DEFAULT_NAMESPACE,
                &json!([{"id": "old", "created_at": 0, "expires_at": 1000}]),
            )
            .unwrap();
        let cache = BinCache::new(store);
        let bins = cache.list_at(0);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].id.as_str(), "old");
    }

    #[test]
    fn test_foreign_schema_version_resets_to_empty() {
        let store = MemoryLocalStore::new();
        store
            .set(
                DEFAULT_NAMESPACE,
                &json!({
                    "version": "999.0.0",
                    "bins": [{"id": "a", "created_at": 0, "expires_at": 1000}]
                }),
            )
            .unwrap();
        let cache = BinCache::new(store);
        assert!(cache.list_at(0).is_empty());
    }

    #[test]
    fn test_ids_lists_survivors() {
        let cache = BinCache::with_namespace(MemoryLocalStore::new(), "custom");
        cache.record(summary("a", 0, 10_000_000_000)).unwrap();
        let ids = cache.ids();
        assert_eq!(ids, vec![BinId::from("a")]);
    }
}
