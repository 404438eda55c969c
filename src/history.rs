//! In-memory ordered request history for one bin.
//!
//! Arrival order is the only order: late out-of-order deliveries append
//! at the end, never resort. Duplicate timestamps are ignored, which
//! makes at-least-once push delivery safe to absorb.

use std::collections::HashSet;

use crate::types::Request;

/// Outcome of a single append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// The request was new and is now the last entry.
    Appended,
    /// A request with this timestamp was already present; nothing changed.
    DuplicateIgnored,
}

/// Error type for history operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HistoryError {
    /// `load` may only run once per session.
    #[error("history already loaded ({existing} requests present)")]
    AlreadyLoaded {
        /// How many requests the store already held.
        existing: usize,
    },
}

/// Ordered collection of requests received by one bin.
///
/// Uniqueness is by `timestamp`; membership checks go through an
/// auxiliary set so appends stay O(1) amortized.
#[derive(Debug, Default)]
pub struct HistoryStore {
    requests: Vec<Request>,
    seen: HashSet<i64>,
    loaded: bool,
}

impl HistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// One-time bulk initialization, in arrival order.
    ///
    /// Duplicate timestamps inside the initial payload are dropped the
    /// same way live duplicates are. A second call fails and leaves the
    /// store untouched.
    pub fn load(&mut self, initial: Vec<Request>) -> Result<(), HistoryError> {
        if self.loaded {
            return Err(HistoryError::AlreadyLoaded {
                existing: self.requests.len(),
            });
        }
        self.loaded = true;
        for request in initial {
            self.append(request);
        }
        Ok(())
    }

    /// Append one request, ignoring it if its timestamp is already known.
    pub fn append(&mut self, request: Request) -> AppendResult {
        if !self.seen.insert(request.timestamp) {
            return AppendResult::DuplicateIgnored;
        }
        self.requests.push(request);
        AppendResult::Appended
    }

    /// All requests, in arrival order.
    pub fn all(&self) -> &[Request] {
        &self.requests
    }

    /// Requests in display order (most recent arrival first).
    pub fn newest_first(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter().rev()
    }

    /// Whether a request with this timestamp is present.
    pub fn contains(&self, timestamp: i64) -> bool {
        self.seen.contains(&timestamp)
    }

    /// Number of distinct requests held.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the bin has seen any request at all.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
