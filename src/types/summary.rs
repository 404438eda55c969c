//! Cached summaries of bins the user has created.

use serde::{Deserialize, Serialize};

use super::request::BinId;

/// Error constructing a [`BinSummary`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum SummaryError {
    /// Expiry must be strictly after creation.
    #[error("bin {id} expires at {expires_at}, before its creation at {created_at}")]
    ExpiryBeforeCreation {
        /// The offending bin id.
        id: BinId,
        /// Creation time, unix seconds.
        created_at: i64,
        /// Claimed expiry time, unix seconds.
        expires_at: i64,
    },
}

/// A bin the user has created, as remembered by the browser-scoped cache.
///
/// Lives independently of any open session; mutated only by pruning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinSummary {
    /// The bin identifier.
    pub id: BinId,
    /// Creation time, unix seconds.
    pub created_at: i64,
    /// Expiry time, unix seconds. Always after `created_at`.
    pub expires_at: i64,
}

impl BinSummary {
    /// Create a summary, enforcing `expires_at > created_at`.
    pub fn new(id: BinId, created_at: i64, expires_at: i64) -> Result<Self, SummaryError> {
        if expires_at <= created_at {
            return Err(SummaryError::ExpiryBeforeCreation {
                id,
                created_at,
                expires_at,
            });
        }
        Ok(Self {
            id,
            created_at,
            expires_at,
        })
    }

    /// Whether this bin counts as expired at `now`.
    ///
    /// The boundary is strict: anything expiring less than one second
    /// from now is already gone. Source variants disagreed between
    /// `< 1` and `<= 0`; the stricter reading is used so a bin never
    /// appears listed and then rejects a request within the same tick.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at - now < 1
    }

    /// Seconds of life remaining at `now`, zero when expired.
    pub fn remaining(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }
}
