//! Scripted in-memory transport for tests and headless embedding.
//!
//! Bins are seeded up front; push frames are injected by the test
//! driver. Failure switches let callers exercise the retryable-error
//! and invalid-bin paths without a wire.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use xxhash_rust::xxh64::xxh64;

use super::{ChannelHandle, FrameChannel, HistoryFetch, Transport};
use crate::types::{BinId, BinSummary, Request};

/// How long a freshly created bin lives: 48 hours.
const DEFAULT_TTL_SECONDS: i64 = 48 * 60 * 60;

/// Error type for the in-memory transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MemoryTransportError {
    /// Scripted outage; callers should treat this as retryable.
    #[error("transport unavailable (scripted outage)")]
    Unavailable,
}

#[derive(Default)]
struct Inner {
    /// Seeded histories, stored in arrival order (oldest first).
    bins: HashMap<BinId, Vec<Request>>,
    /// Live sender per open channel, paired with its close handle.
    channels: HashMap<BinId, (mpsc::UnboundedSender<String>, ChannelHandle)>,
    fail_history: bool,
    fail_channel: bool,
    created: u64,
}

/// In-memory [`Transport`] over scripted bins.
#[derive(Default)]
pub struct MemoryTransport {
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    /// Create a transport with no bins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a bin with a history in arrival order (oldest first).
    pub fn seed_bin(&self, bin: BinId, history: Vec<Request>) {
        self.inner.lock().bins.insert(bin, history);
    }

    /// Make `fetch_history` fail until reset.
    pub fn set_fail_history(&self, fail: bool) {
        self.inner.lock().fail_history = fail;
    }

    /// Make `open_channel` fail until reset.
    pub fn set_fail_channel(&self, fail: bool) {
        self.inner.lock().fail_channel = fail;
    }

    /// Deliver a raw frame on a bin's open channel.
    ///
    /// Returns `false` when no channel is open for the bin or the
    /// channel has been closed; the frame is then dropped, matching a
    /// push server talking to a departed client.
    pub fn push_frame(&self, bin: &BinId, raw: impl Into<String>) -> bool {
        let inner = self.inner.lock();
        match inner.channels.get(bin) {
            Some((sender, handle)) if !handle.is_closed() => sender.send(raw.into()).is_ok(),
            _ => false,
        }
    }

    /// Whether a channel is currently open (and not closed) for a bin.
    pub fn channel_open(&self, bin: &BinId) -> bool {
        self.inner
            .lock()
            .channels
            .get(bin)
            .map(|(_, handle)| !handle.is_closed())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Error = MemoryTransportError;

    async fn fetch_history(&self, bin: &BinId) -> Result<HistoryFetch, Self::Error> {
        let inner = self.inner.lock();
        if inner.fail_history {
            return Err(MemoryTransportError::Unavailable);
        }
        Ok(match inner.bins.get(bin) {
            Some(history) => {
                // Serve newest-first, the way the server reports history.
                let mut requests = history.clone();
                requests.reverse();
                HistoryFetch::existing(requests)
            }
            None => HistoryFetch::missing(),
        })
    }

    async fn fetch_counts(
        &self,
        bins: &[BinId],
    ) -> Result<HashMap<BinId, u64>, Self::Error> {
        let inner = self.inner.lock();
        Ok(bins
            .iter()
            .filter_map(|bin| {
                inner
                    .bins
                    .get(bin)
                    .map(|history| (bin.clone(), history.len() as u64))
            })
            .collect())
    }

    async fn create_bin(&self) -> Result<BinSummary, Self::Error> {
        let mut inner = self.inner.lock();
        inner.created += 1;
        let now = Utc::now().timestamp();
        let seed = [inner.created.to_le_bytes(), (now as u64).to_le_bytes()].concat();
        let id = BinId::new(format!("{:010x}", xxh64(&seed, 0) & 0xff_ffff_ffff));
        inner.bins.entry(id.clone()).or_default();
        // The constant TTL is positive, so expiry always postdates
        // creation and the summary is well-formed by construction.
        Ok(BinSummary {
            id,
            created_at: now,
            expires_at: now + DEFAULT_TTL_SECONDS,
        })
    }

    async fn open_channel(&self, bin: &BinId) -> Result<FrameChannel, Self::Error> {
        let mut inner = self.inner.lock();
        if inner.fail_channel {
            return Err(MemoryTransportError::Unavailable);
        }
        let (sender, frames) = mpsc::unbounded_channel();
        let handle = ChannelHandle::new();
        inner
            .channels
            .insert(bin.clone(), (sender, handle.clone()));
        Ok(FrameChannel { handle, frames })
    }
}
