//! Transport seam: history fetch, bin creation, counts, and the push channel.
//!
//! The engine never speaks HTTP or WebSocket itself. It talks to an
//! injected [`Transport`], which owns the wire. The contract mirrors
//! the server API: history fetch maps 200 → `exists: true`, 404 →
//! `exists: false`, and anything else to the transport's error type.

pub mod memory;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{BinId, BinSummary, Request};

pub use memory::{MemoryTransport, MemoryTransportError};

/// Result of a history fetch.
#[derive(Debug, Clone)]
pub struct HistoryFetch {
    /// Whether the bin exists at all. A missing bin is not an empty bin.
    pub exists: bool,
    /// Prior requests, most recent delivery first (the order the server
    /// reports them in).
    pub requests: Vec<Request>,
}

impl HistoryFetch {
    /// A fetch for a bin that does not exist.
    pub fn missing() -> Self {
        Self {
            exists: false,
            requests: Vec::new(),
        }
    }

    /// A fetch for an existing bin with the given newest-first history.
    pub fn existing(requests: Vec<Request>) -> Self {
        Self {
            exists: true,
            requests,
        }
    }
}

/// Handle to one open push channel.
///
/// Cheap to clone; the transport keeps a clone so it can observe
/// closure and stop delivering frames. Closing twice is a no-op.
#[derive(Debug, Clone, Default)]
pub struct ChannelHandle {
    closed: Arc<AtomicBool>,
}

impl ChannelHandle {
    /// Create an open handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the channel. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// One open push channel: a close handle plus the frame stream.
///
/// Frames arrive in the transport's own delivery order; nothing in the
/// engine reorders or buffers them.
#[derive(Debug)]
pub struct FrameChannel {
    /// Handle for closing the channel.
    pub handle: ChannelHandle,
    /// Raw frame payloads, in delivery order.
    pub frames: mpsc::UnboundedReceiver<String>,
}

/// Trait for the transport capability backing the engine.
///
/// All methods are async; the engine suspends only while awaiting them
/// or awaiting frames.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch a bin's existing request history, newest first.
    async fn fetch_history(&self, bin: &BinId) -> Result<HistoryFetch, Self::Error>;

    /// Fetch the request counts for a set of bins. Unknown bins are
    /// simply absent from the result.
    async fn fetch_counts(
        &self,
        bins: &[BinId],
    ) -> Result<HashMap<BinId, u64>, Self::Error>;

    /// Create a fresh bin and return its summary.
    async fn create_bin(&self) -> Result<BinSummary, Self::Error>;

    /// Open the push channel for a bin.
    async fn open_channel(&self, bin: &BinId) -> Result<FrameChannel, Self::Error>;
}
