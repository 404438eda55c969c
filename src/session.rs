//! Orchestration of one active bin view.
//!
//! A `BinSession` wires the pieces together for a single bin: fetch
//! the existing history, load it, pre-toggle layers for everything
//! already known, open the live channel, then pump frames until the
//! view closes. Teardown always closes the channel, even when it
//! happens on an error path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::history::{HistoryError, HistoryStore};
use crate::layers::LayerRegistry;
use crate::live::{FrameOutcome, LiveSync};
use crate::transport::Transport;
use crate::types::{BinId, GeoBounds};

/// Error type for session operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// The bin does not exist. Not the same as an empty history; the
    /// channel is never opened.
    #[error("bin does not exist: {0}")]
    InvalidBin(BinId),
    /// The transport failed; retryable. No partial history is committed.
    #[error("transport error: {0}")]
    Transport(String),
    /// `activate` may only run once per session.
    #[error("session already activated")]
    AlreadyActivated,
    /// The session was torn down while an operation was in flight; the
    /// late result has been discarded.
    #[error("session closed")]
    Closed,
}

/// What activation found and set up.
#[derive(Debug, Clone)]
pub struct ActivationReport {
    /// Number of prior requests loaded.
    pub loaded: usize,
    /// Combined extent of all pre-toggled layers, when any carried
    /// geometry (the initial "zoom to everything" view).
    pub zoom_to: Option<GeoBounds>,
    /// Unix-seconds instant the session started; requests after this
    /// are "new" for display emphasis.
    pub session_start: i64,
}

/// One pumped frame, as seen by the caller.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// What the frame did to the history.
    pub outcome: FrameOutcome,
    /// Extent to recenter the map on, emitted exactly once: when the
    /// very first request this bin has ever seen arrives live.
    pub recenter: Option<GeoBounds>,
    /// Whether the request arrived after session start (display only).
    pub is_new: bool,
}

/// Active in-memory state for one bin currently being viewed.
pub struct BinSession<T: Transport> {
    transport: Arc<T>,
    bin: BinId,
    history: HistoryStore,
    layers: LayerRegistry,
    live: LiveSync<T>,
    /// Cleared on teardown; late transport results are discarded when unset.
    active: bool,
    session_start: i64,
    /// One-shot: set when the bin had no history at load, consumed by
    /// the first live append.
    first_content: bool,
}

impl<T: Transport> BinSession<T> {
    /// Create a session for a bin. Nothing happens until
    /// [`activate`](Self::activate).
    pub fn new(transport: Arc<T>, bin: BinId) -> Self {
        let live = LiveSync::new(transport.clone());
        Self {
            transport,
            bin,
            history: HistoryStore::new(),
            layers: LayerRegistry::new(),
            live,
            active: true,
            session_start: i64::MAX,
            first_content: false,
        }
    }

    /// The bin this session views.
    pub fn bin(&self) -> &BinId {
        &self.bin
    }

    /// Fetch history, load it, pre-toggle known layers, open the channel.
    ///
    /// A missing bin surfaces as [`SessionError::InvalidBin`] and a
    /// transport failure as [`SessionError::Transport`]. Either way the
    /// session ends up holding no history and no open channel, even
    /// when the failure strikes after the fetch, so the caller can
    /// retry on the same session.
    pub async fn activate(&mut self) -> Result<ActivationReport, SessionError> {
        let fetch = self
            .transport
            .fetch_history(&self.bin)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        if !self.active {
            // Torn down while the fetch was in flight.
            return Err(SessionError::Closed);
        }
        if !fetch.exists {
            return Err(SessionError::InvalidBin(self.bin.clone()));
        }

        // The transport reports newest-first; the store keeps arrival order.
        let mut requests = fetch.requests;
        requests.reverse();
        self.history.load(requests).map_err(|e| match e {
            HistoryError::AlreadyLoaded { .. } => SessionError::AlreadyActivated,
        })?;

        self.session_start = Utc::now().timestamp();
        self.first_content = self.history.is_empty();

        // Show everything we already know about, each exactly once.
        let layers = &mut self.layers;
        for request in self.history.all() {
            if request.has_geo() {
                layers.toggle(request);
            }
        }
        let zoom_to = layers.combined_bounds();

        if let Err(e) = self.live.open(&self.bin).await {
            // A retry must see a clean session: drop the loaded history
            // and pre-toggled layers so the next activate starts over.
            self.history = HistoryStore::new();
            self.layers = LayerRegistry::new();
            self.session_start = i64::MAX;
            self.first_content = false;
            return Err(SessionError::Transport(e.to_string()));
        }
        if !self.active {
            self.live.close();
            return Err(SessionError::Closed);
        }

        tracing::debug!(bin = %self.bin, loaded = self.history.len(), "session active");
        Ok(ActivationReport {
            loaded: self.history.len(),
            zoom_to,
            session_start: self.session_start,
        })
    }

    /// Await and apply the next frame.
    ///
    /// Returns `None` once the session is closed or the transport hangs
    /// up. An appended request gets its layers toggled on exactly once;
    /// duplicates and malformed frames change nothing beyond their
    /// reported outcome.
    pub async fn pump(&mut self) -> Option<SessionUpdate> {
        if !self.active {
            return None;
        }
        let raw = self.live.recv().await?;
        if !self.active {
            // close() ran while we were suspended on the channel.
            return None;
        }

        let outcome = self.live.apply_frame(&raw, &mut self.history);
        let update = match outcome {
            FrameOutcome::Appended(timestamp) => {
                let layers = &mut self.layers;
                if let Some(request) = self.history.all().last() {
                    layers.toggle(request);
                }
                let recenter = if self.first_content {
                    self.first_content = false;
                    layers.bounds_for(timestamp)
                } else {
                    None
                };
                SessionUpdate {
                    outcome,
                    recenter,
                    is_new: timestamp > self.session_start,
                }
            }
            FrameOutcome::Duplicate(_) | FrameOutcome::Malformed => SessionUpdate {
                outcome,
                recenter: None,
                is_new: false,
            },
        };
        Some(update)
    }

    /// Whether a timestamp postdates session start (display emphasis only).
    pub fn is_new(&self, timestamp: i64) -> bool {
        timestamp > self.session_start
    }

    /// Request counts for a set of bins, for badge display.
    pub async fn counts(
        &self,
        bins: &[BinId],
    ) -> Result<HashMap<BinId, u64>, SessionError> {
        self.transport
            .fetch_counts(bins)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    /// The accumulated history.
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// The layer registry, for visibility queries.
    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    /// Toggle a request's layers from the UI and return the new
    /// visibility.
    pub fn toggle_layers(&mut self, timestamp: i64) -> Option<bool> {
        let request = self
            .history
            .all()
            .iter()
            .find(|r| r.timestamp == timestamp)?
            .clone();
        Some(self.layers.toggle(&request))
    }

    /// Tear the session down. Always closes the live channel; safe to
    /// call at any point, any number of times.
    pub fn close(&mut self) {
        self.active = false;
        self.live.close();
    }
}

impl<T: Transport> Drop for BinSession<T> {
    fn drop(&mut self) {
        // Teardown must release the channel even on error paths.
        self.close();
    }
}
