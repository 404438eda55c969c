//! Live push-channel reconciliation.
//!
//! `LiveSync` owns at most one open channel and feeds decoded frames
//! into a [`HistoryStore`]. The channel lifecycle is
//! Closed → Opening → Open → Closed; a malformed frame is a transient
//! error that drops the frame and nothing else: the channel stays
//! open and the history is untouched.

use std::sync::Arc;

use crate::history::{AppendResult, HistoryStore};
use crate::transport::{FrameChannel, Transport};
use crate::types::{BinId, Request};

/// Resting states of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No channel, or the channel was closed.
    Closed,
    /// Waiting for the transport to confirm the channel.
    Opening,
    /// Channel confirmed; frames may arrive.
    Open,
}

/// What one frame did to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Decoded and appended; carries the request timestamp.
    Appended(i64),
    /// Decoded but already known; silently absorbed (expected under
    /// at-least-once delivery).
    Duplicate(i64),
    /// Undecodable payload; logged and dropped, channel unaffected.
    Malformed,
}

/// Error type for channel operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LiveError {
    /// The transport failed to open the channel.
    #[error("channel open failed: {0}")]
    OpenFailed(String),
}

/// Reconciles one bin's push channel with its history store.
pub struct LiveSync<T: Transport> {
    transport: Arc<T>,
    state: ChannelState,
    channel: Option<FrameChannel>,
    bin: Option<BinId>,
}

impl<T: Transport> LiveSync<T> {
    /// Create a closed sync over the given transport.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            state: ChannelState::Closed,
            channel: None,
            bin: None,
        }
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// The bin whose channel is open, if any.
    pub fn bin(&self) -> Option<&BinId> {
        self.bin.as_ref()
    }

    /// Open the push channel for a bin.
    ///
    /// If a channel is already open (for this bin or another), it is
    /// closed first; at most one channel is ever live. On failure the
    /// state returns to Closed.
    pub async fn open(&mut self, bin: &BinId) -> Result<(), LiveError> {
        if self.channel.is_some() {
            tracing::debug!(bin = %bin, "closing previous channel before reopen");
            self.close();
        }
        self.state = ChannelState::Opening;
        match self.transport.open_channel(bin).await {
            Ok(channel) => {
                self.channel = Some(channel);
                self.bin = Some(bin.clone());
                self.state = ChannelState::Open;
                tracing::debug!(bin = %bin, "push channel open");
                Ok(())
            }
            Err(e) => {
                self.state = ChannelState::Closed;
                Err(LiveError::OpenFailed(e.to_string()))
            }
        }
    }

    /// Await the next raw frame, in transport delivery order.
    ///
    /// Returns `None` when no channel is open or the transport hung up.
    pub async fn recv(&mut self) -> Option<String> {
        match self.channel.as_mut() {
            Some(channel) => channel.frames.recv().await,
            None => None,
        }
    }

    /// Decode one frame and feed it into the history.
    ///
    /// Malformed payloads are logged at warn and dropped; duplicates
    /// are absorbed without logging. Either way the channel stays open
    /// and the history is never left half-updated.
    pub fn apply_frame(&mut self, raw: &str, history: &mut HistoryStore) -> FrameOutcome {
        match Request::decode(raw) {
            Ok(request) => {
                let timestamp = request.timestamp;
                match history.append(request) {
                    AppendResult::Appended => FrameOutcome::Appended(timestamp),
                    AppendResult::DuplicateIgnored => FrameOutcome::Duplicate(timestamp),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                FrameOutcome::Malformed
            }
        }
    }

    /// Close the channel. Closing an already-closed or never-opened
    /// channel is a no-op. Frames still in flight are discarded.
    pub fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.handle.close();
            if let Some(bin) = &self.bin {
                tracing::debug!(bin = %bin, "push channel closed");
            }
        }
        self.bin = None;
        self.state = ChannelState::Closed;
    }
}
