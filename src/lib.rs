//! # geobin-core
//!
//! Bin history synchronization and live-update reconciliation for
//! disposable webhook bins.
//!
//! A *bin* is a throwaway endpoint whose delivered requests a user
//! watches in near-real time, overlaid on a map when a body carries
//! geospatial data. This crate is the engine behind that view:
//!
//! 1. Load a bin's already-received request history
//! 2. Merge the continuous push stream into it, with no duplicates and
//!    no reordering
//! 3. Track which bins this browser created, pruning them as they expire
//! 4. Derive, from each request body, the geometries to render and toggle
//!
//! ## Architecture
//!
//! ```text
//! BinSession ─→ Transport (history fetch, push channel)
//!     │
//!     ├─→ HistoryStore   (arrival-ordered, duplicate-free)
//!     ├─→ LiveSync       (channel state machine, frame decode)
//!     └─→ LayerRegistry ─→ GeoExtractor (pure body → geometry walk)
//!
//! BinCache ─→ LocalStore (durable, browser-scoped key/value)
//! ```
//!
//! Rendering, map tiles, and the HTTP/WebSocket wire are external
//! collaborators: the engine talks to an injected [`Transport`] and an
//! injected [`cache::LocalStore`] and implements neither.
//!
//! ## Ordering Guarantees
//!
//! - History order is arrival order; late out-of-order pushes append,
//!   never resort
//! - A duplicate timestamp is absorbed, never re-appended or re-rendered
//! - Frames are applied strictly in transport delivery order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod extract;
pub mod history;
pub mod layers;
pub mod live;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports
pub use types::{
    BinId, BinSummary, GeoBounds, GeoFeature, GeoKind, PathSegment, Request, SummaryError,
};
pub use extract::{extract, extract_with, ExtractOptions};
pub use history::{AppendResult, HistoryError, HistoryStore};
pub use layers::{LayerRegistry, RenderableLayer};
pub use live::{ChannelState, FrameOutcome, LiveError, LiveSync};
pub use cache::{BinCache, CacheError, LocalStore, MemoryLocalStore, DEFAULT_NAMESPACE};
pub use transport::{ChannelHandle, FrameChannel, HistoryFetch, MemoryTransport, Transport};
pub use session::{ActivationReport, BinSession, SessionError, SessionUpdate};

/// Schema version stamped into the persisted bin cache envelope.
/// Increment on breaking changes to any serialized shape.
pub const ENGINE_SCHEMA_VERSION: &str = "1.0.0";
