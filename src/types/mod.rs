//! Core types for the bin synchronization engine.

pub mod geo;
pub mod request;
pub mod summary;

pub use geo::{GeoBounds, GeoFeature, GeoKind, PathSegment};
pub use request::{BinId, Request};
pub use summary::{BinSummary, SummaryError};
