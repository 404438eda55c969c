//! Bin identifiers and delivered webhook requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::geo::GeoFeature;

/// Identifier of a disposable webhook bin.
///
/// Bin ids are opaque server-issued strings; this newtype keeps them
/// from being confused with other strings at API seams.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinId(String);

impl BinId {
    /// Create a bin id from any string-ish value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BinId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BinId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Wire shape of one delivered request.
///
/// This is the only shape the engine requires of the transport: a
/// decoded frame must look like `{timestamp, headers, body}`. Geometry
/// is derived locally from the body, never trusted from the wire.
#[derive(Debug, Deserialize)]
struct WireRequest {
    timestamp: i64,
    headers: BTreeMap<String, String>,
    body: String,
}

/// One HTTP request delivered to a bin. Immutable once stored.
///
/// `timestamp` is unix seconds and unique within a bin; it doubles as
/// the request identifier throughout the engine. `geo` is derived from
/// `body` at construction and is empty when the body is not JSON or
/// carries no geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unix-seconds delivery timestamp, unique within a bin.
    pub timestamp: i64,
    /// HTTP headers as delivered.
    pub headers: BTreeMap<String, String>,
    /// Raw body text; may or may not parse as JSON.
    pub body: String,
    /// Geometries derived from the body, in extraction order.
    pub geo: Vec<GeoFeature>,
}

impl Request {
    /// Build a request, deriving its geometry from the body.
    pub fn new(timestamp: i64, headers: BTreeMap<String, String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let geo = match serde_json::from_str(&body) {
            Ok(parsed) => crate::extract::extract(&parsed),
            Err(_) => Vec::new(),
        };
        Self {
            timestamp,
            headers,
            body,
            geo,
        }
    }

    /// Decode one push-channel frame into a request.
    ///
    /// The frame payload must be a JSON object with `timestamp`,
    /// `headers`, and `body`; extra fields are ignored. Geometry is
    /// re-derived locally regardless of what the wire carried.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        let wire: WireRequest = serde_json::from_str(raw)?;
        Ok(Self::new(wire.timestamp, wire.headers, wire.body))
    }

    /// The body parsed as JSON, if it is JSON.
    pub fn parsed_body(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Whether any geometry was derived from the body.
    pub fn has_geo(&self) -> bool {
        !self.geo.is_empty()
    }
}
