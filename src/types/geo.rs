//! Geometry types derived from webhook request bodies.
//!
//! A request body may embed geospatial data under a `geo` key anywhere
//! in its JSON structure. Extraction (see [`crate::extract`]) produces
//! a flat list of [`GeoFeature`] values, each remembering the traversal
//! path at which it was found so a popup can show just the content
//! associated with that shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One step of the traversal path at which a geometry was found.
///
/// Paths address the mapping that *contains* the `geo` key. An empty
/// path means the geometry sits at the top level of the body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{}", k),
            Self::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Key(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// The shape of a single extracted geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeoKind {
    /// A bare coordinate pair.
    Point {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lon: f64,
    },
    /// A coordinate pair with a radius in meters.
    Circle {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lon: f64,
        /// Radius in meters.
        radius: f64,
    },
    /// A GeoJSON geometry carried verbatim from the body.
    GeoJson {
        /// The nested GeoJSON value, untouched.
        geometry: Value,
    },
}

impl GeoKind {
    /// Geographic extent of this shape, if one can be derived.
    ///
    /// Circles are buffered by their radius; GeoJSON is scanned for
    /// `[lon, lat]` coordinate pairs at any nesting depth. Returns
    /// `None` for GeoJSON that carries no numeric coordinates.
    pub fn bounds(&self) -> Option<GeoBounds> {
        match self {
            Self::Point { lat, lon } => Some(GeoBounds::of_point(*lat, *lon)),
            Self::Circle { lat, lon, radius } => {
                Some(GeoBounds::of_point(*lat, *lon).buffered(*radius))
            }
            Self::GeoJson { geometry } => {
                let mut bounds: Option<GeoBounds> = None;
                scan_coordinates(geometry, &mut bounds);
                bounds
            }
        }
    }
}

/// A geometry extracted from a request body, tagged with where it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature {
    /// The classified shape.
    pub kind: GeoKind,
    /// Path of the mapping containing the `geo` key, inside the parsed body.
    pub path: Vec<PathSegment>,
}

impl GeoFeature {
    /// Create a feature at the given path.
    pub fn new(kind: GeoKind, path: Vec<PathSegment>) -> Self {
        Self { kind, path }
    }

    /// Resolve the body content associated with just this shape.
    ///
    /// Applies the feature path to the parsed body; an empty path
    /// yields the whole body. Falls back to the whole body if the
    /// path no longer resolves.
    pub fn popup_content<'a>(&self, body: &'a Value) -> &'a Value {
        let mut current = body;
        for segment in &self.path {
            let next = match segment {
                PathSegment::Key(k) => current.get(k.as_str()),
                PathSegment::Index(i) => current.get(*i),
            };
            match next {
                Some(v) => current = v,
                None => return body,
            }
        }
        current
    }
}

/// A latitude/longitude extent, south-west to north-east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Southern latitude edge.
    pub south: f64,
    /// Western longitude edge.
    pub west: f64,
    /// Northern latitude edge.
    pub north: f64,
    /// Eastern longitude edge.
    pub east: f64,
}

/// Meters per degree of latitude, used to buffer circle bounds.
const METERS_PER_DEGREE: f64 = 111_320.0;

impl GeoBounds {
    /// Degenerate bounds covering a single point.
    pub fn of_point(lat: f64, lon: f64) -> Self {
        Self {
            south: lat,
            west: lon,
            north: lat,
            east: lon,
        }
    }

    /// Grow the bounds to include a point.
    pub fn extend_point(&mut self, lat: f64, lon: f64) {
        self.south = self.south.min(lat);
        self.west = self.west.min(lon);
        self.north = self.north.max(lat);
        self.east = self.east.max(lon);
    }

    /// Grow the bounds to include another extent.
    pub fn merge(&mut self, other: &GeoBounds) {
        self.extend_point(other.south, other.west);
        self.extend_point(other.north, other.east);
    }

    /// Bounds expanded by `radius` meters on every side.
    pub fn buffered(&self, radius: f64) -> Self {
        let d_lat = radius / METERS_PER_DEGREE;
        // Longitude degrees shrink toward the poles.
        let widest_lat = self.south.abs().max(self.north.abs()).min(89.0);
        let d_lon = radius / (METERS_PER_DEGREE * widest_lat.to_radians().cos());
        Self {
            south: self.south - d_lat,
            west: self.west - d_lon,
            north: self.north + d_lat,
            east: self.east + d_lon,
        }
    }

    /// Center of the extent.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

/// Walk a GeoJSON value collecting every `[lon, lat]` pair into `bounds`.
///
/// GeoJSON nests coordinates at varying depths (Point vs MultiPolygon vs
/// GeometryCollection), so any array whose first two elements are numbers
/// is treated as a position.
fn scan_coordinates(value: &Value, bounds: &mut Option<GeoBounds>) {
    match value {
        Value::Array(items) => {
            let pair = match (items.first(), items.get(1)) {
                (Some(a), Some(b)) => a.as_f64().zip(b.as_f64()),
                _ => None,
            };
            if let Some((lon, lat)) = pair {
                match bounds {
                    Some(b) => b.extend_point(lat, lon),
                    None => *bounds = Some(GeoBounds::of_point(lat, lon)),
                }
            } else {
                for item in items {
                    scan_coordinates(item, bounds);
                }
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                scan_coordinates(child, bounds);
            }
        }
        _ => {}
    }
}
