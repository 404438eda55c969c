//! Geometry extraction from parsed request bodies.
//!
//! Walks a JSON value depth-first looking for mappings that contain a
//! key literally named `geo`, and classifies what it finds there:
//!
//! - `latitude` + `longitude` + `distance` → [`GeoKind::Circle`]
//! - `latitude` + `longitude` → [`GeoKind::Point`]
//! - `geojson` → [`GeoKind::GeoJson`] (nested value carried verbatim)
//! - anything else → no feature
//!
//! Traversal recurses into nested mappings but **not** into arrays,
//! preserving the historical search behavior. Depth is bounded by
//! [`ExtractOptions::max_depth`]; exceeding it stops descending rather
//! than erroring, so adversarial nesting cannot exhaust the stack.
//!
//! Extraction is pure and never panics: malformed branches simply
//! contribute no features.

use serde_json::Value;

use crate::types::geo::{GeoFeature, GeoKind, PathSegment};

/// Tuning knobs for extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Maximum mapping depth to descend into. Deeper branches are
    /// silently skipped.
    pub max_depth: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { max_depth: 128 }
    }
}

/// Extract every embedded geometry from a parsed JSON value, with
/// default options.
pub fn extract(value: &Value) -> Vec<GeoFeature> {
    extract_with(value, &ExtractOptions::default())
}

/// Extract every embedded geometry from a parsed JSON value.
///
/// Features are returned in traversal order, each tagged with the path
/// of the mapping that contained its `geo` key (empty for the body
/// root).
pub fn extract_with(value: &Value, options: &ExtractOptions) -> Vec<GeoFeature> {
    let mut found = Vec::new();
    let mut path = Vec::new();
    walk(value, &mut path, 0, options, &mut found);
    found
}

fn walk(
    value: &Value,
    path: &mut Vec<PathSegment>,
    depth: usize,
    options: &ExtractOptions,
    found: &mut Vec<GeoFeature>,
) {
    let Value::Object(map) = value else {
        return;
    };
    if depth >= options.max_depth {
        return;
    }
    for (key, child) in map {
        if key == "geo" {
            if let Some(kind) = classify(child) {
                found.push(GeoFeature::new(kind, path.clone()));
            }
        } else if child.is_object() {
            path.push(PathSegment::Key(key.clone()));
            walk(child, path, depth + 1, options, found);
            path.pop();
        }
    }
}

/// Classify the value found under a `geo` key.
fn classify(geo: &Value) -> Option<GeoKind> {
    let Value::Object(map) = geo else {
        return None;
    };

    let lat = map.get("latitude").and_then(coordinate);
    let lon = map.get("longitude").and_then(coordinate);

    if let (Some(lat), Some(lon)) = (lat, lon) {
        return Some(match map.get("distance").and_then(coordinate) {
            Some(radius) => GeoKind::Circle { lat, lon, radius },
            None => GeoKind::Point { lat, lon },
        });
    }

    map.get("geojson").map(|geometry| GeoKind::GeoJson {
        geometry: geometry.clone(),
    })
}

/// Read a coordinate that may arrive as a JSON number or a numeric
/// string (webhook senders routinely quote their floats).
fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_point() {
        let features = extract(&json!({"geo": {"latitude": 1, "longitude": 2}}));
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].kind, GeoKind::Point { lat: 1.0, lon: 2.0 });
        assert!(features[0].path.is_empty());
    }

    #[test]
    fn test_top_level_circle() {
        let features = extract(&json!({"geo": {"latitude": 1, "longitude": 2, "distance": 50}}));
        assert_eq!(
            features[0].kind,
            GeoKind::Circle { lat: 1.0, lon: 2.0, radius: 50.0 }
        );
    }

    #[test]
    fn test_nested_geojson_with_path() {
        let features = extract(&json!({
            "a": {"geo": {"geojson": {"type": "Point", "coordinates": [1, 2]}}}
        }));
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].path, vec![PathSegment::from("a")]);
        match &features[0].kind {
            GeoKind::GeoJson { geometry } => {
                assert_eq!(geometry["type"], "Point");
                assert_eq!(geometry["coordinates"], json!([1, 2]));
            }
            other => panic!("expected GeoJson, got {:?}", other),
        }
    }

    #[test]
    fn test_quoted_coordinates_are_accepted() {
        // The canonical sample payload quotes its floats.
        let features = extract(&json!({"geo": {"latitude": "45.5165", "longitude": "-122.6764"}}));
        assert_eq!(
            features[0].kind,
            GeoKind::Point { lat: 45.5165, lon: -122.6764 }
        );
    }

    #[test]
    fn test_zero_is_a_valid_coordinate() {
        let features = extract(&json!({"geo": {"latitude": 0, "longitude": 0}}));
        assert_eq!(features[0].kind, GeoKind::Point { lat: 0.0, lon: 0.0 });
    }

    #[test]
    fn test_unrecognized_geo_emits_nothing() {
        assert!(extract(&json!({"geo": {"altitude": 12}})).is_empty());
        assert!(extract(&json!({"geo": "here"})).is_empty());
        assert!(extract(&json!({"geo": null})).is_empty());
    }

    #[test]
    fn test_no_recursion_into_arrays() {
        // Historical behavior: geo objects inside arrays are not found.
        let features = extract(&json!({
            "items": [{"geo": {"latitude": 1, "longitude": 2}}]
        }));
        assert!(features.is_empty());
    }

    #[test]
    fn test_siblings_after_geo_are_still_searched() {
        let features = extract(&json!({
            "geo": {"latitude": 1, "longitude": 2},
            "nested": {"geo": {"latitude": 3, "longitude": 4}}
        }));
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn test_depth_cap_stops_descending() {
        let mut value = json!({"geo": {"latitude": 1, "longitude": 2}});
        for _ in 0..10 {
            value = json!({"wrap": value});
        }
        let shallow = extract_with(&value, &ExtractOptions { max_depth: 3 });
        assert!(shallow.is_empty());
        let deep = extract_with(&value, &ExtractOptions { max_depth: 64 });
        assert_eq!(deep.len(), 1);
        assert_eq!(deep[0].path.len(), 10);
    }

    #[test]
    fn test_non_object_roots_yield_nothing() {
        assert!(extract(&json!([1, 2, 3])).is_empty());
        assert!(extract(&json!("geo")).is_empty());
        assert!(extract(&json!(null)).is_empty());
    }

    #[test]
    fn test_lat_lon_wins_over_geojson() {
        // Classification order mirrors the original if/else chain.
        let features = extract(&json!({
            "geo": {"latitude": 1, "longitude": 2, "geojson": {"type": "Point", "coordinates": [9, 9]}}
        }));
        assert_eq!(features[0].kind, GeoKind::Point { lat: 1.0, lon: 2.0 });
    }
}
