//! Renderable map layers derived from request geometries.
//!
//! Each request's layer set is built lazily on first use and memoized
//! forever: request bodies are immutable, so a rebuilt set could only
//! ever be identical. Visibility toggling is idempotent per flip and
//! independent of layer construction.

use std::collections::HashMap;

use serde_json::Value;
use xxhash_rust::xxh64::xxh64;

use crate::types::{GeoBounds, GeoKind, Request};

/// One shape ready to be placed on a map.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableLayer {
    /// Stable `#rrggbb` color, assigned once at construction.
    pub color: String,
    /// The shape to draw.
    pub kind: GeoKind,
    /// Popup content: the body fragment associated with just this shape.
    pub popup: Value,
    /// Extent of the shape, when derivable.
    pub bounds: Option<GeoBounds>,
}

/// Registry mapping request timestamps to their derived layers and
/// current visibility.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    built: HashMap<i64, Vec<RenderableLayer>>,
    visible: HashMap<i64, bool>,
}

impl LayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The layers for a request, building and memoizing them on first use.
    pub fn layers_for(&mut self, request: &Request) -> &[RenderableLayer] {
        self.built
            .entry(request.timestamp)
            .or_insert_with(|| build_layers(request))
    }

    /// Flip visibility for a request's layers and return the new value.
    ///
    /// Builds the layer set first if this is the first time the request
    /// is seen. Two toggles in a row always return `true` then `false`.
    pub fn toggle(&mut self, request: &Request) -> bool {
        self.layers_for(request);
        let flag = self.visible.entry(request.timestamp).or_insert(false);
        *flag = !*flag;
        *flag
    }

    /// Current visibility for a request's layers.
    pub fn visibility(&self, timestamp: i64) -> bool {
        self.visible.get(&timestamp).copied().unwrap_or(false)
    }

    /// Combined extent of one request's layers, if built and derivable.
    pub fn bounds_for(&self, timestamp: i64) -> Option<GeoBounds> {
        let layers = self.built.get(&timestamp)?;
        merge_bounds(layers.iter())
    }

    /// Combined extent of every built layer set (the "zoom to all" extent).
    pub fn combined_bounds(&self) -> Option<GeoBounds> {
        merge_bounds(self.built.values().flatten())
    }

    /// Whether layers have been built for this request yet.
    pub fn is_built(&self, timestamp: i64) -> bool {
        self.built.contains_key(&timestamp)
    }
}

fn merge_bounds<'a>(layers: impl Iterator<Item = &'a RenderableLayer>) -> Option<GeoBounds> {
    let mut extent: Option<GeoBounds> = None;
    for layer in layers {
        if let Some(b) = &layer.bounds {
            match &mut extent {
                Some(e) => e.merge(b),
                None => extent = Some(*b),
            }
        }
    }
    extent
}

fn build_layers(request: &Request) -> Vec<RenderableLayer> {
    // A request that carries geometry always has a JSON body, since the
    // geometry was derived from it. The fallback covers hand-built
    // requests only.
    let body = request
        .parsed_body()
        .unwrap_or_else(|| Value::String(request.body.clone()));

    request
        .geo
        .iter()
        .enumerate()
        .map(|(index, feature)| RenderableLayer {
            color: stable_color(request.timestamp, index),
            kind: feature.kind.clone(),
            popup: feature.popup_content(&body).clone(),
            bounds: feature.kind.bounds(),
        })
        .collect()
}

/// Derive a stable mid-brightness `#rrggbb` color for one layer.
///
/// The original picked a random color and forced the high digit of each
/// channel into the 0x4..=0xd range so shapes stay visible on both
/// light and dark basemaps. Hashing (timestamp, index) keeps that range
/// while making the color reproducible across rebuilds.
fn stable_color(timestamp: i64, index: usize) -> String {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&timestamp.to_le_bytes());
    key[8..].copy_from_slice(&(index as u64).to_le_bytes());
    let bytes = xxh64(&key, 0).to_le_bytes();

    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut color = String::with_capacity(7);
    color.push('#');
    for channel in 0..3 {
        let high = 4 + (bytes[channel * 2] % 10) as usize;
        let low = (bytes[channel * 2 + 1] % 16) as usize;
        color.push(HEX[high] as char);
        color.push(HEX[low] as char);
    }
    color
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn geo_request(ts: i64) -> Request {
        Request::new(
            ts,
            BTreeMap::new(),
            r#"{"spot": {"geo": {"latitude": 45.5, "longitude": -122.6}, "name": "pdx"}}"#,
        )
    }

    #[test]
    fn test_toggle_flips_true_false_true() {
        let mut registry = LayerRegistry::new();
        let request = geo_request(100);
        assert!(registry.toggle(&request));
        assert!(!registry.toggle(&request));
        assert!(registry.toggle(&request));
        assert!(registry.visibility(100));
    }

    #[test]
    fn test_visibility_defaults_off() {
        let registry = LayerRegistry::new();
        assert!(!registry.visibility(42));
    }

    #[test]
    fn test_layers_memoized_once() {
        let mut registry = LayerRegistry::new();
        let request = geo_request(100);
        let first: Vec<RenderableLayer> = registry.layers_for(&request).to_vec();
        let second: Vec<RenderableLayer> = registry.layers_for(&request).to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_popup_is_path_fragment() {
        let mut registry = LayerRegistry::new();
        let request = geo_request(100);
        let layers = registry.layers_for(&request);
        assert_eq!(layers[0].popup["name"], "pdx");
    }

    #[test]
    fn test_color_is_stable_and_in_range() {
        let a = stable_color(100, 0);
        let b = stable_color(100, 0);
        assert_eq!(a, b);
        assert_ne!(a, stable_color(100, 1));
        assert_ne!(a, stable_color(101, 0));

        assert_eq!(a.len(), 7);
        for channel in 0..3 {
            let high = a.as_bytes()[1 + channel * 2] as char;
            let digit = high.to_digit(16).unwrap();
            assert!((4..=13).contains(&digit), "high digit out of range in {}", a);
        }
    }

    #[test]
    fn test_request_without_geo_builds_empty_set() {
        let mut registry = LayerRegistry::new();
        let request = Request::new(7, BTreeMap::new(), "no geometry here");
        assert!(registry.layers_for(&request).is_empty());
        // Toggle still flips; there is just nothing to draw.
        assert!(registry.toggle(&request));
    }

    #[test]
    fn test_combined_bounds_spans_requests() {
        let mut registry = LayerRegistry::new();
        let north = Request::new(
            1,
            BTreeMap::new(),
            r#"{"geo": {"latitude": 10.0, "longitude": 0.0}}"#,
        );
        let south = Request::new(
            2,
            BTreeMap::new(),
            r#"{"geo": {"latitude": -10.0, "longitude": 5.0}}"#,
        );
        registry.layers_for(&north);
        registry.layers_for(&south);
        let extent = registry.combined_bounds().unwrap();
        assert_eq!(extent.north, 10.0);
        assert_eq!(extent.south, -10.0);
        assert_eq!(extent.east, 5.0);
    }
}
