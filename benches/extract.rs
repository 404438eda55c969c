//! Performance benchmarks for geometry extraction and history appends.
//!
//! Run with: `cargo bench --bench extract`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Extract, shallow payload | <10µs | Typical webhook body |
//! | Extract, deep payload | Linear in depth | Bounded by max_depth |
//! | Append under duplicates | O(1) amortized | Timestamp set lookup |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use geobin_core::{extract, HistoryStore, Request};

/// A typical geometry-bearing webhook body.
fn shallow_payload() -> Value {
    json!({
        "event": "checkin",
        "user": {"name": "someone", "geo": {"latitude": 45.52, "longitude": -122.68}},
        "venue": {"geo": {"latitude": 45.50, "longitude": -122.66, "distance": 120}},
        "extra": {"a": 1, "b": [1, 2, 3], "c": "text"}
    })
}

/// A payload nested `depth` mappings deep, geometry at the bottom.
fn deep_payload(depth: usize) -> Value {
    let mut value = json!({"geo": {"latitude": 1.0, "longitude": 2.0}});
    for _ in 0..depth {
        value = json!({"wrap": value});
    }
    value
}

fn bench_extract_shallow(c: &mut Criterion) {
    let payload = shallow_payload();
    c.bench_function("extract_shallow", |b| {
        b.iter(|| extract(black_box(&payload)));
    });
}

fn bench_extract_deep(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_deep");
    for depth in [8usize, 32, 100] {
        let payload = deep_payload(depth);
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &payload, |b, payload| {
            b.iter(|| extract(black_box(payload)));
        });
    }
    group.finish();
}

fn bench_history_append(c: &mut Criterion) {
    let body = serde_json::to_string(&shallow_payload()).expect("payload serializes");
    c.bench_function("history_append_with_duplicates", |b| {
        b.iter(|| {
            let mut store = HistoryStore::new();
            for ts in 0..1000i64 {
                // every other append is a duplicate
                store.append(Request::new(ts / 2, BTreeMap::new(), body.clone()));
            }
            black_box(store.len())
        });
    });
}

criterion_group!(
    benches,
    bench_extract_shallow,
    bench_extract_deep,
    bench_history_append
);
criterion_main!(benches);
