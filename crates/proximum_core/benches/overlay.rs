//! Overlay building benchmarks using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use proximum_core::node::Wgs84;
use proximum_core::overlay::{great_circle_arc, network_links, node_overlays, DEFAULT_ARC_SEGMENTS};
use proximum_core::test_helpers::synthetic_nodes;

fn bench_node_overlays(c: &mut Criterion) {
    let networks = vec![("small", 20), ("medium", 100), ("large", 500)];

    let mut group = c.benchmark_group("node_overlays");
    for (name, n_nodes) in networks {
        let nodes = synthetic_nodes(n_nodes, 42);
        group.bench_with_input(BenchmarkId::from_parameter(name), &nodes, |b, nodes| {
            b.iter(|| black_box(node_overlays(nodes, DEFAULT_ARC_SEGMENTS)));
        });
    }
    group.finish();
}

fn bench_network_links(c: &mut Criterion) {
    let nodes = synthetic_nodes(100, 7);
    c.bench_function("network_links_100", |b| {
        b.iter(|| black_box(network_links(&nodes, DEFAULT_ARC_SEGMENTS)));
    });
}

fn bench_great_circle_arc(c: &mut Criterion) {
    let from = Wgs84::from_degrees(37.77, -122.42);
    let to = Wgs84::from_degrees(51.51, -0.13);

    let mut group = c.benchmark_group("great_circle_arc");
    for segments in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(segments), &segments, |b, &segments| {
            b.iter(|| black_box(great_circle_arc(from, to, segments)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_node_overlays, bench_network_links, bench_great_circle_arc);
criterion_main!(benches);
