//! Performance benchmarks for new-tracks-lib
//!
//! Run with: cargo bench --package new-tracks-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geo::{Coord, LineString};
use new_tracks_lib::{BufferStrategy, DifferenceConfig, History, codec};

/// Generate a wiggly line with the specified number of points.
fn generate_line(num_points: usize, base_lon: f64, base_lat: f64) -> LineString<f64> {
    (0..num_points)
        .map(|i| {
            let t = i as f64 / num_points as f64;
            Coord {
                x: base_lon + t * 0.5 + (t * 30.0).cos() * 0.002,
                y: base_lat + t * 0.5 + (t * 50.0).sin() * 0.002,
            }
        })
        .collect()
}

/// Generate historical lines spread over a grid, a tenth of them near the candidate
fn generate_history(num_lines: usize, points_per_line: usize) -> Vec<LineString<f64>> {
    (0..num_lines)
        .map(|i| {
            let lon_offset = (i % 10) as f64 * 0.3;
            let lat_offset = (i / 10) as f64 * 0.3;
            generate_line(points_per_line, 2.0 + lon_offset, 48.0 + lat_offset)
        })
        .collect()
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_difference(c: &mut Criterion) {
    let mut group = c.benchmark_group("difference");
    group.sample_size(20);

    let candidate = generate_line(500, 2.0, 48.0);

    for num_lines in [10, 100] {
        let lines = generate_history(num_lines, 200);
        group.throughput(Throughput::Elements(num_lines as u64));

        for strategy in [BufferStrategy::PerCandidate, BufferStrategy::Cached] {
            let config = DifferenceConfig {
                strategy,
                ..DifferenceConfig::default()
            };
            let history = History::new(lines.clone(), &config);
            group.bench_with_input(
                BenchmarkId::new(format!("{strategy:?}"), num_lines),
                &history,
                |b, history| b.iter(|| history.remaining(&candidate)),
            );
        }
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let line = generate_line(10_000, 2.0, 48.0);
    let encoded = codec::encode(&line.0).unwrap_or_default();
    let json = format!(
        "[{}]",
        line.0
            .iter()
            .map(|c| format!("[{}, {}]", c.x, c.y))
            .collect::<Vec<_>>()
            .join(", ")
    );
    group.throughput(Throughput::Elements(line.0.len() as u64));

    group.bench_function("encode", |b| b.iter(|| codec::encode(&line.0)));
    group.bench_function("decode_polyline", |b| b.iter(|| codec::decode(&encoded)));
    group.bench_function("decode_json", |b| b.iter(|| codec::decode(&json)));

    group.finish();
}

criterion_group!(benches, bench_difference, bench_codec);
criterion_main!(benches);
