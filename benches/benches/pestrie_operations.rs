// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Load and query throughput benchmarks for `pestrie_core`/`pestrie_loader`.
//!
//! Mirrors the distilled spec's "PesTrie query engine" performance claim
//! (sub-linear `IsAlias`/`ListAliases`) by measuring both the O(log k)
//! point-location path and the shape-enumeration path against synthetic
//! indexes of increasing size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pestrie_core::index::{Index, IndexKind};
use pestrie_core::segment_index::RawColumns;
use pestrie_core::shapes::{insert, ShapeStore};
use pestrie_core::tables::TreeTables;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Builds a synthetic index with `scale` pointers and `scale` objects, one
/// rectangle shape every 4th column so `IsAlias`/`ListAliases` have
/// nontrivial buckets to search.
fn build_index(scale: usize) -> Index {
    let n = scale;
    let m = scale;
    let vertex_num = 2 * scale;
    let pre_order: Vec<i32> = (0..(n + m) as i32).collect();
    let tables = TreeTables::build(&pre_order, n, m, vertex_num);

    let mut shapes = ShapeStore::new();
    let mut raw = RawColumns::new(vertex_num);
    for x in (0..n).step_by(4) {
        let y1 = n + (x % m);
        let y2 = n + ((x + 8).min(m - 1));
        #[allow(
            clippy::cast_possible_truncation,
            reason = "benchmark scales stay well within i32 range"
        )]
        insert::insert_vertical(
            &mut shapes,
            &mut raw,
            x as i32,
            x as i32,
            y1 as i32,
            y2 as i32,
        );
    }
    let segment_index = raw.coalesce(&mut shapes);
    Index::new(
        IndexKind::PointsTo,
        n,
        m,
        vertex_num,
        pre_order,
        tables,
        segment_index,
        shapes,
        0,
    )
}

/// Encodes a scale-`n` index into the on-disk binary format (no shapes),
/// for benchmarking `pestrie_loader::decode`'s header/preV/table-build
/// path in isolation from shape decoding.
fn encode_trivial_index(scale: usize) -> Vec<u8> {
    let n = scale;
    let m = scale;
    let vertex_num = 2 * scale;
    let mut buf = Vec::new();
    buf.extend_from_slice(pestrie_loader::MAGIC_POINTS_TO);
    for v in [n, m, vertex_num - 1, 0, 0, 0, 0] {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "benchmark scales stay well within i32 range"
        )]
        buf.extend_from_slice(&(v as i32).to_ne_bytes());
    }
    for v in 0..(n + m) {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "benchmark scales stay well within i32 range"
        )]
        buf.extend_from_slice(&(v as i32).to_ne_bytes());
    }
    buf
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    for scale in [100usize, 1_000, 10_000] {
        let bytes = encode_trivial_index(scale);
        group.throughput(Throughput::Elements(scale as u64));
        group.bench_with_input(BenchmarkId::from_parameter(scale), &bytes, |b, bytes| {
            b.iter(|| pestrie_loader::decode(black_box(bytes)).unwrap());
        });
    }
    group.finish();
}

fn bench_is_alias(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_alias");
    for scale in [100usize, 1_000, 10_000] {
        let index = build_index(scale);
        let mut rng = StdRng::seed_from_u64(42);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(scale), &index, |b, index| {
            b.iter(|| {
                let x = rng.gen_range(0..scale);
                let y = rng.gen_range(0..scale);
                black_box(index.is_alias(black_box(x), black_box(y)))
            });
        });
    }
    group.finish();
}

fn bench_list_aliases(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_aliases");
    for scale in [100usize, 1_000, 10_000] {
        let index = build_index(scale);
        let mut rng = StdRng::seed_from_u64(42);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(scale), &index, |b, index| {
            b.iter(|| {
                let x = rng.gen_range(0..scale);
                black_box(index.list_aliases(black_box(x), None))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_load, bench_is_alias, bench_list_aliases);
criterion_main!(benches);
