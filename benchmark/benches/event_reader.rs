// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Event reader microbenchmarks.
//!
//! Measures polling latency for fresh records at various report sizes and
//! the cost of scanning past a backlog of stale report responses.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hidring_benchmark::{fill_reports, fixture_ring, report_payload, FIXTURE_NOW};
use hidring_core::{EventKind, EventReader, HeaderFormat, ManualClock, ReportLayout, RingProducer};
use std::time::Duration;

/// Report sizes to benchmark (in bytes).
const REPORT_SIZES: &[usize] = &[8, 64, 256, 704];

const MAX_PAYLOAD: usize = 0x2C8;

/// Benchmark a write followed by a fresh read.
fn bench_fresh_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("fresh_roundtrip");
    group.measurement_time(Duration::from_secs(5));

    for &size in REPORT_SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let ring = fixture_ring(64 * 1024, HeaderFormat::Packed).expect("Failed to create ring");
            let clock = ManualClock::new(FIXTURE_NOW);
            let producer = RingProducer::new(&ring, &clock);
            let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
            let payload = report_payload(size);

            b.iter(|| {
                producer.write(EventKind::GetReport, black_box(&payload)).ok();
                black_box(reader.next_event(&ring, MAX_PAYLOAD).ok());
            });
        });
    }

    group.finish();
}

/// Benchmark one poll that discards a backlog of stale reports.
fn bench_stale_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("stale_scan");
    group.measurement_time(Duration::from_secs(5));

    for &backlog in &[1usize, 16, 128, 512] {
        group.throughput(Throughput::Elements(backlog as u64));

        group.bench_with_input(BenchmarkId::from_parameter(backlog), &backlog, |b, &backlog| {
            let clock = ManualClock::new(FIXTURE_NOW);
            b.iter_batched(
                || {
                    let ring =
                        fixture_ring(64 * 1024, HeaderFormat::Packed).expect("Failed to create ring");
                    fill_reports(&ring, backlog, 8, 500_000_000);
                    ring
                },
                |ring| {
                    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
                    black_box(reader.next_event(&ring, MAX_PAYLOAD).ok());
                    ring
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark freeing records without decoding them.
fn bench_free(c: &mut Criterion) {
    c.bench_function("free", |b| {
        let ring = fixture_ring(64 * 1024, HeaderFormat::Native).expect("Failed to create ring");
        let producer = RingProducer::new(&ring, ManualClock::new(FIXTURE_NOW));
        let payload = report_payload(32);

        b.iter(|| {
            producer.write(EventKind::GetReport, &payload).ok();
            black_box(ring.free().ok());
        });
    });
}

criterion_group!(benches, bench_fresh_roundtrip, bench_stale_scan, bench_free);
criterion_main!(benches);
