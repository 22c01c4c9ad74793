//! Fragment framing benchmarks.

use chronowal_bench::random_data;
use chronowal_core::{checksum, encode_fragment, FragmentKind, HEADER_SIZE, PAGE_SIZE};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark CRC32C over fragment-sized payloads.
fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");

    for size in [64, 1024, PAGE_SIZE - HEADER_SIZE].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = random_data(size);
            b.iter(|| black_box(checksum(black_box(&data))));
        });
    }

    group.finish();
}

/// Benchmark encoding one fragment into a page buffer.
fn bench_encode_fragment(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_fragment");

    for size in [64, 1024, PAGE_SIZE - HEADER_SIZE].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = random_data(size);
            let mut page = vec![0u8; PAGE_SIZE];
            b.iter(|| {
                let n = encode_fragment(&mut page, FragmentKind::Full, black_box(&data)).unwrap();
                black_box(n);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_checksum, bench_encode_fragment);
criterion_main!(benches);
