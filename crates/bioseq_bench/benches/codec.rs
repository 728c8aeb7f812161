//! Record codec benchmarks.

use bioseq_bench::random_record;
use bioseq_core::SequenceRecord;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark record encoding.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_encode");

    for len in [32, 256, 2048].iter() {
        group.throughput(Throughput::Bytes(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            let record = random_record(len, 4);
            b.iter(|| black_box(black_box(&record).encode()));
        });
    }
    group.finish();
}

/// Benchmark record decoding.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_decode");

    for len in [32, 256, 2048].iter() {
        group.throughput(Throughput::Bytes(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            let encoded = random_record(len, 4).encode();
            b.iter(|| black_box(SequenceRecord::decode(black_box(&encoded)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark decoding with many classes.
fn bench_decode_classes(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_decode_classes");

    for classes in [1, 16, 128].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(classes),
            classes,
            |b, &classes| {
                let encoded = random_record(128, classes).encode();
                b.iter(|| black_box(SequenceRecord::decode(black_box(&encoded)).unwrap()));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_decode_classes);

criterion_main!(benches);
