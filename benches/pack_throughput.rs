//! `PackData` + `Sync` throughput benchmark.
//!
//! Measures bytes/sec for building a package of many small entries and for
//! one large entry, in the same `harness = false` style as the teacher's
//! `compaction_bench`.
//!
//! Run: cargo bench --bench pack_throughput

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use packfs::header::TypeSize;
use packfs::writer::{PackOptions, PackWriter};

fn build_package(entry_count: usize, entry_size: usize) -> usize {
    let writer = PackWriter::new(PackOptions { typesize: TypeSize::COMMON, ..Default::default() });
    let mut buf = Cursor::new(Vec::new());
    let body = vec![0xABu8; entry_size];

    writer.begin::<_, Cursor<Vec<u8>>>(&mut buf, None).unwrap();
    for i in 0..entry_count {
        writer.pack_data(&mut buf, body.as_slice(), &format!("entry_{i}")).unwrap();
    }
    writer.sync::<_, Cursor<Vec<u8>>>(&mut buf, None).unwrap();
    buf.get_ref().len()
}

fn bench_many_small_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_many_small_entries");
    for &count in &[100usize, 1_000, 10_000] {
        group.throughput(Throughput::Bytes((count * 256) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(build_package(count, 256)));
        });
    }
    group.finish();
}

fn bench_one_large_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_one_large_entry");
    for &size in &[1 << 16, 1 << 20, 1 << 24] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(build_package(1, size)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_many_small_entries, bench_one_large_entry);
criterion_main!(benches);
