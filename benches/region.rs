#![allow(unused)]
extern crate mapregion;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use mapregion::{Config, Encoding, MappedRegion};
use std::hint::black_box;

const SIZE: u64 = 4 << 20;

fn region(max_size: u64) -> MappedRegion {
    let mut region = MappedRegion::new(Config {
        encoding: Encoding::Latin1,
        max_size,
        auto_exit_guard: false,
        ..Config::default()
    })
    .expect("Failed to create region");
    region.open().expect("Failed to open region");
    region
}

/// Benchmark sequential raw writes and reads over a 4 MiB anonymous region
///
/// Writes in 4 KiB chunks so every page boundary is crossed in order.
fn bench_sequential(c: &mut Criterion) {
    let mut region = region(SIZE);
    let chunk = vec![0xA5u8; 4096];

    let mut group = c.benchmark_group("sequential");
    group.throughput(Throughput::Bytes(SIZE));
    group.bench_function("write_raw", |b| {
        b.iter(|| {
            region.seek(0).unwrap();
            while region.write_raw(black_box(&chunk), false).unwrap() > 0 {}
        });
    });
    group.bench_function("read_raw", |b| {
        b.iter(|| {
            region.seek(0).unwrap();
            let mut total = 0;
            loop {
                let bytes = region.read_raw(4096).unwrap();
                if bytes.is_empty() {
                    break;
                }
                total += bytes.len();
            }
            black_box(total)
        });
    });
    group.finish();
}

/// Benchmark edits that shift the whole tail of the region
fn bench_edits(c: &mut Criterion) {
    let mut region = region(1 << 20);

    let mut group = c.benchmark_group("edits");
    group.bench_function("insert_cut_front", |b| {
        b.iter(|| {
            region.seek(0).unwrap();
            region.insert("prefix", false).unwrap();
            region.seek(0).unwrap();
            black_box(region.cut(Some(6), None, false).unwrap())
        });
    });
    group.bench_function("replace_middle", |b| {
        b.iter(|| {
            region.seek(1 << 19).unwrap();
            black_box(region.replace("longer", 3, false, None, false).unwrap());
            region.seek(1 << 19).unwrap();
            black_box(region.replace("abc", 6, false, None, false).unwrap())
        });
    });
    group.finish();
}

/// Benchmark page enumeration with different window sizes
fn bench_pages(c: &mut Criterion) {
    let mut region = region(SIZE);

    let mut group = c.benchmark_group("pages");
    group.throughput(Throughput::Bytes(SIZE));
    for step in [1u64, 16, 256] {
        group.bench_function(format!("step_{step}"), |b| {
            b.iter(|| {
                let windows = region.pages(step).unwrap().count();
                black_box(windows)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sequential, bench_edits, bench_pages);
criterion_main!(benches);
