//! Flag transition benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dirtymark_bench::{file_store, memory_store};

/// Benchmark the lock-free path where the flag already has the target value.
fn bench_fast_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("fast_path");

    group.bench_function("mark_dirty_already_dirty", |b| {
        let store = memory_store().unwrap();
        b.iter(|| {
            store.mark_dirty().unwrap();
            black_box(store.is_dirty());
        });
    });

    group.bench_function("is_dirty", |b| {
        let store = memory_store().unwrap();
        b.iter(|| black_box(store.is_dirty()));
    });

    group.finish();
}

/// Benchmark transitions that take the mutex and persist a record.
fn bench_persisting_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("persisting_path");

    group.bench_function("memory_toggle", |b| {
        let store = memory_store().unwrap();
        b.iter(|| {
            store.clear_dirty().unwrap();
            store.mark_dirty().unwrap();
        });
    });

    group.bench_function("file_toggle_nosync", |b| {
        let (_dir, store) = file_store(false).unwrap();
        b.iter(|| {
            store.clear_dirty().unwrap();
            store.mark_dirty().unwrap();
        });
    });

    // fsync dominates; keep the sample small
    group.sample_size(20);
    group.bench_function("file_toggle_sync", |b| {
        let (_dir, store) = file_store(true).unwrap();
        b.iter(|| {
            store.clear_dirty().unwrap();
            store.mark_dirty().unwrap();
        });
    });

    group.finish();
}

/// Benchmark open of an existing marker file.
fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("open");
    group.sample_size(50);

    group.bench_function("reopen_file", |b| {
        let (_dir, store) = file_store(false).unwrap();
        store.close().unwrap();
        b.iter(|| {
            store.open().unwrap();
            store.close().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fast_path, bench_persisting_path, bench_open);
criterion_main!(benches);
