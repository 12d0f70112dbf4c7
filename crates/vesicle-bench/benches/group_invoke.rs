//! Criterion benchmarks for whole-group invocation.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use vesicle_bench::{batched_profile, reference_profile, transpose_profile};

fn bench_softmax_1k(c: &mut Criterion) {
    let mut model = reference_profile(42).unwrap();

    // Warm up: first invocation grows the scratch region
    model.invoke_group("Softmax").unwrap();

    c.bench_function("softmax_1k", |b| {
        b.iter(|| {
            let metrics = model.invoke_group("Softmax").unwrap();
            black_box(&metrics);
        });
    });
}

fn bench_softmax_1k_batch_32(c: &mut Criterion) {
    let mut model = batched_profile(42).unwrap();
    model.invoke_group("Softmax").unwrap();

    c.bench_function("softmax_1k_batch_32", |b| {
        b.iter(|| {
            let metrics = model.invoke_group("Softmax").unwrap();
            black_box(&metrics);
        });
    });
}

fn bench_transpose_256(c: &mut Criterion) {
    let mut model = transpose_profile(256, 1, 42).unwrap();

    c.bench_function("transpose_256", |b| {
        b.iter(|| {
            let metrics = model.invoke_group("Transpose").unwrap();
            black_box(&metrics);
        });
    });
}

criterion_group!(
    benches,
    bench_softmax_1k,
    bench_softmax_1k_batch_32,
    bench_transpose_256
);
criterion_main!(benches);
