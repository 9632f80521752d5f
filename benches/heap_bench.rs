#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sgobject::FibonacciHeap;
use std::hint::black_box;

// Deterministic pseudo-random keys.
fn keys(count: usize) -> Vec<f64> {
    let mut state = 0x2545_f491_4f6c_dd1d_u64;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 1_000_000) as f64
        })
        .collect()
}

fn bench_heap(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fibonacci Heap");

    for count in [1_000usize, 100_000] {
        let keys = keys(count);

        group.bench_with_input(BenchmarkId::new("insert_drain", count), &keys, |b, keys| {
            let mut heap = FibonacciHeap::new(keys.len());
            b.iter(|| {
                for (item, key) in keys.iter().enumerate() {
                    heap.insert(item, *key);
                }
                while let Some(item) = heap.delete_min() {
                    black_box(item);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("decrease_key", count), &keys, |b, keys| {
            let mut heap = FibonacciHeap::new(keys.len());
            b.iter(|| {
                heap.clear();
                for (item, key) in keys.iter().enumerate() {
                    heap.insert(item, *key + 1_000_000.0);
                }
                for (item, key) in keys.iter().enumerate() {
                    heap.decrease_key(item, *key);
                }
                black_box(heap.extract_min());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_heap);
criterion_main!(benches);
