#![allow(missing_docs)]

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use sgobject::{Context, FileFormat, Managed, Parameterized, SGMatrix, SGVector, Serializer};
use std::hint::black_box;

#[derive(Default, Parameterized)]
struct BenchKernel {
    width: f64,
    cache: SGMatrix<f64>,
}

#[derive(Default, Parameterized)]
struct BenchModel {
    bias: f64,
    weights: SGVector<f64>,
    labels: Vec<i32>,
    kernel: Option<Managed<BenchKernel>>,
}

fn generate_model(ctx: &Context, len: usize) -> Managed<BenchModel> {
    let side = 64;
    let cache = SGMatrix::from_vec((0..side * side).map(|i| i as f64 * 0.5).collect(), side, side)
        .expect("Failed to build matrix");
    let kernel = Managed::new(ctx, BenchKernel { width: 1.5, cache });
    Managed::new(
        ctx,
        BenchModel {
            bias: 0.25,
            weights: (0..len).map(|i| i as f64 / 3.0).collect(),
            labels: (0..len).map(|i| (i % 7) as i32).collect(),
            kernel: Some(kernel),
        },
    )
}

// --- BENCHMARKS ---

fn bench_writers(c: &mut Criterion) {
    let len = 100_000;
    let ctx = Context::new();
    let model = generate_model(&ctx, len);

    println!("Writers element count: {}", len);

    let mut group = c.benchmark_group("Serialization Write");
    group.throughput(Throughput::Elements((len * 2) as u64));

    for format in [FileFormat::Ascii, FileFormat::Json, FileFormat::Binary] {
        let builder = Serializer::builder().format(format);
        group.bench_function(format!("{format}_write"), |b| {
            b.iter(|| {
                let bytes = builder.to_bytes(black_box(&model)).expect("Failed to serialize");
                black_box(bytes);
            });
        });
    }

    group.finish();
}

fn bench_readers(c: &mut Criterion) {
    let len = 100_000;
    let ctx = Context::new();
    ctx.register::<BenchModel>().register::<BenchKernel>();
    let model = generate_model(&ctx, len);

    println!("Readers element count: {}", len);

    let mut group = c.benchmark_group("Deserialization Read");
    group.throughput(Throughput::Elements((len * 2) as u64));

    for format in [FileFormat::Ascii, FileFormat::Binary] {
        let bytes = Serializer::builder()
            .format(format)
            .to_bytes(&model)
            .expect("Failed to serialize");
        group.bench_function(format!("{format}_read"), |b| {
            b.iter(|| {
                let obj = Serializer::load_bytes(black_box(&bytes), &ctx).expect("Failed to load");
                black_box(obj);
            });
        });
    }

    group.bench_function("clone_object", |b| {
        b.iter(|| {
            let copy = model.clone_object().expect("Failed to clone");
            black_box(copy);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_writers, bench_readers);
criterion_main!(benches);
