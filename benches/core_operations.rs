use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memchain::*;

fn populated_chain(size: usize) -> Chain {
    let mut chain = Chain::new();
    for i in 0..size {
        chain
            .learn(&format!("key_{}", i), &format!("value_{}", i))
            .unwrap();
    }
    chain
}

fn bench_content_hash(c: &mut Criterion) {
    c.bench_function("content_hash", |b| {
        b.iter(|| content_hash(black_box("some input text"), black_box("some output text")))
    });
}

fn bench_learn(c: &mut Criterion) {
    c.bench_function("learn", |b| {
        b.iter_batched(
            || populated_chain(MAX_BLOCKS - 1),
            |mut chain| chain.learn("new_key", "new_value").unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_reason(c: &mut Criterion) {
    let mut group = c.benchmark_group("reason");

    for chain_size in [16, 64, 128].iter() {
        group.bench_with_input(
            BenchmarkId::new("exact", chain_size),
            chain_size,
            |b, &size| {
                let mut chain = populated_chain(size);
                let query = format!("key_{}", size / 2);
                b.iter(|| chain.reason(black_box(&query)))
            },
        );
        group.bench_with_input(
            BenchmarkId::new("fuzzy", chain_size),
            chain_size,
            |b, &size| {
                let chain = populated_chain(size);
                let query = format!("kee_{}", size / 2);
                b.iter(|| chain.fuzzy_match(black_box(&query)))
            },
        );
    }
    group.finish();
}

fn bench_maintenance(c: &mut Criterion) {
    let mut group = c.benchmark_group("maintenance");

    for chain_size in [32, 128].iter() {
        group.bench_with_input(
            BenchmarkId::new("prune", chain_size),
            chain_size,
            |b, &size| {
                b.iter_batched(
                    || {
                        let mut chain = populated_chain(size);
                        chain.decay_confidence(0.48);
                        chain
                    },
                    |mut chain| chain.prune(MIN_CONFIDENCE),
                    criterion::BatchSize::SmallInput,
                )
            },
        );
        group.bench_with_input(
            BenchmarkId::new("compact", chain_size),
            chain_size,
            |b, &size| {
                b.iter_batched(
                    || {
                        let mut chain = populated_chain(size);
                        for block in chain.blocks.iter_mut().step_by(2) {
                            block.attributes.valid = false;
                        }
                        chain
                    },
                    |mut chain| chain.compact(),
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_verification(c: &mut Criterion) {
    let chain = populated_chain(MAX_BLOCKS);

    c.bench_function("verify_chain", |b| b.iter(|| black_box(chain.verify())));
    c.bench_function("fingerprint", |b| b.iter(|| black_box(chain.fingerprint())));
}

criterion_group!(
    benches,
    bench_content_hash,
    bench_learn,
    bench_reason,
    bench_maintenance,
    bench_verification
);
criterion_main!(benches);
