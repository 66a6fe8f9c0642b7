use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use tart::{tests_common::setup_index_from_values, ArtIndex, BigEndianU64};

const NUM_KEYS: usize = 100_000;

fn generate_values(seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_KEYS)
        .map(|_| rng.random_range(0..u64::MAX >> 1))
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let values = generate_values(0xA57);

    c.bench_function("insert/random_u64", |b| {
        b.iter_batched(
            || values.clone(),
            |values| {
                let mut index = ArtIndex::new(BigEndianU64);
                for value in values {
                    index
                        .insert(&value.to_be_bytes(), value as usize)
                        .unwrap();
                }
                index
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_get(c: &mut Criterion) {
    let values = generate_values(0xA57);
    let index = setup_index_from_values(values.iter().copied());

    let mut cursor = 0;
    c.bench_function("get/random_u64_hit", |b| {
        b.iter(|| {
            cursor = (cursor + 1) % values.len();
            let key = values[cursor].to_be_bytes();
            black_box(index.get(black_box(&key)))
        })
    });

    let mut rng = StdRng::seed_from_u64(0x1D1);
    c.bench_function("get/random_u64_mixed", |b| {
        b.iter(|| {
            let probe: u64 = rng.random_range(0..u64::MAX >> 1);
            black_box(index.get(black_box(&probe.to_be_bytes())))
        })
    });
}

fn bench_remove_reinsert(c: &mut Criterion) {
    let values = generate_values(0xBEE);
    let mut index = setup_index_from_values(values.iter().copied());

    let mut cursor = 0;
    c.bench_function("remove_reinsert/random_u64", |b| {
        b.iter(|| {
            cursor = (cursor + 1) % values.len();
            let value = values[cursor];
            let key = value.to_be_bytes();
            if let Some(removed) = index.remove(&key) {
                index.insert(&key, removed).unwrap();
            }
        })
    });
}

fn bench_minmax(c: &mut Criterion) {
    let values = generate_values(0xF00);
    let index = setup_index_from_values(values.iter().copied());

    c.bench_function("minimum/random_u64", |b| {
        b.iter(|| black_box(index.minimum()))
    });
    c.bench_function("maximum/random_u64", |b| {
        b.iter(|| black_box(index.maximum()))
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_get,
    bench_remove_reinsert,
    bench_minmax
);
criterion_main!(benches);
