#[macro_use]
extern crate criterion;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strainsketch::compare::build_distance_matrix;
use strainsketch::sketch::hyperloglog::HyperLogLog;
use strainsketch::sketch::Estimator;

use criterion::Criterion;

fn random_sequence(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

fn add_sequence(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let data = random_sequence(&mut rng, 100_000);
    let data_lower = data.to_ascii_lowercase();
    let data_errors: Vec<u8> = data
        .iter()
        .enumerate()
        .map(|(i, x)| if i % 89 == 1 { b'N' } else { *x })
        .collect();

    let template = HyperLogLog::new(14, 21).unwrap();

    let mut group = c.benchmark_group("add_sequence");
    group.sample_size(10);

    group.bench_function("valid", |b| {
        b.iter(|| {
            let mut hll = template.clone();
            hll.add_sequence(&data, false).unwrap();
        });
    });

    group.bench_function("lowercase", |b| {
        b.iter(|| {
            let mut hll = template.clone();
            hll.add_sequence(&data_lower, false).unwrap();
        });
    });

    group.bench_function("invalid kmers", |b| {
        b.iter(|| {
            let mut hll = template.clone();
            hll.add_sequence(&data_errors, true).unwrap();
        });
    });
}

fn estimate(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut hll = HyperLogLog::new(14, 21).unwrap();
    for _ in 0..1_000_000 {
        hll.add_hash(rng.gen());
    }
    let mut other = HyperLogLog::new(14, 21).unwrap();
    for _ in 0..1_000_000 {
        other.add_hash(rng.gen());
    }

    let mut group = c.benchmark_group("estimate");

    group.bench_function("classic", |b| {
        b.iter(|| hll.estimate_with(Estimator::Classic));
    });

    group.bench_function("mle", |b| {
        b.iter(|| hll.estimate_with(Estimator::Mle));
    });

    group.bench_function("similarity", |b| {
        b.iter(|| hll.similarity(&other).unwrap());
    });
}

fn distance_matrix(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut sketches = BTreeMap::new();
    for i in 0..50 {
        let mut hll = HyperLogLog::new(12, 21).unwrap();
        for _ in 0..10_000 {
            hll.add_hash(rng.gen());
        }
        sketches.insert(format!("strain{}", i), hll);
    }

    let mut group = c.benchmark_group("compare");
    group.sample_size(10);

    group.bench_function("50 strains", |b| {
        b.iter(|| build_distance_matrix(&sketches).unwrap());
    });
}

criterion_group!(hyperloglog, add_sequence, estimate, distance_matrix);
criterion_main!(hyperloglog);
