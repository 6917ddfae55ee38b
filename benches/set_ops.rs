//! Benchmarks for both pole set variants against `BTreeSet`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pole_set::{PoleSet, UnrolledPoleSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

fn sequential_keys(n: usize) -> Vec<i32> {
    (0..n as i32).collect()
}

fn random_keys(n: usize) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|_| rng.gen_range(0..i32::MAX)).collect()
}

fn workloads(n: usize) -> [(&'static str, Vec<i32>); 2] {
    [("seq", sequential_keys(n)), ("random", random_keys(n))]
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in SIZES {
        for (name, keys) in workloads(size) {
            group.bench_with_input(
                BenchmarkId::new(format!("PoleSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut set = PoleSet::new();
                        for &k in keys {
                            set.insert(k);
                        }
                        black_box(set)
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("UnrolledPoleSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut set = UnrolledPoleSet::new();
                        for &k in keys {
                            set.insert(k);
                        }
                        black_box(set)
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("BTreeSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut set = BTreeSet::new();
                        for &k in keys {
                            set.insert(k);
                        }
                        black_box(set)
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");

    for size in SIZES {
        for (name, keys) in workloads(size) {
            let plain: PoleSet<i32> = keys.iter().copied().collect();
            let unrolled: UnrolledPoleSet<i32> = keys.iter().copied().collect();
            let btree: BTreeSet<i32> = keys.iter().copied().collect();

            group.bench_with_input(
                BenchmarkId::new(format!("PoleSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut hits = 0usize;
                        for k in keys {
                            hits += usize::from(plain.find(k));
                        }
                        black_box(hits)
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("UnrolledPoleSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut hits = 0usize;
                        for k in keys {
                            hits += usize::from(unrolled.find(k));
                        }
                        black_box(hits)
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("BTreeSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut hits = 0usize;
                        for k in keys {
                            hits += usize::from(btree.contains(k));
                        }
                        black_box(hits)
                    });
                },
            );
        }
    }

    group.finish();
}

/// Alternating insert and lookup, the pattern that grows the pole index
/// while it is being used.
fn bench_insert_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_find");

    for size in SIZES {
        for (name, keys) in workloads(size) {
            group.bench_with_input(
                BenchmarkId::new(format!("PoleSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut set = PoleSet::new();
                        let mut hits = 0usize;
                        for &k in keys {
                            set.insert(k);
                            hits += usize::from(set.find(&k));
                        }
                        black_box(hits)
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("UnrolledPoleSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut set = UnrolledPoleSet::new();
                        let mut hits = 0usize;
                        for &k in keys {
                            set.insert(k);
                            hits += usize::from(set.find(&k));
                        }
                        black_box(hits)
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("BTreeSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter(|| {
                        let mut set = BTreeSet::new();
                        let mut hits = 0usize;
                        for &k in keys {
                            set.insert(k);
                            hits += usize::from(set.contains(&k));
                        }
                        black_box(hits)
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove");

    for size in SIZES {
        for (name, keys) in workloads(size) {
            let plain: PoleSet<i32> = keys.iter().copied().collect();
            let unrolled: UnrolledPoleSet<i32> = keys.iter().copied().collect();
            let btree: BTreeSet<i32> = keys.iter().copied().collect();

            group.bench_with_input(
                BenchmarkId::new(format!("PoleSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter_batched(
                        || plain.clone(),
                        |mut set| {
                            for k in keys {
                                set.remove(k);
                            }
                            black_box(set)
                        },
                        criterion::BatchSize::LargeInput,
                    );
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("UnrolledPoleSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter_batched(
                        || unrolled.clone(),
                        |mut set| {
                            for k in keys {
                                set.remove(k);
                            }
                            black_box(set)
                        },
                        criterion::BatchSize::LargeInput,
                    );
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("BTreeSet/{name}"), size),
                &keys,
                |b, keys| {
                    b.iter_batched(
                        || btree.clone(),
                        |mut set| {
                            for k in keys {
                                set.remove(k);
                            }
                            black_box(set)
                        },
                        criterion::BatchSize::LargeInput,
                    );
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_find, bench_insert_find, bench_remove);
criterion_main!(benches);
