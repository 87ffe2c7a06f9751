//! Microbenchmarks for the entity-component core using Criterion.
//!
//! These measure individual operations in isolation:
//! - Entity and component attach throughput
//! - Single-type and multi-type iteration
//! - Compaction after churn

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use skein_bench::fixtures::Fixture;

fn bench_attach(c: &mut Criterion) {
    let mut group = c.benchmark_group("attach");

    for count in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("two_components", count), &count, |b, &n| {
            b.iter(|| {
                let mut fixture = Fixture::new();
                let mut rng = ChaCha8Rng::seed_from_u64(7);
                black_box(fixture.spawn(n, &mut rng));
            });
        });
    }

    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    for count in [1_000usize, 10_000, 100_000] {
        group.throughput(Throughput::Elements(count as u64));

        // Single required type, full pass.
        group.bench_with_input(BenchmarkId::new("one_required", count), &count, |b, &n| {
            let mut fixture = Fixture::new();
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            fixture.spawn(n, &mut rng);
            b.iter(|| {
                let mut total = 0u32;
                let mut query = fixture.world.query(&[fixture.position], &[]);
                while query.advance() {
                    total += query.required(0).slot().value();
                }
                black_box(total)
            });
        });

        // Two required types plus an optional sparse type.
        group.bench_with_input(
            BenchmarkId::new("two_required_one_optional", count),
            &count,
            |b, &n| {
                let mut fixture = Fixture::new();
                let mut rng = ChaCha8Rng::seed_from_u64(7);
                fixture.spawn(n, &mut rng);
                b.iter(|| {
                    let mut live = 0u32;
                    let mut query = fixture
                        .world
                        .query(&[fixture.position, fixture.velocity], &[fixture.lifetime]);
                    while query.advance() {
                        if fixture.world.is_alive(&query.optional(0)) {
                            live += 1;
                        }
                    }
                    black_box(live)
                });
            },
        );
    }

    group.finish();
}

fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact");
    group.sample_size(20);

    for count in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("after_half_churn", count), &count, |b, &n| {
            b.iter(|| {
                let mut fixture = Fixture::new();
                let mut rng = ChaCha8Rng::seed_from_u64(7);
                fixture.spawn(n, &mut rng);
                fixture.cull(0.5, &mut rng);
                fixture.world.compact();
                black_box(fixture.world.entity_count())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_attach, bench_iterate, bench_compact);
criterion_main!(benches);
