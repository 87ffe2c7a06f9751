//! Sustained-churn scenario benchmarks.
//!
//! Unlike the microbenchmarks, these measure whole frames of a
//! particle-style workload: integrate movement, cull a fraction of the
//! population, respawn replacements, and compact periodically. This is the
//! usage pattern the columnar layout is built for.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use skein_bench::fixtures::Fixture;

/// Frames simulated per measured iteration.
const FRAMES: usize = 10;

/// Fraction of the population culled each frame.
const CHURN: f64 = 0.05;

fn bench_particle_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("particles");
    group.sample_size(10);

    for count in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements((count * FRAMES) as u64));

        group.bench_with_input(BenchmarkId::new("frame_loop", count), &count, |b, &n| {
            b.iter(|| {
                let _profile = skein_bench::memory::heap_profile();
                let mut fixture = Fixture::new();
                let mut rng = ChaCha8Rng::seed_from_u64(42);
                fixture.spawn(n, &mut rng);

                for frame in 0..FRAMES {
                    fixture.step(1.0 / 60.0);
                    fixture.cull(CHURN, &mut rng);
                    let deficit = n.saturating_sub(fixture.world.entity_count() as usize);
                    fixture.spawn(deficit, &mut rng);
                    if frame % 4 == 3 {
                        fixture.world.compact();
                    }
                }
                black_box(fixture.world.entity_count())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_particle_frames);
criterion_main!(benches);
