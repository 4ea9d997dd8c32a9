use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

use gbpair_summary::{GbRange, RangeConfig};
use goldbach_core::{
    count_pairs, count_ranged_pairs, sieve_primes, two_sgb, AvailableDeficit, CompatVersion,
    DeficitConfig, HlCorrInterpolator, PairCursor, WindowPolicy,
};

fn bench_count_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_pairs");
    let primes = sieve_primes(2_100_000);
    let mut rng = rand::thread_rng();

    for n in [10_000u64, 100_000, 1_000_000] {
        let n = n + rng.gen_range(0..1_000);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| count_pairs(n, &primes));
        });
    }

    group.finish();
}

fn bench_windowed_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowed_sweep");
    group.sample_size(10);
    let primes = sieve_primes(220_000);

    for alpha in [0.1f64, 0.5, 1.0] {
        let policy = WindowPolicy::new(alpha, CompatVersion::Current, true);
        group.bench_with_input(BenchmarkId::from_parameter(alpha), &policy, |b, policy| {
            b.iter(|| {
                let mut cursor = PairCursor::new();
                let mut total = 0u64;
                for n in 100_000..101_000u64 {
                    cursor.start();
                    let delta = policy.delta(n).unwrap_or(0);
                    total += count_ranged_pairs(n, n - delta - 1, &primes, &mut cursor).unwrap_or(0);
                }
                total
            });
        });
    }

    group.finish();
}

fn bench_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("models");
    let primes = sieve_primes(100_000);
    let n = 1_000_003u64;

    group.bench_function("two_sgb", |b| b.iter(|| two_sgb(n, &primes)));

    let mut deficit = AvailableDeficit::new(DeficitConfig::bound_positive());
    group.bench_function("deficit_fixed_n", |b| {
        let mut w = 1u64;
        b.iter(|| {
            w = w % 10_000 + 1;
            deficit.eval(n, w)
        });
    });

    let policy = WindowPolicy::new(0.5, CompatVersion::Current, true);
    let mut interp = HlCorrInterpolator::new();
    interp.init(1_000_000, 10_000_000);
    interp.prescan_all(|m| policy.delta(m).unwrap_or(0));
    group.bench_function("hl_corr_interpolated", |b| {
        let mut m = 1_000_000u64;
        b.iter(|| {
            m = if m >= 9_999_000 { 1_000_000 } else { m + 997 };
            interp.eval(m, policy.delta(m).unwrap_or(0))
        });
    });

    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("gb_range");
    group.sample_size(10);
    let dir = tempfile::tempdir().unwrap();
    let primes = sieve_primes(41_000);

    for n_end in [2_000u64, 20_000] {
        let mut config = RangeConfig {
            alphas: vec![0.25, 0.5],
            n_end: Some(n_end),
            ..RangeConfig::default()
        };
        config.decade.outputs.full = Some(dir.path().join("dec_-=ALPHA=-.csv").display().to_string());
        config.primorial.outputs.full = Some(dir.path().join("prim_-=ALPHA=-.csv").display().to_string());
        config.validate().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n_end), &config, |b, config| {
            b.iter(|| {
                let mut range = GbRange::new(config, &primes).unwrap();
                range.run().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_count_pairs,
    bench_windowed_sweep,
    bench_models,
    bench_range
);
criterion_main!(benches);
