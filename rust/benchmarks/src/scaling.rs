//! Scaling runs for the pair counter.
//!
//! Times a full-window sweep over blocks of n at increasing magnitudes and
//! a single fresh count at random points, then fits the empirical exponent
//! of time against n.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use goldbach_core::{
    count_pairs, count_ranged_pairs, sieve_primes, CompatVersion, PairCursor, WindowPolicy,
};

/// n values swept per magnitude.
const BLOCK: u64 = 2_000;
/// Random single counts per magnitude.
const SAMPLES: usize = 20;

struct Measurement {
    n: u64,
    sweep: Duration,
    single: Duration,
    pairs: u64,
}

/// Least-squares slope of log(time) against log(n).
fn fit_exponent(points: &[(f64, f64)]) -> Option<f64> {
    let valid: Vec<(f64, f64)> = points
        .iter()
        .filter(|(x, y)| *x > 0.0 && *y > 0.0)
        .map(|(x, y)| (x.ln(), y.ln()))
        .collect();
    if valid.len() < 2 {
        return None;
    }
    let k = valid.len() as f64;
    let mx = valid.iter().map(|p| p.0).sum::<f64>() / k;
    let my = valid.iter().map(|p| p.1).sum::<f64>() / k;
    let sxy: f64 = valid.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
    let sxx: f64 = valid.iter().map(|(x, _)| (x - mx) * (x - mx)).sum();
    (sxx > 0.0).then(|| sxy / sxx)
}

fn measure(n: u64, primes: &[u64], policy: &WindowPolicy, rng: &mut StdRng) -> Measurement {
    let mut cursor = PairCursor::new();
    let mut pairs = 0u64;
    let start = Instant::now();
    for m in n..n + BLOCK {
        cursor.start();
        let delta = policy.delta(m).unwrap_or(0);
        pairs += count_ranged_pairs(m, m - delta - 1, primes, &mut cursor).unwrap_or(0);
    }
    let sweep = start.elapsed();

    let start = Instant::now();
    for _ in 0..SAMPLES {
        let m = rng.gen_range(n..n + BLOCK);
        let _ = count_pairs(m, primes);
    }
    let single = start.elapsed() / SAMPLES as u32;

    Measurement { n, sweep, single, pairs }
}

fn main() {
    println!("================================================================");
    println!("  SCALING: Goldbach pair counting, full window (alpha = 1)");
    println!("================================================================\n");

    let magnitudes: Vec<u64> = (3..=7).map(|e| 10u64.pow(e)).collect();
    let limit = 2 * (magnitudes[magnitudes.len() - 1] + BLOCK) + 1_024;
    let sieve_start = Instant::now();
    let primes = sieve_primes(limit);
    println!(
        "sieved {} primes up to {} in {:.2?}\n",
        primes.len(),
        limit,
        sieve_start.elapsed()
    );

    let policy = WindowPolicy::new(1.0, CompatVersion::Current, false);
    let mut rng = StdRng::seed_from_u64(12345);

    println!(
        "{:>12} {:>14} {:>14} {:>14}",
        "n", "sweep/n (us)", "single (us)", "avg pairs"
    );
    let mut results = Vec::new();
    for &n in &magnitudes {
        let m = measure(n, &primes, &policy, &mut rng);
        println!(
            "{:>12} {:>14.3} {:>14.3} {:>14.1}",
            m.n,
            m.sweep.as_secs_f64() * 1e6 / BLOCK as f64,
            m.single.as_secs_f64() * 1e6,
            m.pairs as f64 / BLOCK as f64
        );
        results.push(m);
    }

    let sweep_points: Vec<(f64, f64)> = results
        .iter()
        .map(|m| (m.n as f64, m.sweep.as_secs_f64()))
        .collect();
    let single_points: Vec<(f64, f64)> = results
        .iter()
        .map(|m| (m.n as f64, m.single.as_secs_f64()))
        .collect();

    println!();
    match fit_exponent(&sweep_points) {
        Some(e) => println!("sweep exponent:  time ~ n^{:.3}", e),
        None => println!("sweep exponent:  not enough data"),
    }
    match fit_exponent(&single_points) {
        Some(e) => println!("single exponent: time ~ n^{:.3}", e),
        None => println!("single exponent: not enough data"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_exponent_recovers_power_law() {
        let points: Vec<(f64, f64)> = [10.0f64, 100.0, 1_000.0, 10_000.0]
            .iter()
            .map(|&x| (x, 3.0 * x.powf(1.5)))
            .collect();
        let e = fit_exponent(&points).unwrap();
        assert!((e - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_fit_exponent_needs_two_points() {
        assert!(fit_exponent(&[(10.0, 1.0)]).is_none());
        assert!(fit_exponent(&[(10.0, 0.0), (100.0, 0.0)]).is_none());
    }
}
