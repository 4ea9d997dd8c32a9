//! Singular series of the Hardy–Littlewood Goldbach prediction.

use crate::constants::TWIN_PRIME_C2;

/// `2·S(2n) = 4·C2·∏_{p | n, p odd} (p-1)/(p-2)`.
///
/// Odd prime factors of n are found by trial division with `primes`
/// (ascending, starting at 2); whatever cofactor remains after the table
/// passes sqrt is treated as a single prime factor.
pub fn two_sgb(n: u64, primes: &[u64]) -> f64 {
    let base = 4.0 * TWIN_PRIME_C2;
    let n = odd_part(n);
    if n <= 1 {
        return base;
    }
    let mut s = base;
    let mut r = n;
    for &p in primes.iter().skip(1) {
        match p.checked_mul(p) {
            Some(sq) if sq <= r => {}
            _ => break,
        }
        if r % p == 0 {
            if p >= 3 {
                s *= (p - 1) as f64 / (p - 2) as f64;
            }
            while r % p == 0 {
                r /= p;
            }
        }
    }
    if r >= 3 {
        s *= (r - 1) as f64 / (r - 2) as f64;
    }
    s
}

fn odd_part(n: u64) -> u64 {
    if n == 0 {
        0
    } else {
        n >> n.trailing_zeros()
    }
}
