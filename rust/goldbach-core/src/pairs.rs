//! Two-pointer Goldbach pair counting.
//!
//! For 2n = p + q the walk keeps `hi` on primes above n and `lo` on primes
//! at or below n. When the sum is too large `lo` steps down; when it is too
//! small `hi` steps up. Across an increasing sweep of n the anchor
//! `current` (first prime > n) only moves forward by a few slots, so the
//! positioning cost is amortized O(1) per n.

use crate::error::{GoldbachError, Result};
use crate::primes::is_prime;

/// Persistent walk state for a sweep over increasing n.
///
/// `current` survives the whole sweep. `lo`/`hi` are scratch positions for
/// one n: several windows of the same n (processed in ascending half-width)
/// continue the walk where the previous window stopped. Call
/// [`PairCursor::start`] before the first window of every new n.
#[derive(Debug, Clone, Default)]
pub struct PairCursor {
    current: usize,
    lo: Option<usize>,
    hi: Option<usize>,
}

impl PairCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new n, keeping `current` as the starting point of the nudge.
    pub fn start(&mut self) {
        self.lo = None;
        self.hi = None;
    }

    /// Index of the first prime known to exceed the last n.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn lo(&self) -> Option<usize> {
        self.lo
    }

    pub fn hi(&self) -> Option<usize> {
        self.hi
    }

    /// Whether n itself is prime, judged from the prime just below `current`.
    ///
    /// Only meaningful after a count for the same n has positioned the cursor.
    pub fn is_n_prime(&self, n: u64, primes: &[u64]) -> bool {
        self.current > 0 && self.current < primes.len() && primes[self.current - 1] == n
    }

    /// Position `current` on the first prime strictly greater than n.
    ///
    /// Only nudges linearly from the previous position. Returns the index,
    /// which equals `primes.len()` when no larger prime exists.
    pub fn seek(&mut self, n: u64, primes: &[u64]) -> usize {
        if primes.is_empty() {
            self.current = 0;
            return 0;
        }
        let mut cur = self.current.min(primes.len() - 1);
        if primes[cur] <= n {
            while cur < primes.len() && primes[cur] <= n {
                cur += 1;
            }
        } else {
            while cur > 0 && primes[cur - 1] > n {
                cur -= 1;
            }
        }
        self.current = cur;
        cur
    }
}

/// Count ordered pairs (p, q), p + q = 2n, with both primes above `n_min`.
///
/// The diagonal p = q = n is never counted; see [`PairCursor::is_n_prime`].
/// The first call for an n aligns the cursor; later calls for the same n
/// with a smaller `n_min` continue the walk and return only the new pairs.
///
/// # Arguments
/// * `n` - half of the even number 2n
/// * `n_min` - exclusive lower bound on the smaller prime (n - delta - 1 for a window)
/// * `primes` - ascending prime table
/// * `cursor` - walk state shared across the sweep
///
/// # Errors
/// [`GoldbachError::PrimesExhausted`] when the walk needs a prime beyond the
/// end of the table.
pub fn count_ranged_pairs(n: u64, n_min: u64, primes: &[u64], cursor: &mut PairCursor) -> Result<u64> {
    let two_n = n << 1;
    let highest = primes.len();

    let mut hi = match cursor.hi {
        Some(hi) => hi,
        None => {
            let hi = cursor.seek(n, primes);
            if hi >= highest {
                cursor.current = highest;
                return Err(GoldbachError::PrimesExhausted { n });
            }
            cursor.hi = Some(hi);
            if hi == 0 {
                return Ok(0);
            }
            cursor.lo = Some(hi - 1);
            hi
        }
    };

    let mut lo = cursor.lo;
    let mut count = 0u64;
    while let Some(l) = lo {
        let p = primes[l];
        if p <= n_min {
            break;
        }
        let need = two_n - p;
        let q = primes[hi];
        if q > need {
            lo = l.checked_sub(1);
        } else if q < need {
            hi += 1;
            if hi >= highest {
                cursor.lo = lo;
                cursor.hi = Some(hi);
                return Err(GoldbachError::PrimesExhausted { n });
            }
        } else {
            count += 2;
            lo = l.checked_sub(1);
            hi += 1;
            if hi >= highest {
                cursor.lo = lo;
                cursor.hi = Some(hi);
                return Err(GoldbachError::PrimesExhausted { n });
            }
        }
    }
    cursor.lo = lo;
    cursor.hi = Some(hi);
    Ok(count)
}

/// Count every ordered off-diagonal pair for 2n on a fresh cursor.
pub fn count_pairs(n: u64, primes: &[u64]) -> Result<u64> {
    let mut cursor = PairCursor::new();
    count_ranged_pairs(n, 0, primes, &mut cursor)
}

/// Smallest m > 0 such that n - m and n + m are both prime.
///
/// Returns `Ok(None)` when 2n has no off-diagonal decomposition with an odd
/// smaller prime.
pub fn find_pair(n: u64, primes: &[u64], cursor: &mut PairCursor) -> Result<Option<u64>> {
    let two_n = n << 1;
    let highest = primes.len();
    let mut hi = cursor.seek(n, primes);
    if hi >= highest {
        cursor.current = highest;
        return Err(GoldbachError::PrimesExhausted { n });
    }
    let mut lo = hi.checked_sub(1);
    while let Some(l) = lo {
        let p = primes[l];
        if p <= 2 {
            break;
        }
        let need = two_n - p;
        let q = primes[hi];
        if q > need {
            lo = l.checked_sub(1);
        } else if q < need {
            hi += 1;
            if hi >= highest {
                return Err(GoldbachError::PrimesExhausted { n });
            }
        } else {
            return Ok(Some(n - p));
        }
    }
    Ok(None)
}

/// Direct enumeration of ordered off-diagonal pairs with both primes above `n_min`.
///
/// Reference implementation for tests; O(n·sqrt(n)).
pub fn brute_force_pairs(n: u64, n_min: u64) -> u64 {
    let two_n = 2 * n;
    (n_min + 1..n)
        .filter(|&p| is_prime(p) && is_prime(two_n - p))
        .count() as u64
        * 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primes::sieve_primes;

    #[test]
    fn test_ten_has_one_offdiagonal_pair() {
        // 10 = 3 + 7 = 5 + 5; the diagonal (5, 5) is excluded.
        let primes = sieve_primes(100);
        let mut cursor = PairCursor::new();
        cursor.start();
        assert_eq!(count_ranged_pairs(5, 0, &primes, &mut cursor).unwrap(), 2);
        assert!(cursor.is_n_prime(5, &primes));
    }

    #[test]
    fn test_count_pairs_matches_brute_force() {
        let primes = sieve_primes(5_000);
        for n in 2..2_000u64 {
            assert_eq!(
                count_pairs(n, &primes).unwrap(),
                brute_force_pairs(n, 0),
                "pair count mismatch at n={}",
                n
            );
        }
    }

    #[test]
    fn test_ranged_count_respects_radius() {
        let primes = sieve_primes(1_000);
        let mut cursor = PairCursor::new();
        for n in 4..400u64 {
            for delta in [1u64, 3, n / 4, n / 2, n - 3] {
                let n_min = n - delta - 1;
                cursor.start();
                let got = count_ranged_pairs(n, n_min, &primes, &mut cursor).unwrap();
                assert_eq!(got, brute_force_pairs(n, n_min), "n={} delta={}", n, delta);
            }
        }
    }

    #[test]
    fn test_incremental_windows_accumulate() {
        // Widening the window for the same n continues the walk; the partial
        // counts add up to the full count of the widest window.
        let primes = sieve_primes(1_000);
        let mut cursor = PairCursor::new();
        for n in 10..300u64 {
            cursor.start();
            let mut total = 0;
            for delta in [n / 10, n / 4, n / 2, n - 3] {
                total += count_ranged_pairs(n, n - delta - 1, &primes, &mut cursor).unwrap();
                assert_eq!(total, brute_force_pairs(n, n - delta - 1));
            }
        }
    }

    #[test]
    fn test_cursor_is_monotone_over_sweep() {
        let primes = sieve_primes(2_000);
        let mut cursor = PairCursor::new();
        let mut last_current = 0;
        for n in 4..900u64 {
            cursor.start();
            count_ranged_pairs(n, n / 2, &primes, &mut cursor).unwrap();
            assert!(cursor.current() >= last_current, "current rewound at n={}", n);
            last_current = cursor.current();
            assert!(primes[cursor.current()] > n);
            assert!(primes[cursor.current() - 1] <= n);
        }
    }

    #[test]
    fn test_exhausted_table_is_an_error() {
        let primes = sieve_primes(50);
        assert!(matches!(
            count_pairs(47, &primes),
            Err(GoldbachError::PrimesExhausted { n: 47 })
        ));
        // 50 = 3 + 47 consumes the last prime mid-walk
        assert!(matches!(
            count_pairs(25, &primes),
            Err(GoldbachError::PrimesExhausted { n: 25 })
        ));
        assert_eq!(count_pairs(24, &primes).unwrap(), 10);
    }

    #[test]
    fn test_find_pair_minimal_offset() {
        let primes = sieve_primes(1_000);
        let mut cursor = PairCursor::new();
        // 2n = 14: 7+7 is diagonal, 3+11 gives m = 4
        assert_eq!(find_pair(7, &primes, &mut cursor).unwrap(), Some(4));
        // 2n = 20: 7+13 gives m = 3
        assert_eq!(find_pair(10, &primes, &mut cursor).unwrap(), Some(3));
        for n in 4..300u64 {
            let m = find_pair(n, &primes, &mut cursor).unwrap().unwrap();
            assert!(is_prime(n - m) && is_prime(n + m));
            assert!((1..m).all(|k| !(is_prime(n - k) && is_prime(n + k))));
        }
    }
}
