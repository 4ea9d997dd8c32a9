//! Hardy–Littlewood window correction.
//!
//! For a window (n - delta, n + delta) the correction compares the
//! Hardy–Littlewood density `1/(ln(n-m)·ln(n+m))`, summed over offsets m of
//! the parity that can give a prime pair, against the flat `1/ln(n)²`
//! density used to normalise pair counts.

/// Incremental evaluator cached for one n while delta grows.
#[derive(Debug, Clone, Default)]
pub struct HlCorrState {
    inv_log_n_log_n: f64,
    inv_sum: f64,
    sum: f64,
    n_prev: u64,
    delta_prev: u64,
    m: u64,
}

impl HlCorrState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cached partial sums can be extended to (n, delta).
    pub fn valid_for(&self, n: u64, delta: u64) -> bool {
        self.m != 0 && self.n_prev == n && delta >= self.delta_prev
    }

    /// Drop the partial sums and start over at n.
    pub fn reset(&mut self, n: u64) {
        self.n_prev = n;
        let log_n = (n as f64).ln();
        self.inv_log_n_log_n = 1.0 / (log_n * log_n);
        self.inv_sum = 0.0;
        self.sum = 0.0;
        self.delta_prev = 0;
        self.m = 1 + (n & 1);
    }

    /// Correction factor for the window of half-width `delta` around n.
    ///
    /// Returns 1.0 when no offsets fall inside the window.
    pub fn eval(&mut self, n: u64, delta: u64) -> f64 {
        if !self.valid_for(n, delta) {
            self.reset(n);
        }
        self.delta_prev = delta;
        while self.m <= delta && self.m < n {
            let m = self.m;
            self.sum += 1.0 / (((n - m) as f64).ln() * ((n + m) as f64).ln());
            self.inv_sum += self.inv_log_n_log_n;
            self.m += 2;
        }
        if self.inv_sum > 0.0 {
            self.sum / self.inv_sum
        } else {
            1.0
        }
    }
}

/// One-shot correction without caching.
pub fn hl_corr(n: u64, delta: u64) -> f64 {
    HlCorrState::new().eval(n, delta)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    n: u64,
    hl_corr: f64,
}

/// Sampled evaluator: exact values at a handful of points of an interval,
/// linear interpolation in between.
#[derive(Debug, Clone, Default)]
pub struct HlCorrInterpolator {
    samples: Vec<Sample>,
    sample_interval: u64,
    sample_size: u64,
    n_start: u64,
    n_end: u64,
    initialized: bool,
    state: HlCorrState,
}

impl HlCorrInterpolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare sampling of `[n_start, n_end)`. Repeating the same bounds keeps
    /// the collected samples.
    pub fn init(&mut self, n_start: u64, n_end: u64) {
        if self.initialized && n_start == self.n_start && n_end == self.n_end {
            return;
        }
        self.initialized = true;
        self.samples.clear();
        self.n_start = n_start;
        self.n_end = n_end;
        let range = n_end.saturating_sub(n_start);
        self.sample_interval = if range <= 1 {
            1
        } else {
            let spacing = (1.0 + (range as f64).sqrt().sqrt()).ceil() as u64;
            spacing.clamp(1, 31)
        };
        self.sample_size = ((range + self.sample_interval - 1) / self.sample_interval).max(1);
    }

    /// Record a sample at n when n is a sampling point, and lower `next_n`
    /// to the next point that needs a visit.
    ///
    /// Driving `n = next_n` from `n_start` visits only the sampling points.
    pub fn prescan<F>(&mut self, n: u64, next_n: &mut u64, mut compute_delta: F)
    where
        F: FnMut(u64) -> u64,
    {
        if n >= self.n_end {
            return;
        }
        if n < self.n_start {
            if *next_n > self.n_start {
                *next_n = self.n_start;
            }
            return;
        }
        let mut next = ((n - self.n_start) / self.sample_size) * self.sample_size + self.n_start;
        if n + 1 == self.n_end || n == next {
            let delta = compute_delta(n);
            let hl_corr = self.state.eval(n, delta);
            self.samples.push(Sample { n, hl_corr });
            next += self.sample_size;
        }
        if next >= self.n_end {
            next = self.n_end - 1;
        }
        if *next_n > next && next > n {
            *next_n = next;
        }
    }

    /// Visit every sampling point of the interval.
    pub fn prescan_all<F>(&mut self, mut compute_delta: F)
    where
        F: FnMut(u64) -> u64,
    {
        let mut n = self.n_start;
        while n < self.n_end {
            let mut next_n = u64::MAX;
            self.prescan(n, &mut next_n, &mut compute_delta);
            if next_n == u64::MAX || next_n <= n {
                break;
            }
            n = next_n;
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Smallest and largest sampled value.
    pub fn sample_range(&self) -> Option<(f64, f64)> {
        self.samples.iter().fold(None, |acc, s| match acc {
            None => Some((s.hl_corr, s.hl_corr)),
            Some((lo, hi)) => Some((lo.min(s.hl_corr), hi.max(s.hl_corr))),
        })
    }

    /// Interpolated correction at n; exact when nothing was sampled.
    pub fn eval(&mut self, n: u64, delta: u64) -> f64 {
        let (first, last) = match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return self.state.eval(n, delta),
        };
        if n <= first.n {
            return first.hl_corr;
        }
        if n >= last.n {
            return last.hl_corr;
        }

        let mut left = 0usize;
        let mut right = self.samples.len() - 1;
        while right - left > 1 {
            let mid = (left + right) / 2;
            if self.samples[mid].n <= n {
                left = mid;
            } else {
                right = mid;
            }
        }
        let s0 = self.samples[left];
        let s1 = self.samples[right];
        let t = (n - s0.n) as f64 / (s1.n - s0.n) as f64;
        s0.hl_corr + t * (s1.hl_corr - s0.hl_corr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference(n: u64, delta: u64) -> f64 {
        let log_n = (n as f64).ln();
        let mut sum = 0.0;
        let mut terms = 0u64;
        let mut m = 1 + (n & 1);
        while m <= delta {
            sum += 1.0 / (((n - m) as f64).ln() * ((n + m) as f64).ln());
            terms += 1;
            m += 2;
        }
        if terms == 0 {
            1.0
        } else {
            sum / (terms as f64 / (log_n * log_n))
        }
    }

    #[test]
    fn test_zero_delta_is_neutral() {
        for n in 3..500u64 {
            assert_eq!(hl_corr(n, 0), 1.0);
        }
        // even n starts at m = 1, odd n at m = 2
        assert_eq!(hl_corr(9, 1), 1.0);
    }

    #[test]
    fn test_incremental_matches_reference() {
        let mut state = HlCorrState::new();
        for n in [10u64, 101, 1_000, 99_999] {
            for delta in (0..n - 3).step_by(((n / 17) as usize).max(1)) {
                assert_relative_eq!(state.eval(n, delta), reference(n, delta), max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_shrinking_delta_recomputes() {
        let mut state = HlCorrState::new();
        let wide = state.eval(1_000, 500);
        let narrow = state.eval(1_000, 20);
        assert!(!state.valid_for(1_000, 10));
        assert!(state.valid_for(1_000, 20));
        assert_relative_eq!(narrow, reference(1_000, 20), max_relative = 1e-12);
        assert_relative_eq!(state.eval(1_000, 500), wide, max_relative = 1e-12);
        assert!(!state.valid_for(1_001, 500));
    }

    #[test]
    fn test_correction_exceeds_one_for_wide_windows() {
        // ln(n-m)·ln(n+m) < ln(n)² so the correction is above 1
        assert!(hl_corr(10_000, 5_000) > 1.0);
    }

    #[test]
    fn test_interpolator_sampling_and_bounds() {
        let mut interp = HlCorrInterpolator::new();
        interp.init(1_000, 2_000);
        interp.prescan_all(|n| n / 2);
        assert!(interp.sample_count() >= 2);
        let (lo, hi) = interp.sample_range().unwrap();
        for n in 1_000..2_000u64 {
            let v = interp.eval(n, n / 2);
            assert!(v >= lo - 1e-15 && v <= hi + 1e-15, "n={} v={}", n, v);
        }
        // sampled points are exact
        assert_relative_eq!(interp.eval(1_000, 500), hl_corr(1_000, 500), max_relative = 1e-12);
        assert_relative_eq!(interp.eval(1_999, 999), hl_corr(1_999, 999), max_relative = 1e-12);
    }

    #[test]
    fn test_interpolator_clamps_outside_span() {
        let mut interp = HlCorrInterpolator::new();
        interp.init(100, 200);
        interp.prescan_all(|n| n / 4);
        assert_eq!(interp.eval(50, 12), interp.eval(100, 25));
        assert_eq!(interp.eval(500, 125), interp.eval(199, 49));
    }

    #[test]
    fn test_interpolator_init_is_idempotent() {
        let mut interp = HlCorrInterpolator::new();
        interp.init(100, 200);
        interp.prescan_all(|n| n / 4);
        let count = interp.sample_count();
        interp.init(100, 200);
        assert_eq!(interp.sample_count(), count);
        interp.init(200, 300);
        assert_eq!(interp.sample_count(), 0);
    }

    #[test]
    fn test_interpolator_without_samples_is_exact() {
        let mut interp = HlCorrInterpolator::new();
        interp.init(100, 200);
        assert_relative_eq!(interp.eval(150, 40), hl_corr(150, 40), max_relative = 1e-12);
    }
}
