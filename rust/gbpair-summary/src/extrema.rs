//! Running extremum tracking for one quantity over an interval.
//!
//! Every tracked quantity keeps its first and last extremum: `first` is the
//! earliest n reaching the strict extremum, `last` the latest n tying or
//! beating it. Each side also remembers the half-width and the HL
//! correction it was recorded with, so the value can be re-corrected once
//! the interval closes.

use std::fmt;

use goldbach_core::HlCorrState;

/// Ratios closer than this to each other count as equal.
const RATIO_EPSILON: f64 = 2e-8;

/// Predictions at or below this satisfy any lower bound.
const MIN_BOUND_EPSILON: f64 = 1e-8;

/// Classification of a measured value against a predicted bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundStatus {
    Exact,
    Expected,
    Violated,
    Invalid,
}

impl fmt::Display for BoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exact => "EXACT",
            Self::Expected => "EXPECTED",
            Self::Violated => "VIOLATED",
            Self::Invalid => "INVALID",
        };
        f.write_str(s)
    }
}

/// `c_meas / current`, 1 when both agree within 2e-8, and a signed
/// `f64::MAX` sentinel when `current` is zero.
pub fn get_ratio(c_meas: f64, current: f64) -> f64 {
    if (c_meas - current).abs() <= RATIO_EPSILON {
        1.0
    } else if current != 0.0 {
        c_meas / current
    } else if c_meas < 0.0 {
        -f64::MAX
    } else {
        f64::MAX
    }
}

/// Whether `x` is one of the `±f64::MAX` sentinels or not finite.
pub fn is_sentinel(x: f64) -> bool {
    !x.is_finite() || x == f64::MAX || x == -f64::MAX
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Side {
    c: f64,
    baseline: f64,
    n: u64,
    delta: u64,
    hl_corr: f64,
    extra: f64,
}

impl Default for Side {
    fn default() -> Self {
        Self {
            c: 0.0,
            baseline: 0.0,
            n: 0,
            delta: 0,
            hl_corr: 1.0,
            extra: 0.0,
        }
    }
}

impl Side {
    fn record(&mut self, current: f64, baseline: f64, n: u64, delta: u64, hl_corr: f64) {
        self.c = current;
        self.baseline = baseline;
        self.n = n;
        self.delta = delta;
        self.hl_corr = hl_corr;
    }

    /// Swap the recorded correction for `hl_corr`, leaving the baseline alone.
    fn apply_hl_corr(&mut self, hl_corr: f64) {
        let mut c = self.c - self.baseline;
        if self.hl_corr != 1.0 && self.hl_corr != 0.0 {
            c /= self.hl_corr;
        }
        self.hl_corr = hl_corr;
        if self.hl_corr != 1.0 && self.hl_corr != 0.0 {
            c *= self.hl_corr;
        }
        self.c = c + self.baseline;
    }

    fn ratio(&self) -> f64 {
        get_ratio(self.extra, self.c)
    }
}

/// First/last extremum of one quantity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtremaValues {
    current: f64,
    first: Side,
    last: Side,
}

impl ExtremaValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_first(&self) -> u64 {
        self.first.n
    }

    pub fn n_last(&self) -> u64 {
        self.last.n
    }

    pub fn c_first(&self) -> f64 {
        self.first.c
    }

    pub fn c_last(&self) -> f64 {
        self.last.c
    }

    pub fn baseline_first(&self) -> f64 {
        self.first.baseline
    }

    pub fn delta_first(&self) -> u64 {
        self.first.delta
    }

    pub fn hl_corr_first(&self) -> f64 {
        self.first.hl_corr
    }

    /// Measured value stored alongside the first extremum (ratio tracking).
    pub fn extra_first(&self) -> f64 {
        self.first.extra
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn is_empty(&self) -> bool {
        self.first.n == 0
    }

    /// Track the minimum of `c + baseline`.
    ///
    /// With a non-zero baseline every non-positive value also updates the
    /// last side, so `last` ends on the latest crossing below zero.
    pub fn put_minima(&mut self, c: f64, baseline: f64, n: u64, delta: u64, hl_corr: f64) {
        self.current = c + baseline;
        let current = self.current;
        if (baseline != 0.0 && current <= 0.0) || current <= self.last.c || self.last.n == 0 {
            if current < self.first.c || self.first.n == 0 {
                self.first.record(current, baseline, n, delta, hl_corr);
            }
            self.last.record(current, baseline, n, delta, hl_corr);
        }
    }

    /// Track the maximum of `c + baseline`.
    pub fn put_maxima(&mut self, c: f64, baseline: f64, n: u64, delta: u64, hl_corr: f64) {
        self.current = c + baseline;
        let current = self.current;
        if current >= self.last.c || self.last.n == 0 {
            if current > self.first.c || self.first.n == 0 {
                self.first.record(current, baseline, n, delta, hl_corr);
            }
            self.last.record(current, baseline, n, delta, hl_corr);
        }
    }

    /// Track the minimum of `c_meas / (c + baseline)`.
    pub fn put_minima_ratio(&mut self, c_meas: f64, c: f64, baseline: f64, n: u64, delta: u64, hl_corr: f64) {
        let sample = (c_meas, c, baseline, n, delta, hl_corr);
        self.put_ratio(sample, |r, edge| r <= edge, |r, edge| r < edge);
    }

    /// Track the maximum of `c_meas / (c + baseline)`.
    pub fn put_maxima_ratio(&mut self, c_meas: f64, c: f64, baseline: f64, n: u64, delta: u64, hl_corr: f64) {
        let sample = (c_meas, c, baseline, n, delta, hl_corr);
        self.put_ratio(sample, |r, edge| r >= edge, |r, edge| r > edge);
    }

    fn put_ratio<L, F>(&mut self, sample: (f64, f64, f64, u64, u64, f64), beats_last: L, beats_first: F)
    where
        L: Fn(f64, f64) -> bool,
        F: Fn(f64, f64) -> bool,
    {
        let (c_meas, c, baseline, n, delta, hl_corr) = sample;
        self.current = c + baseline;
        let current = self.current;
        if self.last.n == 0 {
            self.first.record(current, baseline, n, delta, hl_corr);
            self.first.extra = c_meas;
            self.last = self.first;
            return;
        }
        let ratio = get_ratio(c_meas, current);
        if beats_last(ratio, self.last.ratio()) {
            if beats_first(ratio, self.first.ratio()) {
                self.first.record(current, baseline, n, delta, hl_corr);
                self.first.extra = c_meas;
            }
            self.last.record(current, baseline, n, delta, hl_corr);
            self.last.extra = c_meas;
        }
    }

    pub fn first_ratio(&self) -> f64 {
        self.first.ratio()
    }

    pub fn last_ratio(&self) -> f64 {
        self.last.ratio()
    }

    /// `ln(ratio)`; `f64::MAX` for sentinel or negative ratios and
    /// `-f64::MAX` for a zero ratio.
    pub fn lambda(&self) -> f64 {
        let ratio = self.first_ratio();
        if ratio == f64::MAX || ratio == -f64::MAX || ratio < 0.0 {
            f64::MAX
        } else if ratio == 0.0 {
            -f64::MAX
        } else {
            ratio.ln()
        }
    }

    /// Status against an upper bound: measured should not exceed predicted.
    pub fn max_bound_status(&self) -> BoundStatus {
        let ratio = self.first_ratio();
        if ratio == f64::MAX || ratio == -f64::MAX || ratio < 0.0 {
            BoundStatus::Violated
        } else if ratio == 0.0 {
            BoundStatus::Expected
        } else if ratio > 1.0 {
            BoundStatus::Violated
        } else if ratio == 1.0 {
            BoundStatus::Exact
        } else {
            BoundStatus::Expected
        }
    }

    /// Status against a lower bound: measured should not fall below predicted.
    pub fn min_bound_status(&self) -> BoundStatus {
        if self.first.c <= MIN_BOUND_EPSILON {
            return BoundStatus::Expected;
        }
        let ratio = self.first_ratio();
        if ratio == f64::MAX || ratio == -f64::MAX || ratio < 0.0 {
            BoundStatus::Expected
        } else if ratio.abs() <= MIN_BOUND_EPSILON || ratio < 1.0 {
            BoundStatus::Violated
        } else if ratio == 1.0 {
            BoundStatus::Exact
        } else {
            BoundStatus::Expected
        }
    }

    fn recorrect(&mut self, state: &mut HlCorrState) {
        let first = state.eval(self.first.n, self.first.delta);
        self.first.apply_hl_corr(first);
        let last = state.eval(self.last.n, self.last.delta);
        self.last.apply_hl_corr(last);
    }

    /// Re-correct both sides with `state` and keep the smaller one.
    pub fn apply_hl_corr_min(&mut self, state: &mut HlCorrState) {
        if self.is_empty() {
            return;
        }
        self.recorrect(state);
        if self.last.c <= 0.0 || self.last.c < self.first.c {
            self.first = self.last;
        } else if self.last.c > self.first.c {
            self.last = self.first;
        }
    }

    /// Re-correct both sides with `state` and keep the larger one.
    pub fn apply_hl_corr_max(&mut self, state: &mut HlCorrState) {
        if self.is_empty() {
            return;
        }
        self.recorrect(state);
        if self.last.c > self.first.c {
            self.first = self.last;
        } else if self.last.c < self.first.c {
            self.last = self.first;
        }
    }

    /// Re-correct both sides and keep the smaller ratio.
    pub fn apply_hl_corr_min_ratio(&mut self, state: &mut HlCorrState) {
        if self.is_empty() {
            return;
        }
        self.recorrect(state);
        let (r_first, r_last) = (self.first_ratio(), self.last_ratio());
        if r_last <= 0.0 || r_last < r_first {
            self.first = self.last;
        } else if r_last > r_first {
            self.last = self.first;
        }
    }

    /// Re-correct both sides and keep the larger ratio.
    pub fn apply_hl_corr_max_ratio(&mut self, state: &mut HlCorrState) {
        if self.is_empty() {
            return;
        }
        self.recorrect(state);
        let (r_first, r_last) = (self.first_ratio(), self.last_ratio());
        if r_last > r_first {
            self.first = self.last;
        } else if r_last < r_first {
            self.last = self.first;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use goldbach_core::hl_corr;

    #[test]
    fn test_minima_first_and_last() {
        let mut e = ExtremaValues::new();
        for (n, c) in [(4u64, 3.0), (5, 1.0), (6, 2.0), (7, 1.0), (8, 4.0)] {
            e.put_minima(c, 0.0, n, 1, 1.0);
        }
        assert_eq!(e.n_first(), 5);
        assert_eq!(e.n_last(), 7);
        assert_eq!(e.c_first(), 1.0);
        assert_eq!(e.c_last(), 1.0);
    }

    #[test]
    fn test_maxima_first_and_last() {
        let mut e = ExtremaValues::new();
        for (n, c) in [(4u64, 3.0), (5, 5.0), (6, 2.0), (7, 5.0), (8, 4.0)] {
            e.put_maxima(c, 0.0, n, 1, 1.0);
        }
        assert_eq!(e.n_first(), 5);
        assert_eq!(e.n_last(), 7);
        assert_eq!(e.c_first(), 5.0);
    }

    #[test]
    fn test_first_sample_initialises_even_at_zero() {
        let mut e = ExtremaValues::new();
        e.put_maxima(0.0, 0.0, 10, 2, 1.0);
        assert_eq!(e.n_first(), 10);
        e.put_minima(0.0, 0.0, 10, 2, 1.0);
        assert_eq!(e.n_last(), 10);
    }

    #[test]
    fn test_minima_with_baseline_follows_negative_values() {
        let mut e = ExtremaValues::new();
        e.put_minima(-5.0, 1.0, 10, 1, 1.0);
        e.put_minima(-2.0, 1.0, 11, 1, 1.0);
        // -1 is above -4 but still non-positive with a baseline
        assert_eq!(e.n_first(), 10);
        assert_eq!(e.n_last(), 11);
        assert_eq!(e.baseline_first(), 1.0);
    }

    #[test]
    fn test_get_ratio_edges() {
        assert_eq!(get_ratio(1.0, 1.0 + 1e-9), 1.0);
        assert_eq!(get_ratio(2.0, 0.0), f64::MAX);
        assert_eq!(get_ratio(-2.0, 0.0), -f64::MAX);
        assert_relative_eq!(get_ratio(1.0, 4.0), 0.25);
        assert!(is_sentinel(f64::MAX));
        assert!(is_sentinel(f64::NAN));
        assert!(!is_sentinel(1.0));
    }

    #[test]
    fn test_ratio_tracking() {
        let mut min = ExtremaValues::new();
        let mut max = ExtremaValues::new();
        // (c_meas, bound): ratios 0.5, 0.25, 1.5, 0.25
        let samples = [(1.0, 2.0), (1.0, 4.0), (3.0, 2.0), (2.0, 8.0)];
        for (i, &(meas, bound)) in samples.iter().enumerate() {
            let n = 100 + i as u64;
            min.put_minima_ratio(meas, bound, 0.0, n, 3, 1.0);
            max.put_maxima_ratio(meas, bound, 0.0, n, 3, 1.0);
        }
        assert_eq!(min.n_first(), 101);
        assert_eq!(min.n_last(), 103);
        assert_relative_eq!(min.first_ratio(), 0.25);
        assert_eq!(max.n_first(), 102);
        assert_relative_eq!(max.first_ratio(), 1.5);
        assert_relative_eq!(max.lambda(), 1.5f64.ln());
        assert_eq!(max.max_bound_status(), BoundStatus::Violated);
        assert_eq!(min.min_bound_status(), BoundStatus::Violated);
    }

    #[test]
    fn test_bound_status() {
        let mut e = ExtremaValues::new();
        e.put_maxima_ratio(1.0, 2.0, 0.0, 10, 1, 1.0);
        assert_eq!(e.max_bound_status(), BoundStatus::Expected);
        assert_eq!(e.min_bound_status(), BoundStatus::Violated);

        let mut exact = ExtremaValues::new();
        exact.put_maxima_ratio(2.0, 2.0, 0.0, 10, 1, 1.0);
        assert_eq!(exact.max_bound_status(), BoundStatus::Exact);
        assert_eq!(exact.min_bound_status(), BoundStatus::Exact);
        assert_eq!(exact.lambda(), 0.0);

        // negative prediction satisfies any lower bound
        let mut neg = ExtremaValues::new();
        neg.put_minima_ratio(1.0, -3.0, 1.0, 10, 1, 1.0);
        assert_eq!(neg.min_bound_status(), BoundStatus::Expected);

        let mut zero = ExtremaValues::new();
        zero.put_maxima_ratio(1.0, 0.0, 0.0, 10, 1, 1.0);
        assert_eq!(zero.max_bound_status(), BoundStatus::Violated);
        assert_eq!(zero.lambda(), f64::MAX);
    }

    #[test]
    fn test_apply_hl_corr_rescales_and_picks() {
        let mut e = ExtremaValues::new();
        e.put_maxima(2.0, 0.0, 1_000, 500, 1.0);
        e.put_maxima(2.0, 0.0, 1_999, 999, 1.0);
        let mut state = HlCorrState::new();
        e.apply_hl_corr_max(&mut state);
        let a = 2.0 * hl_corr(1_000, 500);
        let b = 2.0 * hl_corr(1_999, 999);
        assert_relative_eq!(e.c_first(), a.max(b), max_relative = 1e-12);
        assert_eq!(e.c_first(), e.c_last());
        assert_eq!(e.n_first(), e.n_last());
    }

    #[test]
    fn test_apply_hl_corr_replaces_previous_factor() {
        let mut e = ExtremaValues::new();
        e.put_minima(6.0, 0.0, 1_000, 500, 3.0);
        let mut state = HlCorrState::new();
        e.apply_hl_corr_min(&mut state);
        assert_relative_eq!(e.c_first(), 2.0 * hl_corr(1_000, 500), max_relative = 1e-12);
        assert_relative_eq!(e.hl_corr_first(), hl_corr(1_000, 500), max_relative = 1e-12);
    }

    #[test]
    fn test_apply_on_empty_is_noop() {
        let mut e = ExtremaValues::new();
        let mut state = HlCorrState::new();
        e.apply_hl_corr_min(&mut state);
        assert!(e.is_empty());
        assert_eq!(e, ExtremaValues::new());
    }
}
