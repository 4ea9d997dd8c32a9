//! Aggregation state of one window over one interval.

use goldbach_core::{HlCorrInterpolator, HlCorrState};

use crate::extrema::ExtremaValues;

/// Exact correction evaluators of one aggregate, shared by its windows.
///
/// Each evaluator caches partial sums for its last n, so keeping one per
/// role avoids recomputing from scratch when roles alternate.
#[derive(Debug, Clone, Default)]
pub struct HlCorrCalcs {
    pub odd: HlCorrState,
    pub even: HlCorrState,
    pub min: HlCorrState,
    pub max: HlCorrState,
    pub min_norm: HlCorrState,
    pub max_norm: HlCorrState,
    pub bound_ratio_min: HlCorrState,
    pub bound_ratio_max: HlCorrState,
}

/// Statistic and both baselines at one n.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpsPoint {
    pub n: u64,
    pub c: f64,
    pub cminus: f64,
    pub cminus_asymp: f64,
}

impl CpsPoint {
    pub fn delta_c(&self) -> f64 {
        self.c - self.cminus
    }

    pub fn delta_c_asymp(&self) -> f64 {
        self.c - self.cminus_asymp
    }
}

/// First/last minimum of a difference `C(n) - baseline(n)`.
#[derive(Debug, Clone, Copy, Default)]
struct DiffMinima {
    first: CpsPoint,
    last: CpsPoint,
}

impl DiffMinima {
    fn put(&mut self, p: CpsPoint, diff: fn(&CpsPoint) -> f64) {
        let d = diff(&p);
        if d <= diff(&self.last) || self.last.n == 0 {
            if d < diff(&self.first) || self.first.n == 0 {
                self.first = p;
            }
            self.last = p;
        }
    }
}

/// Running summary of one interval for one window.
#[derive(Debug, Clone)]
pub struct IntervalSummary {
    /// The per-n values already carry the exact HL correction.
    pub use_hl_corr_inst: bool,
    /// Pair count (or prediction) of the current n.
    pub pair_count: f64,
    /// Normalised statistic C(n) of the current n.
    pub c_of_n: f64,
    pub hl_corr_avg: f64,
    pub pair_count_minima: ExtremaValues,
    pub pair_count_maxima: ExtremaValues,
    pub c_minima: ExtremaValues,
    pub c_maxima: ExtremaValues,
    pub bound_ratio_minima: ExtremaValues,
    pub bound_ratio_maxima: ExtremaValues,
    /// Sampled HL correction used for the bound-ratio prediction.
    pub hl_estimate: HlCorrInterpolator,
    n0_first: (f64, f64),
    n0_last: (f64, f64),
    n2: DiffMinima,
    n3: DiffMinima,
    pair_count_total: f64,
    pair_count_total_norm: f64,
    pair_count_avg: f64,
    c_avg: f64,
}

impl Default for IntervalSummary {
    fn default() -> Self {
        Self {
            use_hl_corr_inst: false,
            pair_count: 0.0,
            c_of_n: 0.0,
            hl_corr_avg: 1.0,
            pair_count_minima: ExtremaValues::new(),
            pair_count_maxima: ExtremaValues::new(),
            c_minima: ExtremaValues::new(),
            c_maxima: ExtremaValues::new(),
            bound_ratio_minima: ExtremaValues::new(),
            bound_ratio_maxima: ExtremaValues::new(),
            hl_estimate: HlCorrInterpolator::new(),
            n0_first: (0.0, 0.0),
            n0_last: (0.0, 0.0),
            n2: DiffMinima::default(),
            n3: DiffMinima::default(),
            pair_count_total: 0.0,
            pair_count_total_norm: 0.0,
            pair_count_avg: 0.0,
            c_avg: 0.0,
        }
    }
}

impl IntervalSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold the current `pair_count`/`c_of_n` at n into the interval.
    ///
    /// `use_hl_corr` strips an instantaneous correction from the totals
    /// (the first legacy decade).
    pub fn aggregate(&mut self, n: u64, delta: u64, cminus: f64, cminus_asymp: f64, use_hl_corr: bool) {
        let hl = self.hl_corr_avg;
        self.pair_count_minima.put_minima(self.pair_count, 0.0, n, delta, hl);
        self.pair_count_maxima.put_maxima(self.pair_count, 0.0, n, delta, hl);
        self.c_minima.put_minima(self.c_of_n, 0.0, n, delta, hl);
        self.c_maxima.put_maxima(self.c_of_n, 0.0, n, delta, hl);

        if self.use_hl_corr_inst && use_hl_corr && self.hl_corr_avg != 0.0 {
            self.pair_count_total += self.pair_count / self.hl_corr_avg;
            self.pair_count_total_norm += self.c_of_n / self.hl_corr_avg;
            self.hl_corr_avg = 1.0;
        } else {
            self.pair_count_total += self.pair_count;
            self.pair_count_total_norm += self.c_of_n;
        }

        if n == self.c_minima.n_last() {
            if n == self.c_minima.n_first() {
                self.n0_first = (cminus, cminus_asymp);
            }
            self.n0_last = (cminus, cminus_asymp);
        }

        let p = CpsPoint {
            n,
            c: self.c_of_n,
            cminus,
            cminus_asymp,
        };
        self.n2.put(p, CpsPoint::delta_c);
        self.n3.put(p, CpsPoint::delta_c_asymp);
    }

    /// Track measured C(n) against the envelope `c_pred + lower`/`c_pred + upper`.
    pub fn put_bound_ratio(&mut self, n: u64, delta: u64, c_pred: f64, lower: f64, upper: f64) {
        self.bound_ratio_minima.put_minima_ratio(self.c_of_n, lower, c_pred, n, delta, 1.0);
        self.bound_ratio_maxima.put_maxima_ratio(self.c_of_n, upper, c_pred, n, delta, 1.0);
    }

    /// Turn totals into averages over an interval of `width` values.
    pub fn calc_average(&mut self, width: u64) {
        let width = width.max(1) as f64;
        self.pair_count_avg = self.pair_count_total / width;
        self.c_avg = self.pair_count_total_norm / width;
    }

    /// Correct the averages with the mean of the even/odd interval
    /// corrections, then re-correct every extremum at its own n.
    pub fn apply_hl_corr(&mut self, hl_even: f64, hl_odd: f64, calcs: &mut HlCorrCalcs) {
        self.hl_corr_avg = 0.5 * (hl_even + hl_odd);
        self.pair_count_avg *= self.hl_corr_avg;
        self.c_avg *= self.hl_corr_avg;
        self.apply_hl_corr_extrema(calcs);
    }

    fn apply_hl_corr_extrema(&mut self, calcs: &mut HlCorrCalcs) {
        if !self.use_hl_corr_inst {
            self.pair_count_minima.apply_hl_corr_min(&mut calcs.min);
        }
        self.pair_count_maxima.apply_hl_corr_max(&mut calcs.max);
        self.c_minima.apply_hl_corr_min(&mut calcs.min_norm);
        self.c_maxima.apply_hl_corr_max(&mut calcs.max_norm);
        self.bound_ratio_minima.apply_hl_corr_min_ratio(&mut calcs.bound_ratio_min);
        self.bound_ratio_maxima.apply_hl_corr_max_ratio(&mut calcs.bound_ratio_max);
    }

    pub fn pair_count_avg(&self) -> f64 {
        self.pair_count_avg
    }

    pub fn c_avg(&self) -> f64 {
        self.c_avg
    }

    /// Location and value of the smallest pair count. Legacy tables report
    /// the last occurrence.
    pub fn pair_count_min(&self, legacy: bool) -> (u64, f64) {
        let e = &self.pair_count_minima;
        if legacy {
            (e.n_last(), e.c_last())
        } else {
            (e.n_first(), e.c_first())
        }
    }

    pub fn pair_count_max(&self) -> (u64, f64) {
        (self.pair_count_maxima.n_first(), self.pair_count_maxima.c_first())
    }

    /// `(n_0, C_min)`.
    pub fn c_min(&self) -> (u64, f64) {
        (self.c_minima.n_first(), self.c_minima.c_first())
    }

    /// `(n_1, C_max)`.
    pub fn c_max(&self) -> (u64, f64) {
        (self.c_maxima.n_first(), self.c_maxima.c_first())
    }

    /// Distinct non-zero n among the six tracked points, ascending.
    pub fn cps_points(&self) -> Vec<u64> {
        let mut points = vec![
            self.c_minima.n_first(),
            self.c_minima.n_last(),
            self.n2.first.n,
            self.n2.last.n,
            self.n3.first.n,
            self.n3.last.n,
        ];
        points.retain(|&n| n != 0);
        points.sort_unstable();
        points.dedup();
        points
    }

    /// Whether n is where the C(n) minimum was recorded.
    pub fn is_c_minimum(&self, n: u64) -> bool {
        n != 0 && (n == self.c_minima.n_first() || n == self.c_minima.n_last())
    }

    /// The tracked point at n, looked up in priority order: C minimum
    /// first/last, then `C - Cminus`, then `C - CminusAsymp`.
    pub fn cps_point(&self, n: u64) -> Option<CpsPoint> {
        if n == 0 {
            return None;
        }
        let minima = &self.c_minima;
        if n == minima.n_first() {
            return Some(CpsPoint {
                n,
                c: minima.c_first(),
                cminus: self.n0_first.0,
                cminus_asymp: self.n0_first.1,
            });
        }
        if n == minima.n_last() {
            return Some(CpsPoint {
                n,
                c: minima.c_last(),
                cminus: self.n0_last.0,
                cminus_asymp: self.n0_last.1,
            });
        }
        [self.n2.first, self.n2.last, self.n3.first, self.n3.last]
            .into_iter()
            .find(|p| p.n == n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn feed(summary: &mut IntervalSummary, rows: &[(u64, f64, f64, f64, f64)]) {
        for &(n, pc, c, cminus, cminus_asymp) in rows {
            summary.pair_count = pc;
            summary.c_of_n = c;
            summary.aggregate(n, n / 2, cminus, cminus_asymp, false);
        }
    }

    #[test]
    fn test_extrema_and_average() {
        let mut s = IntervalSummary::new();
        feed(
            &mut s,
            &[
                (10, 4.0, 1.2, 1.0, 1.1),
                (11, 2.0, 0.9, 1.0, 0.5),
                (12, 6.0, 1.5, 1.0, 1.6),
                (13, 2.0, 1.1, 0.8, 1.0),
            ],
        );
        s.calc_average(4);
        assert_eq!(s.pair_count_min(false), (11, 2.0));
        assert_eq!(s.pair_count_min(true), (13, 2.0));
        assert_eq!(s.pair_count_max(), (12, 6.0));
        assert_eq!(s.c_min(), (11, 0.9));
        assert_eq!(s.c_max(), (12, 1.5));
        assert_relative_eq!(s.pair_count_avg(), 3.5);
        assert_relative_eq!(s.c_avg(), 4.7 / 4.0);
    }

    #[test]
    fn test_cps_points() {
        let mut s = IntervalSummary::new();
        feed(
            &mut s,
            &[
                (10, 4.0, 1.2, 1.0, 1.1),
                (11, 2.0, 0.9, 1.0, 0.5),
                (12, 6.0, 1.5, 1.0, 1.6),
                (13, 2.0, 1.1, 0.8, 1.0),
            ],
        );
        // C min at 11; C - Cminus min at 11 (-0.1); C - CminusAsymp min at 12 (-0.1)
        assert_eq!(s.cps_points(), vec![11, 12]);
        assert!(s.is_c_minimum(11));
        assert!(!s.is_c_minimum(12));
        let p11 = s.cps_point(11).unwrap();
        assert_relative_eq!(p11.delta_c(), -0.1, epsilon = 1e-12);
        assert_relative_eq!(p11.delta_c_asymp(), 0.4, epsilon = 1e-12);
        let p12 = s.cps_point(12).unwrap();
        assert_relative_eq!(p12.delta_c_asymp(), -0.1, epsilon = 1e-12);
        assert!(s.cps_point(13).is_none());
        assert!(s.cps_point(0).is_none());
    }

    #[test]
    fn test_hl_corr_scales_averages() {
        let mut s = IntervalSummary::new();
        feed(&mut s, &[(1_000, 10.0, 2.0, 1.0, 1.0), (1_001, 12.0, 2.4, 1.0, 1.0)]);
        s.calc_average(2);
        let mut calcs = HlCorrCalcs::default();
        s.apply_hl_corr(1.2, 1.0, &mut calcs);
        assert_relative_eq!(s.hl_corr_avg, 1.1);
        assert_relative_eq!(s.pair_count_avg(), 11.0 * 1.1);
        assert_relative_eq!(s.c_avg(), 2.2 * 1.1);
        let (n0, c0) = s.c_min();
        assert_eq!(n0, 1_000);
        assert_relative_eq!(c0, 2.0 * goldbach_core::hl_corr(1_000, 500), max_relative = 1e-12);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut s = IntervalSummary::new();
        feed(&mut s, &[(10, 4.0, 1.2, 1.0, 1.1)]);
        s.reset();
        assert!(s.cps_points().is_empty());
        assert_eq!(s.hl_corr_avg, 1.0);
        assert!(s.c_minima.is_empty());
    }

    #[test]
    fn test_bound_ratio_tracking() {
        let mut s = IntervalSummary::new();
        s.c_of_n = 1.0;
        s.put_bound_ratio(100, 50, 1.0, -0.5, 0.5);
        s.c_of_n = 1.2;
        s.put_bound_ratio(101, 50, 1.0, -0.5, 0.5);
        assert_eq!(s.bound_ratio_minima.n_first(), 100);
        assert_relative_eq!(s.bound_ratio_minima.first_ratio(), 2.0);
        assert_eq!(s.bound_ratio_maxima.n_first(), 101);
        assert_relative_eq!(s.bound_ratio_maxima.first_ratio(), 0.8);
    }
}
