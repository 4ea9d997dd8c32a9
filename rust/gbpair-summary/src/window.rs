//! One half-width multiplier and everything that depends on it.
//!
//! A [`GbWindow`] owns its delta policy, the right-hand Euler product
//! series evaluated at n + delta, the crossing state against both
//! baselines, and one [`IntervalState`] per aggregate kind.

use goldbach_core::constants::KPRODKPROD;
use goldbach_core::{CompatVersion, EulerProductSeries, Result as CoreResult, WindowPolicy};

use crate::cps::CpsSummaryRow;
use crate::output::IntervalSinks;
use crate::partition::AggregateKind;
use crate::summary::{CpsPoint, IntervalSummary};

/// Where C(n) last fell to or below each baseline, and the statistics
/// measured since.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrossingState {
    pub pre_mertens: u64,
    pub pre_mertens_asymp: u64,
    /// First n whose window is wide enough for a 5% resolution.
    pub n_5percent: u64,
    pub nzero_stat: u64,
    pub eta_stat: f64,
    pub nzero_stat_asymp: u64,
    pub eta_stat_asymp: f64,
}

/// One window's view of one aggregate.
#[derive(Debug, Default)]
pub struct IntervalState {
    pub active: bool,
    pub nstar: u64,
    pub delta_mertens: f64,
    pub nstar_asymp: u64,
    pub delta_mertens_asymp: f64,
    pub sinks: IntervalSinks,
    pub summary: IntervalSummary,
}

impl IntervalState {
    fn clear_nstar(&mut self) {
        self.nstar = 0;
        self.delta_mertens = 0.0;
    }

    fn clear_nstar_asymp(&mut self) {
        self.nstar_asymp = 0;
        self.delta_mertens_asymp = 0.0;
    }

    /// Advance `nstar` past the last crossing with a cps point.
    pub fn track_nstar(&mut self, p: &CpsPoint, crossing: &CrossingState) {
        let delta_c = p.delta_c();
        if delta_c <= 0.0 {
            self.nstar = 0;
            self.delta_mertens = delta_c;
        } else if self.nstar <= crossing.pre_mertens && p.n > crossing.pre_mertens {
            self.nstar = p.n;
            self.delta_mertens = delta_c;
        }
        let delta_c_asymp = p.delta_c_asymp();
        if delta_c_asymp <= 0.0 {
            self.nstar_asymp = 0;
            self.delta_mertens_asymp = delta_c_asymp;
        } else if self.nstar_asymp <= crossing.pre_mertens_asymp && p.n > crossing.pre_mertens_asymp {
            self.nstar_asymp = p.n;
            self.delta_mertens_asymp = delta_c_asymp;
        }
    }
}

#[derive(Debug)]
pub struct GbWindow<'a> {
    pub alpha: f64,
    pub policy: WindowPolicy,
    /// Multiplier actually used at the last n (the cap alpha when capped).
    pub alpha_n: f64,
    pub crossing: CrossingState,
    right: EulerProductSeries<'a>,
    intervals: [IntervalState; 3],
}

impl<'a> GbWindow<'a> {
    pub fn new(alpha: f64, compat: CompatVersion, euler_cap: bool, primes: &'a [u64]) -> Self {
        Self {
            alpha,
            policy: WindowPolicy::new(alpha, compat, euler_cap),
            alpha_n: alpha,
            crossing: CrossingState::default(),
            right: EulerProductSeries::new(primes),
            intervals: Default::default(),
        }
    }

    pub fn interval(&self, kind: AggregateKind) -> &IntervalState {
        &self.intervals[kind.index()]
    }

    pub fn interval_mut(&mut self, kind: AggregateKind) -> &mut IntervalState {
        &mut self.intervals[kind.index()]
    }

    pub fn intervals_mut(&mut self) -> impl Iterator<Item = &mut IntervalState> {
        self.intervals.iter_mut()
    }

    pub fn is_active(&self, kind: AggregateKind) -> bool {
        self.interval(kind).active
    }

    /// Attach the streams of one aggregate; the interval is active when any
    /// stream is open.
    pub fn attach_sinks(&mut self, kind: AggregateKind, sinks: IntervalSinks) {
        let state = self.interval_mut(kind);
        state.active = sinks.is_active();
        state.sinks = sinks;
    }

    /// Half-width at n, remembering the effective multiplier.
    pub fn compute_delta(&mut self, n: u64) -> CoreResult<u64> {
        let outcome = self.policy.compute_delta(n)?;
        self.alpha_n = outcome.alpha_n;
        Ok(outcome.delta)
    }

    /// `ln(n)²·left(n)·right(n + delta)`, given the shared `left(n)`.
    pub fn calc_cminus(&mut self, n: u64, delta: u64, log_n_log_n: f64, left_product: f64) -> f64 {
        log_n_log_n * left_product * self.right.eval(n + delta)
    }

    pub fn calc_cminus_asymp(&self, log_n: f64) -> f64 {
        KPRODKPROD * log_n / ((1.0 + self.alpha_n).ln() + log_n)
    }

    pub fn check_crossing(&mut self, n: u64, le_cminus: bool) {
        if le_cminus {
            self.crossing.pre_mertens = n;
            self.crossing.nzero_stat = 0;
            self.crossing.eta_stat = 0.0;
            self.intervals.iter_mut().for_each(IntervalState::clear_nstar);
        }
    }

    pub fn check_crossing_asymp(&mut self, n: u64, le_cminus_asymp: bool) {
        if le_cminus_asymp {
            self.crossing.pre_mertens_asymp = n;
            self.crossing.nzero_stat_asymp = 0;
            self.crossing.eta_stat_asymp = 0.0;
            self.intervals.iter_mut().for_each(IntervalState::clear_nstar_asymp);
        }
    }

    /// Track the smallest `C - Cminus` seen after the last crossing, once
    /// the window is wide enough.
    pub fn update_n5percent(&mut self, n: u64, delta: u64, log_n_log_n: f64, diff: f64, diff_asymp: f64) {
        let c = &mut self.crossing;
        if c.n_5percent == 0 {
            if KPRODKPROD * (delta as f64) < 400.0 * log_n_log_n {
                return;
            }
            c.n_5percent = n;
        }
        if c.nzero_stat != 0 && c.nzero_stat <= c.pre_mertens {
            c.nzero_stat = 0;
            c.eta_stat = 0.0;
        }
        if n > c.pre_mertens && (c.eta_stat >= diff || c.nzero_stat == 0) {
            c.nzero_stat = n;
            c.eta_stat = diff;
        }
        if c.nzero_stat_asymp != 0 && c.nzero_stat_asymp <= c.pre_mertens_asymp {
            c.nzero_stat_asymp = 0;
            c.eta_stat_asymp = 0.0;
        }
        if n > c.pre_mertens_asymp && (c.eta_stat_asymp >= diff_asymp || c.nzero_stat_asymp == 0) {
            c.nzero_stat_asymp = n;
            c.eta_stat_asymp = diff_asymp;
        }
    }

    /// Feed one cps point of the closing interval into `nstar`.
    pub fn track_cps_point(&mut self, kind: AggregateKind, p: &CpsPoint) {
        let crossing = self.crossing;
        self.interval_mut(kind).track_nstar(p, &crossing);
    }

    pub fn cps_summary_row(&self, kind: AggregateKind, first: u64, last: u64) -> CpsSummaryRow {
        let state = self.interval(kind);
        let c = &self.crossing;
        CpsSummaryRow {
            first,
            last,
            alpha: self.alpha,
            pre_mertens: c.pre_mertens,
            nstar: state.nstar,
            delta_mertens: state.delta_mertens,
            n_5percent: c.n_5percent,
            nzero_stat: c.nzero_stat,
            eta_stat: c.eta_stat,
            nstar_asymp: state.nstar_asymp,
            delta_mertens_asymp: state.delta_mertens_asymp,
            nzero_stat_asymp: c.nzero_stat_asymp,
            eta_stat_asymp: c.eta_stat_asymp,
        }
    }

    /// Seed the crossing state from a row of an earlier run. The summary
    /// has no asymptotic crossing column, so it starts at `pre_mertens`.
    pub fn resume_from(&mut self, kind: AggregateKind, row: &CpsSummaryRow) {
        self.crossing = CrossingState {
            pre_mertens: row.pre_mertens,
            pre_mertens_asymp: row.pre_mertens,
            n_5percent: row.n_5percent,
            nzero_stat: row.nzero_stat,
            eta_stat: row.eta_stat,
            nzero_stat_asymp: row.nzero_stat_asymp,
            eta_stat_asymp: row.eta_stat_asymp,
        };
        let state = self.interval_mut(kind);
        state.nstar = row.nstar;
        state.delta_mertens = row.delta_mertens;
        state.nstar_asymp = row.nstar_asymp;
        state.delta_mertens_asymp = row.delta_mertens_asymp;
    }
}
