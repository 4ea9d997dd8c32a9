//! The sweep over n.
//!
//! [`GbRange`] walks n upward once. At every n it counts (or predicts) the
//! pairs of each window, derives C(n) and both baselines, and folds the
//! result into every aggregate interval containing n. When n reaches the
//! right edge of an aggregate's interval, each window emits its rows and
//! the aggregate moves on to its next interval, or closes once past its
//! end.

use std::path::{Path, PathBuf};

use goldbach_core::{
    count_ranged_pairs, hl_corr, two_sgb, AvailableDeficit, CompatVersion, DeficitConfig, EulerProductSeries,
    PairCursor,
};
use log::{debug, info};

use crate::config::{Model, RangeConfig};
use crate::cps::{read_cps_summary, CPS_SUMMARY_HEADER};
use crate::error::{Result, SummaryError};
use crate::output::{
    bound_ratio_row, cps_header, cps_row, cps_row_legacy, expand_template, full_header, full_row, norm_header,
    norm_row, raw_header, raw_row, CpsContext, IntervalSinks, Sink, BOUND_RATIO_HEADER,
};
use crate::partition::{AggregateKind, Interval, Partitioner};
use crate::summary::{CpsPoint, HlCorrCalcs};
use crate::window::GbWindow;

/// Smallest even number >= `value`, at least `min_value`.
fn max_pref_even(value: f64, min_value: u64) -> u64 {
    let even = !1u64 & value.ceil() as u64;
    even.max(min_value)
}

/// Odd number from `floor(value)`, at most `max_value`.
fn min_pref_odd(value: f64, max_value: u64) -> u64 {
    let odd = 1u64 | value.floor() as u64;
    odd.min(max_value)
}

/// One partition scheme and the state its windows share.
#[derive(Debug)]
pub struct Aggregate {
    partitioner: Partitioner,
    n_start: u64,
    n_end: u64,
    closed: bool,
    calcs: HlCorrCalcs,
    cps_summary: Option<Sink>,
    resume: Option<PathBuf>,
}

impl Aggregate {
    fn new(kind: AggregateKind, n_start: u64, n_end: u64) -> Self {
        Self {
            partitioner: Partitioner::new(kind, n_start),
            n_start,
            n_end,
            closed: false,
            calcs: HlCorrCalcs::default(),
            cps_summary: None,
            resume: None,
        }
    }

    pub fn interval(&self) -> &Interval {
        self.partitioner.interval()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn contains(&self, n: u64) -> bool {
        !self.closed && self.interval().contains(n)
    }
}

/// Per-n inputs shared by every window.
#[derive(Debug, Clone, Copy)]
struct RowInput {
    n: u64,
    delta: u64,
    log_n: f64,
    log_n_log_n: f64,
    pair_count: u64,
    two_sgb: f64,
    left_product: f64,
}

pub struct GbRange<'a> {
    model: Model,
    compat: CompatVersion,
    include_trivial: bool,
    write_headers: bool,
    primes: &'a [u64],
    left: EulerProductSeries<'a>,
    cursor: PairCursor,
    deficit_pos: AvailableDeficit,
    deficit_neg: AvailableDeficit,
    windows: Vec<GbWindow<'a>>,
    aggregates: Vec<Aggregate>,
}

impl<'a> GbRange<'a> {
    /// Build the sweep for a validated configuration, opening every output.
    pub fn new(config: &RangeConfig, primes: &'a [u64]) -> Result<Self> {
        let alphas = config.normalized_alphas();
        let trace_to_stdout = !config.has_table_streams();
        let mut windows: Vec<GbWindow<'a>> = alphas
            .iter()
            .map(|&alpha| {
                let cap = config.euler_cap.enabled_for(config.compat, alpha);
                GbWindow::new(alpha, config.compat, cap, primes)
            })
            .collect();

        let mut aggregates = Vec::with_capacity(AggregateKind::ALL.len());
        for kind in AggregateKind::ALL {
            let mut agg = Aggregate::new(kind, config.n_start(kind), config.n_end(kind));
            let outputs = &config.aggregate(kind).outputs;
            if let (Some(template), Some(&alpha)) = (&outputs.cps_summary, alphas.last()) {
                agg.cps_summary = Some(Sink::open(&expand_template(template, alpha, "cps-summary"), false)?);
            }
            agg.resume = outputs.cps_summary_resume.as_ref().map(PathBuf::from);

            for (idx, window) in windows.iter_mut().enumerate() {
                let alpha = window.alpha;
                let open = |template: &Option<String>, format: &str| -> Result<Option<Sink>> {
                    template
                        .as_deref()
                        .map(|t| Sink::open(&expand_template(t, alpha, format), config.append))
                        .transpose()
                };
                let mut sinks = IntervalSinks {
                    full: open(&outputs.full, "full")?,
                    raw: open(&outputs.raw, "raw")?,
                    norm: open(&outputs.norm, "norm")?,
                    cps: open(&outputs.cps, "cps")?,
                    bound_ratio_min: open(&outputs.bound_ratio_min, "bound-ratio-min")?,
                    bound_ratio_max: open(&outputs.bound_ratio_max, "bound-ratio-max")?,
                    trace: None,
                };
                if trace_to_stdout && idx == 0 && config.trace == Some(kind) {
                    sinks.trace = Some(Sink::open("-", false)?);
                }
                let has_summary = agg.cps_summary.is_some();
                window.attach_sinks(kind, sinks);
                if has_summary {
                    window.interval_mut(kind).active = true;
                }
            }
            aggregates.push(agg);
        }

        let mut range = Self {
            model: config.model,
            compat: config.compat,
            include_trivial: config.include_trivial,
            write_headers: !config.append,
            primes,
            left: EulerProductSeries::new(primes),
            cursor: PairCursor::new(),
            deficit_pos: AvailableDeficit::new(DeficitConfig::bound_positive()),
            deficit_neg: AvailableDeficit::new(DeficitConfig::bound_negative()),
            windows,
            aggregates,
        };
        for kind in AggregateKind::ALL {
            let start = range.aggregates[kind.index()].n_start;
            if !range.reset_aggregate(kind, start)? {
                range.aggregates[kind.index()].closed = true;
            }
        }
        Ok(range)
    }

    pub fn windows(&self) -> &[GbWindow<'a>] {
        &self.windows
    }

    pub fn aggregate(&self, kind: AggregateKind) -> &Aggregate {
        &self.aggregates[kind.index()]
    }

    fn is_legacy(&self, kind: AggregateKind) -> bool {
        kind == AggregateKind::Decade && self.compat == CompatVersion::V015
    }

    /// Resume, write headers and sweep to the end.
    pub fn run(&mut self) -> Result<()> {
        if self.write_headers {
            self.print_headers()?;
        }
        for kind in AggregateKind::ALL {
            if let Some(path) = self.aggregates[kind.index()].resume.clone() {
                self.resume(kind, &path)?;
            }
        }
        self.print_cps_summary_headers()?;
        self.process_rows()?;
        self.flush()
    }

    fn print_headers(&mut self) -> Result<()> {
        let model = self.model;
        for kind in AggregateKind::ALL {
            let legacy = self.is_legacy(kind);
            for w in &mut self.windows {
                let sinks = &mut w.interval_mut(kind).sinks;
                sinks.write_full(full_header(model, legacy))?;
                if let Some(sink) = sinks.raw.as_mut() {
                    sink.write_line(raw_header(model))?;
                }
                if let Some(sink) = sinks.norm.as_mut() {
                    sink.write_line(norm_header(model))?;
                }
                if let Some(sink) = sinks.cps.as_mut() {
                    sink.write_line(cps_header(legacy))?;
                }
                for sink in [sinks.bound_ratio_min.as_mut(), sinks.bound_ratio_max.as_mut()].into_iter().flatten() {
                    sink.write_line(BOUND_RATIO_HEADER)?;
                }
            }
        }
        Ok(())
    }

    fn print_cps_summary_headers(&mut self) -> Result<()> {
        if self.model != Model::Empirical {
            return Ok(());
        }
        for agg in &mut self.aggregates {
            if let Some(sink) = agg.cps_summary.as_mut() {
                sink.write_line(CPS_SUMMARY_HEADER)?;
            }
        }
        Ok(())
    }

    /// Seed the crossing state of `kind` from an earlier cps summary. Rows
    /// apply in file order, so the last matching row wins.
    pub fn resume(&mut self, kind: AggregateKind, path: &Path) -> Result<()> {
        let rows = read_cps_summary(path)?;
        let mut used = 0usize;
        for row in &rows {
            for w in self.windows.iter_mut().filter(|w| row.matches_alpha(w.alpha)) {
                w.resume_from(kind, row);
                used += 1;
            }
        }
        if used == 0 {
            return Err(SummaryError::ResumeEmpty(path.to_path_buf()));
        }
        info!("resumed {} from {} ({} of {} rows matched)", kind, path.display(), used, rows.len());
        Ok(())
    }

    /// Sweep n from the smallest open interval to the largest end.
    pub fn process_rows(&mut self) -> Result<()> {
        let open: Vec<&Aggregate> = self.aggregates.iter().filter(|a| !a.closed).collect();
        let (Some(n_start), Some(n_end)) = (
            open.iter().map(|a| a.interval().left).min(),
            open.iter().map(|a| a.n_end).max(),
        ) else {
            info!("no active aggregate, nothing to do");
            return Ok(());
        };
        info!(
            "sweeping n in [{}, {}) with {} window(s), model {}",
            n_start,
            n_end,
            self.windows.len(),
            self.model
        );

        let primes = self.primes;
        let needs_prediction = self.model == Model::Hla
            || self
                .windows
                .iter()
                .any(|w| AggregateKind::ALL.iter().any(|&k| w.interval(k).sinks.wants_bound_ratio()));

        let mut n = n_start;
        while n < n_end {
            let two_sgb_n = if needs_prediction { two_sgb(n, primes) } else { 0.0 };
            let left_product = self.left.eval(n);
            self.cursor.start();
            let mut need_trivial = self.include_trivial;
            let mut pair_count = 0u64;
            let log_n = (n as f64).ln();

            for wi in 0..self.windows.len() {
                let delta = self.windows[wi].compute_delta(n)?;
                match self.model {
                    Model::Empirical => {
                        let n_min = n.saturating_sub(delta + 1);
                        pair_count += count_ranged_pairs(n, n_min, primes, &mut self.cursor)?;
                        if need_trivial && self.cursor.is_n_prime(n, primes) {
                            pair_count += 1;
                            need_trivial = false;
                        }
                    }
                    Model::Hla => {
                        if need_trivial {
                            need_trivial = false;
                            self.cursor.seek(n, primes);
                            if self.cursor.is_n_prime(n, primes) {
                                pair_count = 1;
                            }
                        }
                    }
                }
                let input = RowInput {
                    n,
                    delta,
                    log_n,
                    log_n_log_n: log_n * log_n,
                    pair_count,
                    two_sgb: two_sgb_n,
                    left_product,
                };
                self.add_row(wi, &input);
            }

            n += 1;
            self.close_intervals(n)?;
        }
        info!("sweep finished at n={}", n);
        Ok(())
    }

    fn add_row(&mut self, wi: usize, r: &RowInput) {
        let Self {
            model,
            compat,
            include_trivial,
            windows,
            aggregates,
            deficit_pos,
            deficit_neg,
            ..
        } = self;
        let w = &mut windows[wi];
        let trivial = if *include_trivial { 0.5 } else { 0.0 };
        let denom = trivial + r.delta as f64;
        let norm = if denom > 0.0 { r.log_n_log_n / denom } else { 0.0 };
        let cminus = w.calc_cminus(r.n, r.delta, r.log_n_log_n, r.left_product);
        let cminus_asymp = w.calc_cminus_asymp(r.log_n);

        for state in w.intervals_mut() {
            state.summary.use_hl_corr_inst = false;
        }

        match model {
            Model::Empirical => {
                let pair_count = r.pair_count as f64;
                let c_of_n = pair_count * norm;
                for state in w.intervals_mut() {
                    state.summary.pair_count = pair_count;
                    state.summary.c_of_n = c_of_n;
                }
                w.check_crossing(r.n, c_of_n <= cminus);
                w.check_crossing_asymp(r.n, c_of_n <= cminus_asymp);
                w.update_n5percent(r.n, r.delta, r.log_n_log_n, c_of_n - cminus, c_of_n - cminus_asymp);
            }
            Model::Hla => {
                let mut exact_hl: Option<f64> = None;
                for kind in AggregateKind::ALL {
                    if !w.is_active(kind) {
                        continue;
                    }
                    let exact = aggregates[kind.index()].partitioner.uses_exact_hl_corr();
                    let s = &mut w.interval_mut(kind).summary;
                    s.pair_count = 0.0;
                    s.hl_corr_avg = 1.0;
                    if exact {
                        let hl = *exact_hl.get_or_insert_with(|| hl_corr(r.n, r.delta));
                        s.use_hl_corr_inst = true;
                        s.hl_corr_avg = hl;
                        s.c_of_n = r.two_sgb * hl;
                    } else {
                        s.c_of_n = r.two_sgb;
                    }
                    if r.pair_count > 0 {
                        s.pair_count = if norm > 0.5 && r.delta > 0 {
                            s.c_of_n / r.delta as f64
                        } else {
                            1.0
                        };
                        s.c_of_n = s.pair_count * norm;
                    } else if norm > 0.0 {
                        s.pair_count = s.c_of_n / norm;
                    }
                }
            }
        }

        let mut envelope: Option<(f64, f64)> = None;
        for kind in AggregateKind::ALL {
            let agg = &aggregates[kind.index()];
            if !w.is_active(kind) || !agg.contains(r.n) {
                continue;
            }
            let state = w.interval_mut(kind);
            if state.sinks.wants_bound_ratio() {
                let (lower, upper) = *envelope.get_or_insert_with(|| {
                    (
                        deficit_neg.eval(r.n, r.delta) * norm,
                        deficit_pos.eval(r.n, r.delta) * norm,
                    )
                });
                let c_pred = r.two_sgb * state.summary.hl_estimate.eval(r.n, r.delta);
                state.summary.put_bound_ratio(r.n, r.delta, c_pred, lower, upper);
            }
            let use_hl_corr = kind == AggregateKind::Decade && r.n == 4 && *compat == CompatVersion::V015;
            state
                .summary
                .aggregate(r.n, r.delta, cminus, cminus_asymp, use_hl_corr);
        }
    }

    /// Emit and advance every aggregate whose interval ends at n.
    fn close_intervals(&mut self, n: u64) -> Result<()> {
        for kind in AggregateKind::ALL {
            let agg = &self.aggregates[kind.index()];
            if agg.closed || agg.interval().right != n {
                continue;
            }
            for wi in 0..self.windows.len() {
                if self.windows[wi].is_active(kind) {
                    self.emit_interval(wi, kind)?;
                }
            }
            self.reset_aggregate(kind, n)?;
        }
        Ok(())
    }

    fn emit_interval(&mut self, wi: usize, kind: AggregateKind) -> Result<()> {
        let legacy = self.is_legacy(kind);
        let model = self.model;
        let compat = self.compat;
        let agg = &mut self.aggregates[kind.index()];
        let w = &mut self.windows[wi];
        let interval = agg.partitioner.interval().clone();
        let policy = w.policy;

        let state = w.interval_mut(kind);
        state.summary.calc_average(interval.width());
        if model == Model::Hla && !state.summary.use_hl_corr_inst {
            let odd = if legacy {
                1 | interval.n_geom.floor() as u64
            } else {
                min_pref_odd(interval.n_geom, interval.right - 1)
            };
            let even = if compat == CompatVersion::V015 {
                odd + 1
            } else {
                max_pref_even(interval.n_geom, interval.left)
            };
            let hl_even = agg.calcs.even.eval(even, policy.delta(even)?);
            let hl_odd = agg.calcs.odd.eval(odd, policy.delta(odd)?);
            state.summary.apply_hl_corr(hl_even, hl_odd, &mut agg.calcs);
        }

        let summary = &state.summary;
        let sinks = &mut state.sinks;
        if sinks.full.is_some() || sinks.trace.is_some() {
            sinks.write_full(&full_row(model, legacy, &interval, summary))?;
        }
        if let Some(sink) = sinks.raw.as_mut() {
            sink.write_line(&raw_row(model, &interval, summary))?;
        }
        if let Some(sink) = sinks.norm.as_mut() {
            sink.write_line(&norm_row(model, &interval, summary))?;
        }
        if let Some(sink) = sinks.bound_ratio_min.as_mut() {
            let minima = &summary.bound_ratio_minima;
            if let Some(line) = bound_ratio_row(minima, minima.min_bound_status()) {
                sink.write_line(&line)?;
            }
        }
        if let Some(sink) = sinks.bound_ratio_max.as_mut() {
            let maxima = &summary.bound_ratio_maxima;
            if let Some(line) = bound_ratio_row(maxima, maxima.max_bound_status()) {
                sink.write_line(&line)?;
            }
        }

        if model == Model::Empirical {
            let points: Vec<(CpsPoint, bool)> = summary
                .cps_points()
                .into_iter()
                .filter_map(|n| summary.cps_point(n).map(|p| (p, summary.is_c_minimum(n))))
                .collect();
            let decade = if legacy { agg.partitioner.decade() } else { None };
            for (point, is_minimum) in points {
                let ctx = CpsContext {
                    alpha_n: w.alpha_n,
                    n_start: agg.n_start,
                    pre_mertens: w.crossing.pre_mertens,
                    pre_mertens_asymp: w.crossing.pre_mertens_asymp,
                };
                if let Some(sink) = w.interval_mut(kind).sinks.cps.as_mut() {
                    match decade {
                        Some(d) if is_minimum => sink.write_line(&cps_row_legacy(d, &point))?,
                        Some(_) => {}
                        None => sink.write_line(&cps_row(&point, &ctx))?,
                    }
                }
                w.track_cps_point(kind, &point);
            }
        }
        w.interval_mut(kind).sinks.flush()
    }

    /// Move `kind` to the interval starting at `n_start`. Returns false when
    /// no window uses the aggregate.
    fn reset_aggregate(&mut self, kind: AggregateKind, n_start: u64) -> Result<bool> {
        if !self.windows.iter().any(|w| w.is_active(kind)) {
            return Ok(false);
        }
        let legacy = self.is_legacy(kind);
        for w in self.windows.iter_mut().filter(|w| w.is_active(kind)) {
            w.interval_mut(kind).summary.reset();
        }
        let agg = &mut self.aggregates[kind.index()];
        agg.partitioner.reset(n_start, legacy);
        let interval = agg.partitioner.interval().clone();
        if interval.left >= agg.n_end {
            self.close_aggregate(kind)?;
            return Ok(true);
        }
        debug!(
            "{} interval {} [{}, {})",
            kind, interval.label, interval.left, interval.right
        );
        for w in self.windows.iter_mut() {
            let policy = w.policy;
            let state = w.interval_mut(kind);
            if state.active && state.sinks.wants_bound_ratio() {
                let estimate = &mut state.summary.hl_estimate;
                estimate.init(interval.left, interval.right);
                estimate.prescan_all(|m| policy.delta(m).unwrap_or(0));
            }
        }
        Ok(true)
    }

    fn close_aggregate(&mut self, kind: AggregateKind) -> Result<()> {
        let agg = &mut self.aggregates[kind.index()];
        agg.closed = true;
        for w in self.windows.iter_mut() {
            if !w.is_active(kind) {
                continue;
            }
            if let Some(sink) = agg.cps_summary.as_mut() {
                sink.write_line(&w.cps_summary_row(kind, agg.n_start, agg.n_end).to_line())?;
            }
            let state = w.interval_mut(kind);
            state.active = false;
            state.sinks.close()?;
        }
        if let Some(mut sink) = agg.cps_summary.take() {
            sink.flush()?;
        }
        info!("{} aggregate closed at n={} (end {})", kind, agg.interval().left, agg.n_end);
        Ok(())
    }

    /// Flush every open stream.
    pub fn flush(&mut self) -> Result<()> {
        for w in &mut self.windows {
            for state in w.intervals_mut() {
                state.sinks.flush()?;
            }
        }
        for agg in &mut self.aggregates {
            if let Some(sink) = agg.cps_summary.as_mut() {
                sink.flush()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pref_helpers() {
        assert_eq!(max_pref_even(14.2, 10), 14);
        assert_eq!(max_pref_even(14.9, 10), 14);
        assert_eq!(max_pref_even(3.1, 10), 10);
        assert_eq!(min_pref_odd(14.2, 19), 15);
        assert_eq!(min_pref_odd(15.0, 19), 15);
        assert_eq!(min_pref_odd(18.5, 17), 17);
    }

    #[test]
    fn test_no_outputs_means_nothing_to_sweep() {
        let primes = goldbach_core::sieve_primes(1_000);
        let config = RangeConfig {
            trace: None,
            n_end: Some(100),
            ..RangeConfig::default()
        };
        let mut range = GbRange::new(&config, &primes).unwrap();
        assert!(AggregateKind::ALL.iter().all(|&k| range.aggregate(k).is_closed()));
        range.process_rows().unwrap();
    }

    #[test]
    fn test_decade_closes_at_end() {
        let primes = goldbach_core::sieve_primes(1_000);
        let dir = tempfile::tempdir().unwrap();
        let mut config = RangeConfig {
            trace: None,
            n_end: Some(30),
            ..RangeConfig::default()
        };
        config.decade.outputs.full = Some(dir.path().join("dec.csv").to_string_lossy().into_owned());
        let mut range = GbRange::new(&config, &primes).unwrap();
        assert!(!range.aggregate(AggregateKind::Decade).is_closed());
        assert!(range.aggregate(AggregateKind::Primorial).is_closed());
        range.run().unwrap();
        assert!(range.aggregate(AggregateKind::Decade).is_closed());
        assert!(!range.windows()[0].is_active(AggregateKind::Decade));
    }
}
