//! Interval partitioners for the n axis.
//!
//! Each aggregate cuts `[n_start, n_end)` into successive half-open
//! intervals. A partitioner only knows its current interval; `reset` with
//! the old right edge produces the next one, so successive intervals are
//! contiguous.
//!
//! * Decade: `[k·10^d, (k+1)·10^d)` with `d = floor(log10 n)`.
//! * Primorial: widths follow the running odd primorial (1, 15, 105, ...).
//! * PSI (short interval): width q grows through products of odd primes
//!   while `2·right > q_next²`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const ODD_PRIMES: [u64; 24] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// The three interval families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Decade,
    Primorial,
    Psi,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 3] = [Self::Decade, Self::Primorial, Self::Psi];

    /// Slot of this kind in per-kind arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Decade => 0,
            Self::Primorial => 1,
            Self::Psi => 2,
        }
    }

    /// Short name used by CLI flags (`--dec-out`, `--prim-out`, `--psi-out`).
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Decade => "dec",
            Self::Primorial => "prim",
            Self::Psi => "psi",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decade => write!(f, "decade"),
            Self::Primorial => write!(f, "primorial"),
            Self::Psi => write!(f, "psi"),
        }
    }
}

impl FromStr for AggregateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "decade" | "dec" => Ok(Self::Decade),
            "primorial" | "prim" => Ok(Self::Primorial),
            "psi" => Ok(Self::Psi),
            other => Err(format!("unknown aggregate '{}'", other)),
        }
    }
}

/// Half-open range `[left, right)` of n values.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub left: u64,
    pub right: u64,
    pub label: String,
    /// Geometric centre `sqrt(left·(right-1))`.
    pub n_geom: f64,
}

impl Default for Interval {
    fn default() -> Self {
        Self {
            left: 4,
            right: 5,
            label: String::new(),
            n_geom: 0.0,
        }
    }
}

impl Interval {
    pub fn contains(&self, n: u64) -> bool {
        n >= self.left && n < self.right
    }

    pub fn width(&self) -> u64 {
        self.right.saturating_sub(self.left)
    }
}

/// Shared contract of the partitioners.
pub trait Partition {
    /// Replace the current interval with the one containing `n_start`.
    ///
    /// `n_start` is raised to the current left edge first, so the sweep
    /// never moves backwards. Returns the clamped start.
    fn reset(&mut self, n_start: u64, legacy: bool) -> u64;

    fn interval(&self) -> &Interval;

    fn interval_mut(&mut self) -> &mut Interval;

    /// Current step width.
    fn base(&self) -> u64;
}

fn log_floor(mut n: u64, base: u64) -> u32 {
    let mut k = 0;
    while n >= base {
        n /= base;
        k += 1;
    }
    k
}

fn geometric_centre(left: u64, upper: u64) -> f64 {
    ((left as f64) * (upper as f64)).sqrt()
}

/// Decade intervals `[k·10^d, (k+1)·10^d)`.
#[derive(Debug, Clone)]
pub struct DecadePartition {
    interval: Interval,
    base: u64,
    decade: u32,
}

impl Default for DecadePartition {
    fn default() -> Self {
        Self {
            interval: Interval::default(),
            base: 1,
            decade: 0,
        }
    }
}

impl DecadePartition {
    pub fn decade(&self) -> u32 {
        self.decade
    }
}

impl Partition for DecadePartition {
    fn reset(&mut self, n_start: u64, legacy: bool) -> u64 {
        let n_start = n_start.max(self.interval.left);
        self.decade = log_floor(n_start, 10);
        self.base = 10u64.pow(self.decade);
        let right = n_start - n_start % self.base + self.base;
        let left = right - self.base;
        let upper = if legacy { right } else { right - 1 };
        self.interval = Interval {
            left,
            right,
            label: if legacy {
                self.decade.to_string()
            } else {
                format!("{}e{}", (right - 1) / self.base, self.decade)
            },
            n_geom: geometric_centre(left, upper),
        };
        n_start
    }

    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn interval_mut(&mut self) -> &mut Interval {
        &mut self.interval
    }

    fn base(&self) -> u64 {
        self.base
    }
}

/// Largest odd primorial <= n and the one after it (0 if it overflows).
fn odd_primorial_floor(n: u64) -> (u64, u64) {
    let mut p: u64 = 1;
    let mut next: u64 = 0;
    for (i, &q) in ODD_PRIMES.iter().enumerate() {
        let cand = p as u128 * q as u128;
        if cand > n as u128 {
            if let Ok(fits) = u64::try_from(cand) {
                next = fits;
            }
            break;
        }
        p = cand as u64;
        next = ODD_PRIMES
            .get(i + 1)
            .and_then(|&r| u64::try_from(p as u128 * r as u128).ok())
            .unwrap_or(0);
    }
    if p < 3 && n >= 3 {
        p = 3;
    }
    (p, next)
}

fn next_multiple_ceiling(n: u64, base: u64) -> u64 {
    if base == 0 {
        return n;
    }
    n.div_ceil(base) * base
}

/// Intervals whose edges are multiples of a running odd primorial.
#[derive(Debug, Clone)]
pub struct PrimorialPartition {
    interval: Interval,
    base: u64,
    threshold_major: u64,
    threshold_minor: u64,
    major: u64,
    minor: u64,
}

impl Default for PrimorialPartition {
    fn default() -> Self {
        Self {
            interval: Interval::default(),
            base: 1,
            threshold_major: 3,
            threshold_minor: 1,
            major: 3,
            minor: 1,
        }
    }
}

impl PrimorialPartition {
    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn thresholds(&self) -> (u64, u64) {
        (self.threshold_minor, self.threshold_major)
    }

    fn label(&self) -> String {
        let Interval { left, right, .. } = self.interval;
        if self.base == 1 {
            return left.to_string();
        }
        let is_major = left % self.major == 0;
        let primorial = if is_major { self.major } else { self.minor };
        let unit = if is_major { self.threshold_minor } else { self.base };
        let multiple = (right - 1) / unit;
        match multiple {
            1 => format!("({}#)/2", primorial),
            2 => format!("({}#)", primorial),
            m if m % 2 == 0 => format!("({}#){}", primorial, m / 2),
            m => format!("({}#){}/2", primorial, m),
        }
    }
}

impl Partition for PrimorialPartition {
    fn reset(&mut self, n_start: u64, _legacy: bool) -> u64 {
        let n_start = n_start.max(self.interval.left);
        let mut right;
        if n_start < 7 * 5 * 3 {
            if n_start < 5 * 3 {
                self.base = 1;
                self.major = 3;
                self.minor = 2;
                self.threshold_minor = 3;
                self.threshold_major = 5 * 3;
                right = n_start + 1;
            } else {
                self.base = 5 * 3;
                self.major = 7;
                self.minor = 5;
                self.threshold_minor = self.base;
                self.threshold_major = 7 * self.base;
                right = next_multiple_ceiling(n_start, self.base);
            }
        } else {
            let (minor_threshold, major_threshold) = odd_primorial_floor(n_start);
            self.threshold_minor = minor_threshold;
            self.threshold_major = major_threshold;
            if self.threshold_minor <= self.base {
                self.threshold_minor = self.base;
                self.threshold_major = self.threshold_minor.saturating_mul(self.major);
            } else {
                self.base = odd_primorial_floor(self.threshold_minor - 1).0;
                self.major = self.threshold_minor / self.base;
                let prev = odd_primorial_floor(self.base - 1).0;
                self.minor = self.base / prev;
            }
            right = next_multiple_ceiling(n_start, self.base);
        }
        while right <= n_start {
            right += self.base;
        }
        let left = right - self.base;
        self.interval.left = left;
        self.interval.right = right;
        self.interval.n_geom = geometric_centre(left, right - 1);
        self.interval.label = self.label();
        n_start
    }

    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn interval_mut(&mut self) -> &mut Interval {
        &mut self.interval
    }

    fn base(&self) -> u64 {
        self.base
    }
}

/// Short intervals of width q, q growing through odd-prime products.
#[derive(Debug, Clone)]
pub struct PsiPartition {
    interval: Interval,
    base: u64,
    prime_index: usize,
    q_next: u64,
}

impl Default for PsiPartition {
    fn default() -> Self {
        Self {
            interval: Interval::default(),
            base: 1,
            prime_index: 0,
            q_next: 1,
        }
    }
}

impl Partition for PsiPartition {
    fn reset(&mut self, n_start: u64, _legacy: bool) -> u64 {
        let n_start = n_start.max(self.interval.left);
        let mut right = n_start + self.base;
        while 2 * right as u128 > self.q_next as u128 * self.q_next as u128 {
            self.base = self.q_next;
            match ODD_PRIMES.get(self.prime_index) {
                Some(&p) if self.base * p <= u32::MAX as u64 => {
                    self.q_next = self.base * p;
                    self.prime_index += 1;
                }
                _ => {
                    self.q_next = u32::MAX as u64;
                    right = n_start + self.base;
                    break;
                }
            }
            right = n_start + self.base;
        }
        self.interval = Interval {
            left: n_start,
            right,
            label: n_start.to_string(),
            n_geom: geometric_centre(n_start, right - 1),
        };
        n_start
    }

    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn interval_mut(&mut self) -> &mut Interval {
        &mut self.interval
    }

    fn base(&self) -> u64 {
        self.base
    }
}

/// One of the three partition strategies.
#[derive(Debug, Clone)]
pub enum Partitioner {
    Decade(DecadePartition),
    Primorial(PrimorialPartition),
    Psi(PsiPartition),
}

impl Partitioner {
    /// Fresh partitioner whose first reset starts no earlier than `left`.
    pub fn new(kind: AggregateKind, left: u64) -> Self {
        let mut p = match kind {
            AggregateKind::Decade => Self::Decade(DecadePartition::default()),
            AggregateKind::Primorial => Self::Primorial(PrimorialPartition::default()),
            AggregateKind::Psi => Self::Psi(PsiPartition::default()),
        };
        p.inner_mut().interval_mut().left = left;
        p
    }

    pub fn kind(&self) -> AggregateKind {
        match self {
            Self::Decade(_) => AggregateKind::Decade,
            Self::Primorial(_) => AggregateKind::Primorial,
            Self::Psi(_) => AggregateKind::Psi,
        }
    }

    fn inner(&self) -> &dyn Partition {
        match self {
            Self::Decade(p) => p,
            Self::Primorial(p) => p,
            Self::Psi(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Partition {
        match self {
            Self::Decade(p) => p,
            Self::Primorial(p) => p,
            Self::Psi(p) => p,
        }
    }

    pub fn reset(&mut self, n_start: u64, legacy: bool) -> u64 {
        self.inner_mut().reset(n_start, legacy)
    }

    pub fn interval(&self) -> &Interval {
        self.inner().interval()
    }

    pub fn base(&self) -> u64 {
        self.inner().base()
    }

    /// Whether the HL-A model evaluates the exact correction per n instead
    /// of correcting the interval extrema afterwards.
    pub fn uses_exact_hl_corr(&self) -> bool {
        match self {
            Self::Decade(p) => p.base() < 10,
            Self::Primorial(p) => p.minor() < 5,
            Self::Psi(p) => p.base() < 10,
        }
    }

    /// Decade exponent for decade partitions.
    pub fn decade(&self) -> Option<u32> {
        match self {
            Self::Decade(p) => Some(p.decade()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(kind: AggregateKind, start: u64, end: u64, legacy: bool) -> Vec<Interval> {
        let mut p = Partitioner::new(kind, start);
        p.reset(start, legacy);
        let mut out = vec![p.interval().clone()];
        while p.interval().right < end {
            let right = p.interval().right;
            p.reset(right, legacy);
            out.push(p.interval().clone());
        }
        out
    }

    #[test]
    fn test_partitions_are_contiguous() {
        for kind in AggregateKind::ALL {
            let intervals = walk(kind, 4, 2_000_000, false);
            assert!(intervals.len() > 10, "{}", kind);
            for pair in intervals.windows(2) {
                assert!(pair[0].left < pair[0].right, "{} {:?}", kind, pair[0]);
                assert_eq!(pair[0].right, pair[1].left, "{} {:?}", kind, pair);
            }
        }
    }

    #[test]
    fn test_decade_labels_and_centre() {
        let intervals = walk(AggregateKind::Decade, 4, 300, false);
        assert_eq!(intervals[0].left, 4);
        assert_eq!(intervals[0].right, 5);
        assert_eq!(intervals[0].label, "4e0");
        assert_eq!(intervals[5].label, "9e0");
        assert_eq!(intervals[6].left, 10);
        assert_eq!(intervals[6].right, 20);
        assert_eq!(intervals[6].label, "1e1");
        assert!((intervals[6].n_geom - (10.0f64 * 19.0).sqrt()).abs() < 1e-12);
        assert_eq!(intervals.last().map(|i| i.label.as_str()), Some("2e2"));
    }

    #[test]
    fn test_legacy_decade() {
        let mut p = Partitioner::new(AggregateKind::Decade, 4);
        p.reset(250, true);
        assert_eq!(p.interval().label, "2");
        assert_eq!(p.interval().left, 200);
        assert!((p.interval().n_geom - (200.0f64 * 300.0).sqrt()).abs() < 1e-9);
        assert_eq!(p.decade(), Some(2));
    }

    #[test]
    fn test_reset_never_moves_back() {
        let mut p = Partitioner::new(AggregateKind::Decade, 50);
        p.reset(50, false);
        assert_eq!(p.reset(7, false), 50);
        assert_eq!(p.interval().left, 50);
    }

    #[test]
    fn test_primorial_labels() {
        let intervals = walk(AggregateKind::Primorial, 4, 200, false);
        let find = |left: u64| intervals.iter().find(|i| i.left == left).cloned().unwrap();
        assert_eq!(find(4).label, "4");
        assert_eq!(find(14).right, 15);
        assert_eq!(find(15).right, 30);
        assert_eq!(find(15).label, "(5#)/2");
        assert_eq!(find(30).label, "(5#)");
        assert_eq!(find(45).label, "(5#)3/2");
        assert_eq!(find(60).label, "(5#)2");
        assert_eq!(find(105).label, "(7#)/2");
    }

    #[test]
    fn test_primorial_exact_switch() {
        let mut p = Partitioner::new(AggregateKind::Primorial, 4);
        p.reset(4, false);
        assert!(p.uses_exact_hl_corr());
        p.reset(15, false);
        assert!(!p.uses_exact_hl_corr());
    }

    #[test]
    fn test_odd_primorial_floor() {
        assert_eq!(odd_primorial_floor(104), (15, 105));
        assert_eq!(odd_primorial_floor(105), (105, 1155));
        assert_eq!(odd_primorial_floor(3), (3, 15));
    }

    #[test]
    fn test_psi_widths() {
        let intervals = walk(AggregateKind::Psi, 4, 100_000, false);
        assert_eq!((intervals[0].left, intervals[0].right), (4, 7));
        assert_eq!(intervals[0].label, "4");
        let mut prev = 0;
        for i in &intervals {
            assert!(i.width() >= prev);
            prev = i.width();
        }
        assert!(intervals.iter().any(|i| i.width() == 105));
    }
}
