//! CRT-inspired small-prime deficit heuristic.
//!
//! Estimates the remainder envelope `R(w, n) = exp(base + max(w', 1)·tail)`
//! for a window of width w around n:
//!
//! * `base` sums `ln(p - r)` over small primes whose cumulative product
//!   (of `p - offset`) squared stays within w, with `r` the residue count,
//!   reduced by one for primes dividing n when reductions are enabled.
//! * `tail` adds up to `exposure_count` further primes weighted by the
//!   reciprocal of the running product (or its square).
//!
//! This is a first-order approximation with no inclusion–exclusion for
//! multiple transitions. It is unproven; the arithmetic below is kept
//! exactly as the downstream statistics were produced with it.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Small primes the heuristic runs over.
const PRIMES: [u64; 46] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211,
];

/// Tail terms below this no longer move eight printed decimals.
const TAIL_EPSILON: f64 = 1e-14;

fn ln_table() -> &'static [f64; 100] {
    static LN_CACHE: OnceLock<[f64; 100]> = OnceLock::new();
    LN_CACHE.get_or_init(|| {
        let mut table = [0.0; 100];
        for (x, slot) in table.iter_mut().enumerate().skip(2) {
            *slot = (x as f64).ln();
        }
        table
    })
}

/// ln(x), with ln(0) = ln(1) = 0 and a table for x < 100.
fn ln_small(x: u64) -> f64 {
    match ln_table().get(x as usize) {
        Some(v) if x < 100 => *v,
        _ => (x as f64).ln(),
    }
}

/// `min((n + r) mod p + 1, p - r)`: phase-capped residue count.
fn cap_tent(n: u64, p: u64, r: u64) -> u64 {
    let m = p - r;
    let k = (n + r) % p + 1;
    k.min(m)
}

/// Parameters of the deficit estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeficitConfig {
    /// Residues removed per prime: 2 for Goldbach pairs, 1 for single primes.
    pub residue: u64,
    /// Use `residue - 1` for primes dividing n.
    pub allow_reductions: bool,
    /// Scale the tail by sqrt(w) and weight terms by 1/q instead of 1/q².
    pub use_short_interval: bool,
    pub residue_tail: u64,
    pub allow_tail_reductions: bool,
    /// Replace `p - r` with the phase-capped count of [`cap_tent`].
    pub tenting: bool,
    pub exposure_count: u32,
    /// Products run over `p - prime_offset`.
    pub prime_offset: u64,
    /// Sign of the returned envelope.
    pub positive: bool,
}

impl DeficitConfig {
    /// Conservative upper-bound envelope.
    pub fn bound_positive() -> Self {
        Self {
            residue: 2,
            allow_reductions: true,
            use_short_interval: true,
            residue_tail: 2,
            allow_tail_reductions: false,
            tenting: false,
            exposure_count: 10,
            prime_offset: 1,
            positive: true,
        }
    }

    /// Conservative lower-bound envelope, returned negated.
    pub fn bound_negative() -> Self {
        Self {
            residue_tail: 1,
            positive: false,
            ..Self::bound_positive()
        }
    }
}

/// Deficit evaluator with a cache valid while n is fixed and
/// `q_committed² <= w < q_next²`.
#[derive(Debug, Clone)]
pub struct AvailableDeficit {
    config: DeficitConfig,
    n_prev: u64,
    q_committed: u64,
    q_next: u64,
    sumlog: f64,
    tailfactor: f64,
}

impl AvailableDeficit {
    pub fn new(config: DeficitConfig) -> Self {
        Self {
            config,
            n_prev: 0,
            q_committed: 0,
            q_next: 0,
            sumlog: 0.0,
            tailfactor: 0.0,
        }
    }

    pub fn config(&self) -> &DeficitConfig {
        &self.config
    }

    /// Signed envelope for n over a window of width `w`.
    pub fn eval(&mut self, n: u64, w: u64) -> f64 {
        let result = self.envelope(n, w);
        if self.config.positive {
            result
        } else {
            -result
        }
    }

    fn residue_for(&self, n: u64, p: u64) -> u64 {
        let c = &self.config;
        if c.allow_reductions && n % p == 0 {
            c.residue - 1
        } else {
            c.residue
        }
    }

    fn term(&self, n: u64, p: u64, r: u64) -> f64 {
        if self.config.tenting {
            ln_small(cap_tent(n, p, r))
        } else {
            ln_small(p - r)
        }
    }

    fn cache_valid(&self, n: u64, w: u64) -> bool {
        n == self.n_prev
            && w >= self.q_committed * self.q_committed
            && w < self.q_next.saturating_mul(self.q_next)
    }

    fn envelope(&mut self, n: u64, w: u64) -> f64 {
        if !self.cache_valid(n, w) {
            if let Some(early) = self.recompute(n, w) {
                return early;
            }
        }
        let w_eff = if self.config.use_short_interval {
            (w as f64).sqrt()
        } else {
            w as f64
        };
        (self.sumlog + w_eff.max(1.0) * self.tailfactor).exp()
    }

    /// Rebuild base and tail for (n, w). Returns a value directly when the
    /// window already reaches past 2n.
    fn recompute(&mut self, n: u64, w: u64) -> Option<f64> {
        let offset = self.config.prime_offset;
        let mut i = if self.config.allow_reductions && n % 3 == 0 { 0 } else { 1 };
        let p_max = 2 * n;
        self.sumlog = 0.0;
        self.tailfactor = 0.0;
        self.n_prev = n;
        self.q_committed = 1;
        self.q_next = 1;

        let pm = PRIMES[PRIMES.len() - 1] - offset;
        if self.config.residue > 1 && w > pm {
            // commit greedily on the product alone, then sum every committed prime
            let first = i;
            self.q_next = self.q_committed;
            while i < PRIMES.len() {
                self.q_next *= PRIMES[i] - offset;
                if self.q_next > u32::MAX as u64 || self.q_next * self.q_next > w {
                    break;
                }
                i += 1;
                self.q_committed = self.q_next;
            }
            for &p in &PRIMES[first..i] {
                let r = self.residue_for(n, p);
                self.sumlog += self.term(n, p, r);
            }
        } else {
            self.q_next = self.q_committed;
            while i < PRIMES.len() {
                let p = PRIMES[i];
                if (p - offset) * (p - offset) > w {
                    if p >= p_max {
                        return Some(self.sumlog.exp());
                    }
                    self.q_next = if self.q_committed == 1 {
                        p - offset
                    } else {
                        self.q_committed * (p - offset)
                    };
                    break;
                }
                let r = self.residue_for(n, p);
                if r == 0 {
                    i += 1;
                    self.q_committed = self.q_next;
                    continue;
                }
                self.q_next *= p - offset;
                if self.q_next > u32::MAX as u64 || self.q_next * self.q_next > w {
                    break;
                }
                self.sumlog += self.term(n, p, r);
                i += 1;
                self.q_committed = self.q_next;
            }
        }

        // exposure tail over the primes after the transition
        let mut q = self.q_committed as f64;
        let mut exposed = 0u32;
        while i < PRIMES.len() && exposed < self.config.exposure_count {
            let p = PRIMES[i];
            i += 1;
            exposed += 1;
            if p > p_max {
                break;
            }
            let r = if self.config.allow_tail_reductions && n % p == 0 {
                self.config.residue_tail - 1
            } else {
                self.config.residue_tail
            };
            if r == 0 {
                continue;
            }
            q *= (p - offset) as f64;
            let denom = if self.config.use_short_interval { q } else { q * q };
            let term = self.term(n, p, r) / denom;
            self.tailfactor += term;
            if term < TAIL_EPSILON {
                break;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ln_small_table() {
        assert_eq!(ln_small(0), 0.0);
        assert_eq!(ln_small(1), 0.0);
        assert_relative_eq!(ln_small(2), std::f64::consts::LN_2);
        assert_relative_eq!(ln_small(99), 99f64.ln());
        assert_relative_eq!(ln_small(1_000), 1_000f64.ln());
    }

    #[test]
    fn test_cap_tent() {
        // p = 5, r = 2: cap at 3, phase (n + 2) mod 5 + 1
        assert_eq!(cap_tent(0, 5, 2), 3);
        assert_eq!(cap_tent(3, 5, 2), 1);
        assert_eq!(cap_tent(4, 5, 2), 2);
        assert_eq!(cap_tent(1, 5, 2), 3);
    }

    #[test]
    fn test_negative_preset_flips_sign() {
        let mut pos = AvailableDeficit::new(DeficitConfig::bound_positive());
        let mut neg = AvailableDeficit::new(DeficitConfig::bound_negative());
        for n in [10u64, 105, 1_001, 65_536] {
            for w in [1u64, 10, 100, 5_000] {
                assert!(pos.eval(n, w) > 0.0);
                assert!(neg.eval(n, w) < 0.0);
            }
        }
    }

    #[test]
    fn test_small_window_base_terms() {
        // n = 10 (3 does not divide n), w = 20, offset 1:
        // p = 5: (5-1)^2 = 16 <= 20, q = 4, 16 <= 20, commit ln(5 - 1) since 5 | 10
        // p = 7: (7-1)^2 = 36 > 20 -> transition, q_next = 4·6
        let mut d = AvailableDeficit::new(DeficitConfig {
            exposure_count: 0,
            ..DeficitConfig::bound_positive()
        });
        assert_relative_eq!(d.eval(10, 20), 4f64.ln().exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_window_past_two_n_returns_base_only() {
        // n = 2, w = 0: the first candidate p = 5 already fails (5-1)^2 <= w
        // and lies beyond 2n, so only the empty base is returned
        let mut d = AvailableDeficit::new(DeficitConfig::bound_positive());
        let v = d.eval(2, 0);
        assert_relative_eq!(v, 1.0);
    }

    #[test]
    fn test_cache_is_transparent() {
        let mut cached = AvailableDeficit::new(DeficitConfig::bound_positive());
        for n in [30u64, 31, 210, 1_000_003] {
            for w in (1..400u64).chain([10_000, 50_000, 1 << 20]) {
                let mut fresh = AvailableDeficit::new(DeficitConfig::bound_positive());
                assert_eq!(cached.eval(n, w), fresh.eval(n, w), "n={} w={}", n, w);
            }
        }
    }

    #[test]
    fn test_grows_with_window() {
        let mut d = AvailableDeficit::new(DeficitConfig::bound_positive());
        let small = d.eval(1_000_003, 100);
        let large = d.eval(1_000_003, 1_000_000);
        assert!(large > small);
    }

    #[test]
    fn test_tenting_is_deterministic() {
        let config = DeficitConfig {
            tenting: true,
            ..DeficitConfig::bound_positive()
        };
        let mut a = AvailableDeficit::new(config);
        let mut b = AvailableDeficit::new(config);
        for n in 100..200u64 {
            assert_eq!(a.eval(n, 150), b.eval(n, 150));
        }
    }
}
