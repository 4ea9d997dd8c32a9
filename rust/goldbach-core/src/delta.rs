//! Window half-width policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GoldbachError, Result};

/// Output and clamping compatibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompatVersion {
    /// Reproduces the v0.1.5 tables: no `n - 3` clamp for alpha <= 0.5,
    /// legacy decade labels and headers.
    V015,
    #[default]
    Current,
}

impl FromStr for CompatVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v0.1.5" | "v015" | "0.1.5" | "legacy" => Ok(Self::V015),
            "current" | "v0.2" | "v0.2.0" => Ok(Self::Current),
            other => Err(format!("unknown compat version '{}'", other)),
        }
    }
}

impl fmt::Display for CompatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V015 => write!(f, "v0.1.5"),
            Self::Current => write!(f, "current"),
        }
    }
}

/// Result of one half-width computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaOutcome {
    pub delta: u64,
    /// Effective multiplier: `alpha`, or the cap alpha when the cap decided delta.
    pub alpha_n: f64,
    pub capped: bool,
}

/// Per-window configuration producing `delta(n)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowPolicy {
    pub alpha: f64,
    pub compat: CompatVersion,
    pub euler_cap: bool,
}

impl WindowPolicy {
    pub fn new(alpha: f64, compat: CompatVersion, euler_cap: bool) -> Self {
        Self {
            alpha,
            compat,
            euler_cap,
        }
    }

    /// Cap multiplier `((2n+1) - sqrt(8n+1)) / (2n)`, written as `1 + (0.5 - sqrt(2n + 1/4))/n`.
    pub fn euler_cap_alpha(n: u64) -> f64 {
        let n = n as f64;
        1.0 + (0.5 - (2.0 * n + 0.25).sqrt()) / n
    }

    /// Largest half-width the Euler cap allows at n (at least 1).
    pub fn euler_cap(n: u64) -> u64 {
        let val = (Self::euler_cap_alpha(n) * n as f64).ceil() - 1.0;
        if val < 1.0 {
            1
        } else {
            val as u64
        }
    }

    /// Compute the half-width for n.
    ///
    /// # Errors
    /// [`GoldbachError::EulerCapViolated`] under v0.1.5 with alpha = 1 when the
    /// closed-form cap leaves room above delta, which contradicts the cap.
    pub fn compute_delta(&self, n: u64) -> Result<DeltaOutcome> {
        let mut delta = (self.alpha * n as f64).floor() as u64;
        let mut alpha_n = self.alpha;
        let mut capped = false;

        if self.euler_cap {
            let cap_alpha = Self::euler_cap_alpha(n);
            let cap = Self::euler_cap(n);
            if delta > cap {
                delta = cap;
                alpha_n = cap_alpha;
                capped = true;
            } else if self.compat == CompatVersion::V015
                && (self.alpha - 1.0).abs() < 1e-18
                && delta + 1 <= cap
            {
                return Err(GoldbachError::EulerCapViolated { n, delta, cap });
            }
        }

        if self.compat != CompatVersion::V015 || self.alpha > 0.5 {
            let max_delta = if n > 3 { n - 3 } else { 1 };
            if delta > max_delta {
                delta = max_delta;
            }
        }

        Ok(DeltaOutcome {
            delta,
            alpha_n,
            capped,
        })
    }

    pub fn delta(&self, n: u64) -> Result<u64> {
        Ok(self.compute_delta(n)?.delta)
    }
}
