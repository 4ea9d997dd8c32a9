//! Incremental Euler product over odd primes.
//!
//! Evaluates `∏_{p odd, p² <= n} (p-2)/(p-1)` for a slowly increasing n. The
//! value is constant on segments `[p_k², p_{k+1}² - 1]`, so each query only
//! advances when n leaves the current segment.

/// Running product with the segment it is valid on.
#[derive(Debug, Clone)]
pub struct EulerProductSeries<'a> {
    primes: &'a [u64],
    /// Index of the prime 3 in `primes`, if present.
    start: Option<usize>,
    ptr: usize,
    n_left: u64,
    n_right: u64,
    y_next: u64,
    result: f64,
    warned_out: bool,
}

impl<'a> EulerProductSeries<'a> {
    /// Bind the series to a prime table starting at 3 (an optional leading 2 is skipped).
    pub fn new(primes: &'a [u64]) -> Self {
        let start = match primes {
            [3, ..] => Some(0),
            [_, 3, ..] => Some(1),
            _ => None,
        };
        if start.is_none() {
            log::error!("Invalid prime array: Euler product series needs the prime 3");
        }
        let mut series = Self {
            primes,
            start,
            ptr: 0,
            n_left: 1,
            n_right: 0,
            y_next: 0,
            result: 0.0,
            warned_out: false,
        };
        series.reset();
        series
    }

    /// Return to the first segment `[1, 8]`.
    pub fn reset(&mut self) {
        self.warned_out = false;
        self.n_left = 1;
        match self.start {
            Some(start) => {
                self.ptr = start;
                self.y_next = 3;
                self.n_right = 8;
                self.result = 1.0;
            }
            None => {
                self.ptr = 0;
                self.y_next = 0;
                self.n_right = u64::MAX;
                self.result = 0.0;
            }
        }
    }

    /// Product value at n.
    pub fn eval(&mut self, n: u64) -> f64 {
        if n < self.n_left {
            self.reset();
        }
        while n > self.n_right {
            self.advance();
        }
        self.result
    }

    /// Segment `[n_left, n_right]` the current value is valid on.
    pub fn segment(&self) -> (u64, u64) {
        (self.n_left, self.n_right)
    }

    fn advance(&mut self) {
        self.n_left = self.n_right + 1;
        let pm1 = (self.y_next - 1) as f64;
        let next = self.result * ((pm1 - 1.0) / pm1);
        if next == self.result {
            // precision plateau: no later factor changes the product
            self.n_right = u64::MAX;
            self.y_next = u64::MAX;
            return;
        }
        self.result = next;

        self.ptr += 1;
        if self.ptr >= self.primes.len() {
            if !self.warned_out {
                log::warn!(
                    "EulerProductSeries: need a prime > {} for next p^2 threshold",
                    self.y_next
                );
                self.warned_out = true;
            }
            self.n_right = u64::MAX;
            self.y_next = u64::MAX;
            return;
        }

        self.y_next = self.primes[self.ptr];
        self.n_right = match self.y_next.checked_mul(self.y_next) {
            Some(sq) => sq - 1,
            None => {
                self.y_next = u64::MAX;
                u64::MAX
            }
        };
    }
}
