//! # Goldbach core
//!
//! Number-theoretic kernel for Goldbach pair statistics over 2n.
//!
//! The crate works on an ascending table of 64-bit primes and provides
//! the pieces a sweep over n needs: an amortized O(1) two-pointer pair
//! counter, the window half-width policy, and the correction models
//! (Hardy–Littlewood factor, Euler product series, CRT-inspired deficit,
//! singular series).

pub mod constants;
pub mod deficit;
pub mod delta;
pub mod error;
pub mod euler;
pub mod hlcorr;
pub mod pairs;
pub mod primes;
pub mod singular;

pub use deficit::{AvailableDeficit, DeficitConfig};
pub use delta::{CompatVersion, DeltaOutcome, WindowPolicy};
pub use error::{GoldbachError, Result};
pub use euler::EulerProductSeries;
pub use hlcorr::{hl_corr, HlCorrInterpolator, HlCorrState};
pub use pairs::{count_pairs, count_ranged_pairs, find_pair, PairCursor};
pub use primes::{sieve_primes, PrimeTable};
pub use singular::two_sgb;
