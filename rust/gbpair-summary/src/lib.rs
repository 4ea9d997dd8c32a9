//! gbpair-summary: multi-scale windowed summaries of Goldbach pair counts.
//!
//! For every n in a range and every window half-width multiplier alpha, the
//! sweep counts the Goldbach pairs of 2n with both primes within delta(n)
//! of n (or predicts them with the Hardy-Littlewood model), normalises the
//! count to C(n), and summarises it over three families of intervals:
//! decades, odd-primorial multiples and short (PSI) intervals. Each closed
//! interval yields CSV rows with its extrema, averages and the points where
//! C(n) meets the Euler-product and asymptotic baselines.

pub mod config;
pub mod cps;
pub mod error;
pub mod extrema;
pub mod output;
pub mod partition;
pub mod range;
pub mod summary;
pub mod window;

pub use config::{AggregateConfig, EulerCapMode, Model, OutputPaths, RangeConfig};
pub use cps::{read_cps_summary, CpsSummaryRow};
pub use error::{Result, SummaryError};
pub use partition::{AggregateKind, Interval, Partitioner};
pub use range::GbRange;
