//! Error type for the Goldbach kernel.

/// Errors raised by prime table loading and the pair-counting sweep.
#[derive(Debug, thiserror::Error)]
pub enum GoldbachError {
    #[error("prime table exhausted at n={n}; a larger table is required")]
    PrimesExhausted { n: u64 },

    #[error("Euler cap bound violated at n={n} (delta={delta}, cap={cap})")]
    EulerCapViolated { n: u64, delta: u64, cap: u64 },

    #[error("invalid prime table: {0}")]
    InvalidPrimeTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GoldbachError>;
