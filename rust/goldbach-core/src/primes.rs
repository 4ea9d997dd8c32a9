//! Prime tables.
//!
//! A table is an immutable, strictly ascending sequence of u64 primes. It is
//! either memory-mapped from a flat binary file of native-endian u64 values
//! (the format written by [`write_prime_table`]) or built in memory with
//! [`sieve_primes`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::mem::{align_of, size_of};
use std::path::Path;

use memmap2::Mmap;

use crate::error::{GoldbachError, Result};

enum Storage {
    Mapped(Mmap),
    Owned(Vec<u64>),
}

/// Read-only ascending prime sequence.
pub struct PrimeTable {
    storage: Storage,
}

impl PrimeTable {
    /// Map a binary prime file and verify that it is strictly ascending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, true)
    }

    /// Map a binary prime file.
    ///
    /// # Arguments
    /// * `path` - file of native-endian u64 primes, conventionally starting at 2
    /// * `verify_order` - scan the whole table for strict ascending order;
    ///   this is O(P) and may be skipped for very large certified tables
    pub fn open_with(path: impl AsRef<Path>, verify_order: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let byte_len = file.metadata()?.len();
        if byte_len == 0 {
            return Err(GoldbachError::InvalidPrimeTable(format!(
                "{} is empty",
                path.display()
            )));
        }
        if byte_len % size_of::<u64>() as u64 != 0 {
            return Err(GoldbachError::InvalidPrimeTable(format!(
                "{} has {} bytes, not a multiple of 8",
                path.display(),
                byte_len
            )));
        }

        // SAFETY: the map is read-only and the table is treated as immutable
        // for the lifetime of the run.
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.as_ptr().align_offset(align_of::<u64>()) != 0 {
            return Err(GoldbachError::InvalidPrimeTable(format!(
                "{} mapped at an unaligned address",
                path.display()
            )));
        }

        let table = Self {
            storage: Storage::Mapped(mmap),
        };
        if verify_order {
            table.verify()?;
        }
        log::info!(
            "mapped {} primes from {} (largest {})",
            table.len(),
            path.display(),
            table.last().unwrap_or(0)
        );
        Ok(table)
    }

    /// Wrap an in-memory prime list after checking it is non-empty and ascending.
    pub fn from_vec(primes: Vec<u64>) -> Result<Self> {
        let table = Self {
            storage: Storage::Owned(primes),
        };
        if table.is_empty() {
            return Err(GoldbachError::InvalidPrimeTable("no primes".to_string()));
        }
        table.verify()?;
        Ok(table)
    }

    /// Build a table with every prime up to and including `limit`.
    pub fn sieve(limit: u64) -> Result<Self> {
        Self::from_vec(sieve_primes(limit))
    }

    pub fn as_slice(&self) -> &[u64] {
        match &self.storage {
            Storage::Owned(primes) => primes,
            Storage::Mapped(mmap) => {
                let len = mmap.len() / size_of::<u64>();
                // SAFETY: alignment and length were checked in `open_with`;
                // every bit pattern is a valid u64.
                unsafe { std::slice::from_raw_parts(mmap.as_ptr() as *const u64, len) }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn first(&self) -> Option<u64> {
        self.as_slice().first().copied()
    }

    pub fn last(&self) -> Option<u64> {
        self.as_slice().last().copied()
    }

    /// Whether the table was memory-mapped rather than built in memory.
    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped(_))
    }

    fn verify(&self) -> Result<()> {
        let primes = self.as_slice();
        if let Some(i) = primes.windows(2).position(|w| w[0] >= w[1]) {
            log::error!(
                "prime table not strictly ascending at index {}: {} >= {}",
                i,
                primes[i],
                primes[i + 1]
            );
            return Err(GoldbachError::InvalidPrimeTable(format!(
                "not strictly ascending at index {}",
                i
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for PrimeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimeTable")
            .field("len", &self.len())
            .field("first", &self.first())
            .field("last", &self.last())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// Write primes as native-endian u64 values, the layout [`PrimeTable::open`] maps.
pub fn write_prime_table(path: impl AsRef<Path>, primes: &[u64]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for p in primes {
        out.write_all(&p.to_ne_bytes())?;
    }
    out.flush()?;
    Ok(())
}

/// Generate all primes up to `limit` using the Sieve of Eratosthenes.
pub fn sieve_primes(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return Vec::new();
    }
    let size = (limit + 1) as usize;
    let mut is_prime = vec![true; size];
    is_prime[0] = false;
    is_prime[1] = false;
    let mut i = 2usize;
    while i * i < size {
        if is_prime[i] {
            let mut j = i * i;
            while j < size {
                is_prime[j] = false;
                j += i;
            }
        }
        i += 1;
    }
    is_prime
        .iter()
        .enumerate()
        .filter(|(_, &p)| p)
        .map(|(i, _)| i as u64)
        .collect()
}

/// Deterministic trial-division primality test for small reference checks.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    while d.saturating_mul(d) <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sieve_small() {
        assert_eq!(sieve_primes(30), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert!(sieve_primes(1).is_empty());
        assert_eq!(sieve_primes(2), vec![2]);
    }

    #[test]
    fn test_sieve_agrees_with_trial_division() {
        let sieved = sieve_primes(2_000);
        let trial: Vec<u64> = (0..=2_000).filter(|&n| is_prime(n)).collect();
        assert_eq!(sieved, trial);
    }

    #[test]
    fn test_from_vec_rejects_unsorted() {
        assert!(PrimeTable::from_vec(vec![2, 5, 3]).is_err());
        assert!(PrimeTable::from_vec(vec![2, 3, 3]).is_err());
        assert!(PrimeTable::from_vec(Vec::new()).is_err());
    }

    #[test]
    fn test_mapped_table_matches_sieve() {
        let primes = sieve_primes(10_000);
        let file = tempfile::NamedTempFile::new().unwrap();
        write_prime_table(file.path(), &primes).unwrap();

        let table = PrimeTable::open(file.path()).unwrap();
        assert!(table.is_mapped());
        assert_eq!(table.as_slice(), primes.as_slice());
        assert_eq!(table.first(), Some(2));
        assert_eq!(table.last(), Some(9973));
    }

    #[test]
    fn test_open_rejects_truncated_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), [2u8, 0, 0]).unwrap();
        match PrimeTable::open(file.path()) {
            Err(GoldbachError::InvalidPrimeTable(msg)) => assert!(msg.contains("multiple of 8")),
            other => panic!("expected InvalidPrimeTable, got {:?}", other),
        }
    }

    #[test]
    fn test_open_rejects_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            PrimeTable::open(file.path()),
            Err(GoldbachError::InvalidPrimeTable(_))
        ));
    }
}
