//! Crossing-point summary rows: one per window and aggregate, written when
//! the aggregate closes and read back to resume a later run.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::warn;

use crate::error::Result;
use crate::output::fmt_alpha;

pub const CPS_SUMMARY_HEADER: &str = "FIRST,LAST,Alpha,PreMertens,Mertens,DeltaMertens,n_5percent,NzeroStat,EtaStat,MertensAsymp,DeltaMertensAsymp,NzeroStatAsymp,EtaStatAsymp";

/// Field count of the current layout.
const FIELDS: usize = 13;
/// Field count of files written before the asymptotic columns existed.
const LEGACY_FIELDS: usize = 9;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpsSummaryRow {
    pub first: u64,
    pub last: u64,
    pub alpha: f64,
    pub pre_mertens: u64,
    pub nstar: u64,
    pub delta_mertens: f64,
    pub n_5percent: u64,
    pub nzero_stat: u64,
    pub eta_stat: f64,
    pub nstar_asymp: u64,
    pub delta_mertens_asymp: f64,
    pub nzero_stat_asymp: u64,
    pub eta_stat_asymp: f64,
}

/// Whether a line is a header rather than data.
pub fn is_header(line: &str) -> bool {
    line.contains("FIRST") || line.contains("Alpha")
}

fn field<T: std::str::FromStr>(fields: &[&str], idx: usize, name: &str) -> std::result::Result<T, String> {
    fields[idx]
        .parse()
        .map_err(|_| format!("bad {} '{}'", name, fields[idx]))
}

impl CpsSummaryRow {
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{:.6},{},{},{:.6},{},{:.6},{},{:.6}",
            self.first,
            self.last,
            fmt_alpha(self.alpha),
            self.pre_mertens,
            self.nstar,
            self.delta_mertens,
            self.n_5percent,
            self.nzero_stat,
            self.eta_stat,
            self.nstar_asymp,
            self.delta_mertens_asymp,
            self.nzero_stat_asymp,
            self.eta_stat_asymp
        )
    }

    /// Parse a 13-field row, or a 9-field legacy row whose asymptotic
    /// columns default to zero.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != FIELDS && fields.len() != LEGACY_FIELDS {
            return Err(format!("expected {} or {} fields, found {}", FIELDS, LEGACY_FIELDS, fields.len()));
        }
        let mut row = Self {
            first: field(&fields, 0, "FIRST")?,
            last: field(&fields, 1, "LAST")?,
            alpha: field(&fields, 2, "Alpha")?,
            pre_mertens: field(&fields, 3, "PreMertens")?,
            nstar: field(&fields, 4, "Mertens")?,
            delta_mertens: field(&fields, 5, "DeltaMertens")?,
            n_5percent: field(&fields, 6, "n_5percent")?,
            nzero_stat: field(&fields, 7, "NzeroStat")?,
            eta_stat: field(&fields, 8, "EtaStat")?,
            ..Self::default()
        };
        if fields.len() == FIELDS {
            row.nstar_asymp = field(&fields, 9, "MertensAsymp")?;
            row.delta_mertens_asymp = field(&fields, 10, "DeltaMertensAsymp")?;
            row.nzero_stat_asymp = field(&fields, 11, "NzeroStatAsymp")?;
            row.eta_stat_asymp = field(&fields, 12, "EtaStatAsymp")?;
        }
        Ok(row)
    }

    pub fn matches_alpha(&self, alpha: f64) -> bool {
        (self.alpha - alpha).abs() <= 1e-12
    }
}

/// Read every well-formed row of a cps summary file, in file order.
///
/// Headers and blank lines are skipped; malformed rows are logged and
/// skipped.
pub fn read_cps_summary(path: impl AsRef<Path>) -> Result<Vec<CpsSummaryRow>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || is_header(line) {
            continue;
        }
        match CpsSummaryRow::parse(line) {
            Ok(row) => rows.push(row),
            Err(e) => warn!("{}:{}: skipping cps summary row: {}", path.display(), idx + 1, e),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> CpsSummaryRow {
        CpsSummaryRow {
            first: 4,
            last: 1_000_000,
            alpha: 0.5,
            pre_mertens: 1_234,
            nstar: 5_678,
            delta_mertens: 0.012345,
            n_5percent: 100,
            nzero_stat: 9_000,
            eta_stat: 0.25,
            nstar_asymp: 777,
            delta_mertens_asymp: 0.5,
            nzero_stat_asymp: 8_000,
            eta_stat_asymp: 0.125,
        }
    }

    #[test]
    fn test_line_layout() {
        let line = sample().to_line();
        assert_eq!(
            line,
            "4,1000000,0.5,1234,5678,0.012345,100,9000,0.250000,777,0.500000,8000,0.125000"
        );
        assert_eq!(line.split(',').count(), CPS_SUMMARY_HEADER.split(',').count());
        assert_eq!(CpsSummaryRow::parse(&line).unwrap(), sample());
    }

    #[test]
    fn test_parse_legacy_row() {
        let row = CpsSummaryRow::parse("4,100,0.25,17,19,0.5,10,23,0.1").unwrap();
        assert_eq!(row.pre_mertens, 17);
        assert_eq!(row.nzero_stat, 23);
        assert_eq!(row.nstar_asymp, 0);
        assert_eq!(row.eta_stat_asymp, 0.0);
        assert!(row.matches_alpha(0.25));
        assert!(!row.matches_alpha(0.2500001));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CpsSummaryRow::parse("1,2,3").is_err());
        assert!(CpsSummaryRow::parse("a,100,0.25,17,19,0.5,10,23,0.1").is_err());
    }

    #[test]
    fn test_header_detection() {
        assert!(is_header(CPS_SUMMARY_HEADER));
        assert!(is_header("first,last,Alpha"));
        assert!(!is_header("4,100,0.5,1,2,0.1,3,4,0.2"));
    }

    #[test]
    fn test_read_skips_header_and_bad_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", CPS_SUMMARY_HEADER).unwrap();
        writeln!(file, "{}", sample().to_line()).unwrap();
        writeln!(file, "not,a,row").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "4,100,0.25,17,19,0.5,10,23,0.1").unwrap();
        file.flush().unwrap();

        let rows = read_cps_summary(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], sample());
        assert_eq!(rows[1].alpha, 0.25);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_cps_summary(dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, crate::error::SummaryError::Io(_)));
    }
}
