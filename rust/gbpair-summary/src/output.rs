//! CSV sinks, path templates and row formatting.
//!
//! Every stream is a plain comma-separated text file. Output paths are
//! templates: `-=ALPHA=-` expands to the window's alpha (`%.12g`) and
//! `-=FORMAT=-` to the stream name (`full`, `raw`, `norm`, `cps`,
//! `bound-ratio-min`, `bound-ratio-max`, `cps-summary`). A path of `-`
//! writes to stdout.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};

use crate::config::Model;
use crate::error::Result;
use crate::extrema::{is_sentinel, ExtremaValues};
use crate::partition::Interval;
use crate::summary::{CpsPoint, IntervalSummary};

pub const ALPHA_KEY: &str = "-=ALPHA=-";
pub const FORMAT_KEY: &str = "-=FORMAT=-";

pub const BOUND_RATIO_HEADER: &str = "n,ratio,c_bound,baseline,c_meas,lambda,status";

/// Buffered line writer over a file or stdout.
pub struct Sink {
    name: String,
    writer: Box<dyn Write>,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("name", &self.name).finish()
    }
}

impl Sink {
    /// Open `path` for writing; `-` is stdout.
    pub fn open(path: &str, append: bool) -> Result<Self> {
        if path == "-" {
            return Ok(Self::from_writer("-", Box::new(BufWriter::new(io::stdout()))));
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Self::from_writer(path, Box::new(BufWriter::new(file))))
    }

    pub fn from_writer(name: &str, writer: Box<dyn Write>) -> Self {
        Self {
            name: name.to_string(),
            writer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_stdout(&self) -> bool {
        self.name == "-"
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// The per-window streams of one aggregate.
#[derive(Debug, Default)]
pub struct IntervalSinks {
    pub full: Option<Sink>,
    /// Copy of the full stream, usually stdout.
    pub trace: Option<Sink>,
    pub raw: Option<Sink>,
    pub norm: Option<Sink>,
    pub cps: Option<Sink>,
    pub bound_ratio_min: Option<Sink>,
    pub bound_ratio_max: Option<Sink>,
}

impl IntervalSinks {
    /// Whether any stream wants rows from this aggregate.
    pub fn is_active(&self) -> bool {
        self.full.is_some()
            || self.trace.is_some()
            || self.raw.is_some()
            || self.norm.is_some()
            || self.cps.is_some()
            || self.bound_ratio_min.is_some()
            || self.bound_ratio_max.is_some()
    }

    pub fn wants_bound_ratio(&self) -> bool {
        self.bound_ratio_min.is_some() || self.bound_ratio_max.is_some()
    }

    /// Write the full row to the full stream and its trace copy.
    pub fn write_full(&mut self, line: &str) -> Result<()> {
        for sink in [self.full.as_mut(), self.trace.as_mut()].into_iter().flatten() {
            sink.write_line(line)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for sink in self.iter_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Flush and drop every stream.
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        *self = Self::default();
        Ok(())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Sink> {
        [
            self.full.as_mut(),
            self.trace.as_mut(),
            self.raw.as_mut(),
            self.norm.as_mut(),
            self.cps.as_mut(),
            self.bound_ratio_min.as_mut(),
            self.bound_ratio_max.as_mut(),
        ]
        .into_iter()
        .flatten()
    }
}

pub fn contains_key(template: &str, key: &str) -> bool {
    template.contains(key)
}

/// Expand the alpha and format placeholders of an output path.
pub fn expand_template(template: &str, alpha: f64, format: &str) -> String {
    template.replace(ALPHA_KEY, &fmt_alpha(alpha)).replace(FORMAT_KEY, format)
}

/// Alpha as printed in paths and the cps summary (`%.12g`).
pub fn fmt_alpha(alpha: f64) -> String {
    fmt_g(alpha, 12)
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// printf-style `%.{precision}g`: shortest of fixed or exponent notation
/// with `precision` significant digits and trailing zeros removed.
pub fn fmt_g(x: f64, precision: usize) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    if !x.is_finite() {
        return x.to_string();
    }
    let p = precision.max(1);
    let sci = format!("{:.*e}", p - 1, x);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= p as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_fraction_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        strip_fraction_zeros(&format!("{:.*}", decimals, x)).to_string()
    }
}

/// `%.8f`, or an empty field for sentinels.
fn fmt_bounded(x: f64) -> String {
    if is_sentinel(x) {
        String::new()
    } else {
        format!("{:.8}", x)
    }
}

/// The crossing location as printed in cps rows: empty while it lies
/// before the aggregate's first n (it came from an earlier run).
pub fn fmt_pre_mertens(pre_mertens: u64, n_start: u64) -> String {
    if pre_mertens == 0 || pre_mertens >= n_start {
        pre_mertens.to_string()
    } else {
        String::new()
    }
}

pub fn full_header(model: Model, legacy: bool) -> &'static str {
    match (legacy, model) {
        (true, Model::Empirical) => "DECADE,MIN AT,MIN,MAX AT,MAX,n_0,C_min,n_1,C_max,n_geom,<COUNT>,C_avg",
        (true, Model::Hla) => {
            "DECADE,MIN AT,MIN,MAX AT,MAX,n_0,Cpred_min,n_1,Cpred_max,N_geom,<COUNT>,Cpred_avg,HLCorr"
        }
        (false, Model::Empirical) => {
            "FIRST,LAST,START,minAt,G(minAt),maxAt,G(maxAt),n_0,C_min(n_0),n_1,C_max(n_1),n_geom,<COUNT>,C_avg"
        }
        (false, Model::Hla) => {
            "FIRST,LAST,START,minAt*,Gpred(minAt*),maxAt*,Gpred(maxAt*),n_0*,Cpred_min(n_0*),n_1*,Cpred_max(n_1*),n_geom,<COUNT>*,Cpred_avg"
        }
    }
}

pub fn raw_header(model: Model) -> &'static str {
    match model {
        Model::Empirical => "FIRST,LAST,START,minAt,G(minAt),maxAt,G(maxAt),n_geom,<COUNT>",
        Model::Hla => "FIRST,LAST,START,minAt*,Gpred(minAt*),maxAt*,Gpred(maxAt*),n_geom,<COUNT>*",
    }
}

pub fn norm_header(model: Model) -> &'static str {
    match model {
        Model::Empirical => "FIRST,LAST,START,n_0,C_min(n_0),n_1,C_max(n_1),n_geom,<COUNT>,C_avg",
        Model::Hla => "FIRST,LAST,START,n_0*,Cpred_min(n_0*),n_1*,Cpred_max(n_1*),n_geom,Cpred_avg",
    }
}

pub fn cps_header(legacy: bool) -> &'static str {
    if legacy {
        "Dec.,n_0,Cmin,Cminus,Cmin-Cminus,CminusAsym,Cmin-CminusAsym"
    } else {
        "n,C(n),Cminus(n),C(n)-Cminus(n),CminusAsym(n),C(n)-CminusAsym(n),preMertens,preMertensAsymp,alpha(n)"
    }
}

/// Legacy tables print n_geom as an odd integer once it reaches 10.
fn legacy_n_geom(n_geom: f64) -> u64 {
    let floor = n_geom.floor() as u64;
    if n_geom >= 10.0 {
        floor | 1
    } else {
        floor
    }
}

/// One row of the full stream.
pub fn full_row(model: Model, legacy: bool, interval: &Interval, s: &IntervalSummary) -> String {
    let (min_at, pc_min) = s.pair_count_min(legacy);
    let (max_at, pc_max) = s.pair_count_max();
    let (n0, c_min) = s.c_min();
    let (n1, c_max) = s.c_max();
    if !legacy {
        let counts = match model {
            Model::Empirical => format!("{},{:.0},{},{:.0}", min_at, pc_min, max_at, pc_max),
            Model::Hla => format!("{},{:.3},{},{:.3}", min_at, pc_min, max_at, pc_max),
        };
        return format!(
            "{},{},{},{},{},{:.6},{},{:.8},{:.0},{:.6},{:.9}",
            interval.left,
            interval.right - 1,
            interval.label,
            counts,
            n0,
            c_min,
            n1,
            c_max,
            interval.n_geom,
            s.pair_count_avg(),
            s.c_avg()
        );
    }
    let n_geom = legacy_n_geom(interval.n_geom);
    match model {
        Model::Empirical => format!(
            "{},{},{:.0},{},{:.0},{},{:.6},{},{:.6},{},{:.6},{:.6}",
            interval.label,
            min_at,
            pc_min,
            max_at,
            pc_max,
            n0,
            c_min,
            n1,
            c_max,
            n_geom,
            s.pair_count_avg(),
            s.c_avg()
        ),
        Model::Hla => format!(
            "{},{},{:.6},{},{:.6},{},{:.8},{},{:.8},{},{:.8},{:.8},{:.8}",
            interval.label,
            min_at,
            pc_min,
            max_at,
            pc_max,
            n0,
            c_min,
            n1,
            c_max,
            n_geom,
            s.pair_count_avg(),
            s.c_avg(),
            s.hl_corr_avg
        ),
    }
}

pub fn raw_row(model: Model, interval: &Interval, s: &IntervalSummary) -> String {
    let (min_at, pc_min) = s.pair_count_min(false);
    let (max_at, pc_max) = s.pair_count_max();
    let counts = match model {
        Model::Empirical => format!("{},{:.0},{},{:.0}", min_at, pc_min, max_at, pc_max),
        Model::Hla => format!("{},{:.3},{},{:.3}", min_at, pc_min, max_at, pc_max),
    };
    format!(
        "{},{},{},{},{:.0},{:.6}",
        interval.left,
        interval.right - 1,
        interval.label,
        counts,
        interval.n_geom,
        s.pair_count_avg()
    )
}

/// One row of the norm stream. The empirical layout also carries the
/// average pair count.
pub fn norm_row(model: Model, interval: &Interval, s: &IntervalSummary) -> String {
    let (n0, c_min) = s.c_min();
    let (n1, c_max) = s.c_max();
    let head = format!(
        "{},{},{},{},{:.6},{},{:.8},{:.0}",
        interval.left,
        interval.right - 1,
        interval.label,
        n0,
        c_min,
        n1,
        c_max,
        interval.n_geom
    );
    match model {
        Model::Empirical => format!("{},{:.6},{:.9}", head, s.pair_count_avg(), s.c_avg()),
        Model::Hla => format!("{},{:.9}", head, s.c_avg()),
    }
}

/// Crossing state printed next to every cps row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpsContext {
    pub alpha_n: f64,
    pub n_start: u64,
    pub pre_mertens: u64,
    pub pre_mertens_asymp: u64,
}

pub fn cps_row(p: &CpsPoint, ctx: &CpsContext) -> String {
    format!(
        "{},{:.6},{:.6},{:.6},{:.6},{:.6},{},{},{:.12}",
        p.n,
        p.c,
        p.cminus,
        p.delta_c(),
        p.cminus_asymp,
        p.delta_c_asymp(),
        fmt_pre_mertens(ctx.pre_mertens, ctx.n_start),
        fmt_pre_mertens(ctx.pre_mertens_asymp, ctx.n_start),
        ctx.alpha_n
    )
}

pub fn cps_row_legacy(decade: u32, p: &CpsPoint) -> String {
    format!(
        "{},{},{:.6},{:.6},{:.6},{:.6},{:.6}",
        decade,
        p.n,
        p.c,
        p.cminus,
        p.delta_c(),
        p.cminus_asymp,
        p.delta_c_asymp()
    )
}

/// Bound-ratio row for the first extremum, `None` when nothing was tracked.
pub fn bound_ratio_row(e: &ExtremaValues, status: impl fmt::Display) -> Option<String> {
    if e.is_empty() {
        return None;
    }
    Some(format!(
        "{},{},{},{},{:.8},{},{}",
        e.n_first(),
        fmt_bounded(e.first_ratio()),
        fmt_bounded(e.c_first()),
        fmt_bounded(e.baseline_first()),
        e.extra_first(),
        fmt_bounded(e.lambda()),
        status
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::BoundStatus;

    #[test]
    fn test_fmt_g() {
        assert_eq!(fmt_g(0.5, 12), "0.5");
        assert_eq!(fmt_g(1.0, 12), "1");
        assert_eq!(fmt_g(0.25, 12), "0.25");
        assert_eq!(fmt_g(0.1, 12), "0.1");
        assert_eq!(fmt_g(0.0, 12), "0");
        assert_eq!(fmt_g(1e-5, 12), "1e-05");
        assert_eq!(fmt_g(123456.0, 3), "1.23e+05");
        assert_eq!(fmt_g(2.0 / 3.0, 6), "0.666667");
    }

    #[test]
    fn test_expand_template() {
        let t = "out/gb_-=ALPHA=-_-=FORMAT=-.csv";
        assert!(contains_key(t, ALPHA_KEY));
        assert_eq!(expand_template(t, 0.5, "full"), "out/gb_0.5_full.csv");
        assert_eq!(expand_template("plain.csv", 0.5, "raw"), "plain.csv");
    }

    #[test]
    fn test_pre_mertens_field() {
        assert_eq!(fmt_pre_mertens(0, 100), "0");
        assert_eq!(fmt_pre_mertens(50, 100), "");
        assert_eq!(fmt_pre_mertens(150, 100), "150");
    }

    #[test]
    fn test_legacy_n_geom() {
        assert_eq!(legacy_n_geom(4.47), 4);
        assert_eq!(legacy_n_geom(14.1), 15);
        assert_eq!(legacy_n_geom(15.9), 15);
    }

    #[test]
    fn test_full_row_layout() {
        let mut s = IntervalSummary::new();
        s.pair_count = 2.0;
        s.c_of_n = 1.5;
        s.aggregate(10, 5, 1.0, 1.0, false);
        s.calc_average(1);
        let interval = Interval {
            left: 10,
            right: 11,
            label: "10".to_string(),
            n_geom: 10.0,
        };
        let row = full_row(Model::Empirical, false, &interval, &s);
        assert_eq!(row, "10,10,10,10,2,10,2,10,1.500000,10,1.50000000,10,2.000000,1.500000000");
        assert_eq!(row.split(',').count(), full_header(Model::Empirical, false).split(',').count());
        let raw = raw_row(Model::Empirical, &interval, &s);
        assert_eq!(raw.split(',').count(), raw_header(Model::Empirical).split(',').count());
        for model in [Model::Empirical, Model::Hla] {
            let norm = norm_row(model, &interval, &s);
            assert_eq!(norm.split(',').count(), norm_header(model).split(',').count());
        }
        let legacy = full_row(Model::Empirical, true, &interval, &s);
        assert_eq!(legacy.split(',').count(), full_header(Model::Empirical, true).split(',').count());
    }

    #[test]
    fn test_cps_rows() {
        let p = CpsPoint {
            n: 19,
            c: 1.25,
            cminus: 1.0,
            cminus_asymp: 1.5,
        };
        let ctx = CpsContext {
            alpha_n: 0.5,
            n_start: 4,
            pre_mertens: 0,
            pre_mertens_asymp: 17,
        };
        assert_eq!(
            cps_row(&p, &ctx),
            "19,1.250000,1.000000,0.250000,1.500000,-0.250000,0,17,0.500000000000"
        );
        assert_eq!(cps_row_legacy(1, &p), "1,19,1.250000,1.000000,0.250000,1.500000,-0.250000");
    }

    #[test]
    fn test_bound_ratio_row() {
        let mut e = ExtremaValues::new();
        assert!(bound_ratio_row(&e, BoundStatus::Expected).is_none());
        e.put_maxima_ratio(1.0, 0.5, 1.5, 42, 21, 1.0);
        let row = bound_ratio_row(&e, e.max_bound_status()).unwrap();
        assert_eq!(row, "42,0.50000000,2.00000000,1.50000000,1.00000000,-0.69314718,EXPECTED");

        let mut zero = ExtremaValues::new();
        zero.put_maxima_ratio(1.0, 0.0, 0.0, 7, 1, 1.0);
        let row = bound_ratio_row(&zero, zero.max_bound_status()).unwrap();
        assert_eq!(row, "7,,0.00000000,0.00000000,1.00000000,,VIOLATED");
    }
}
