//! gbpairsummary CLI: Goldbach pair counts over windows of n, summarised
//! per decade, primorial and short interval.
//!
//! Examples:
//!   gbpairsummary --sieve-limit=2000000 --n-end=1000000 --dec-out=-
//!   gbpairsummary --primes=primes.bin --alpha=0.25 --alpha=0.5 \
//!       --n-end=100000000 --prim-out='prim_-=ALPHA=-_-=FORMAT=-.csv' \
//!       --prim-cps-summary=prim_cps_summary.csv
//!
//! Output paths are templates: `-=ALPHA=-` becomes the window's alpha and
//! `-=FORMAT=-` the stream name. `-` writes to stdout.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::info;

use gbpair_summary::{
    AggregateKind, EulerCapMode, GbRange, Model, OutputPaths, RangeConfig, Result, SummaryError,
};
use goldbach_core::{CompatVersion, PrimeTable};

/// Primes beyond 2·n_end the sieve adds so the pair walk never runs dry.
const SIEVE_MARGIN: u64 = 1_024;

#[derive(Parser, Debug)]
#[command(name = "gbpairsummary", version, about = "Windowed Goldbach pair summaries")]
struct Cli {
    /// Flat binary file of ascending native-endian u64 primes
    #[arg(long, conflicts_with = "sieve_limit")]
    primes: Option<PathBuf>,
    /// Sieve primes up to this limit instead of reading a file (default 2·n_end + 1024)
    #[arg(long)]
    sieve_limit: Option<u64>,
    /// Skip the O(P) ascending-order check of a mapped prime file
    #[arg(long)]
    skip_order_check: bool,
    /// JSON run configuration; flags given on the command line override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Window half-width multiplier in [0, 1]; repeat for several windows
    #[arg(long = "alpha", value_delimiter = ',')]
    alphas: Vec<f64>,
    /// empirical or hl-a
    #[arg(long)]
    model: Option<Model>,
    /// v0.1.5 or current
    #[arg(long)]
    compat: Option<CompatVersion>,
    /// Enable the Euler safety cap (default)
    #[arg(long, conflicts_with_all = ["no_euler_cap", "euler_cap_mode"])]
    euler_cap: bool,
    /// Disable the Euler safety cap
    #[arg(long, conflicts_with = "euler_cap_mode")]
    no_euler_cap: bool,
    /// on, off or auto
    #[arg(long)]
    euler_cap_mode: Option<EulerCapMode>,
    /// Count the pair (n, n) when n is prime
    #[arg(long)]
    include_trivial: bool,
    /// Append to existing files and skip headers
    #[arg(long)]
    append: bool,
    /// Print a commented provenance line first
    #[arg(long)]
    config_line: bool,
    /// Aggregate traced to stdout when no table output is given: decade, primorial, psi or none
    #[arg(long)]
    trace: Option<String>,

    #[arg(long, alias = "start-n")]
    n_start: Option<u64>,
    #[arg(long, alias = "end-n")]
    n_end: Option<u64>,
    #[arg(long, alias = "dec-start-n")]
    dec_n_start: Option<u64>,
    #[arg(long, alias = "dec-end-n")]
    dec_n_end: Option<u64>,
    #[arg(long, alias = "prim-start-n")]
    prim_n_start: Option<u64>,
    #[arg(long, alias = "prim-end-n")]
    prim_n_end: Option<u64>,
    #[arg(long)]
    psi_n_start: Option<u64>,
    #[arg(long)]
    psi_n_end: Option<u64>,

    #[arg(long)]
    dec_out: Option<String>,
    #[arg(long)]
    dec_raw: Option<String>,
    #[arg(long)]
    dec_norm: Option<String>,
    #[arg(long)]
    dec_cps: Option<String>,
    #[arg(long)]
    dec_bound_ratio_min: Option<String>,
    #[arg(long)]
    dec_bound_ratio_max: Option<String>,
    #[arg(long)]
    dec_cps_summary: Option<String>,
    #[arg(long)]
    dec_cps_summary_resume: Option<String>,

    #[arg(long)]
    prim_out: Option<String>,
    #[arg(long)]
    prim_raw: Option<String>,
    #[arg(long)]
    prim_norm: Option<String>,
    #[arg(long)]
    prim_cps: Option<String>,
    #[arg(long)]
    prim_bound_ratio_min: Option<String>,
    #[arg(long)]
    prim_bound_ratio_max: Option<String>,
    #[arg(long)]
    prim_cps_summary: Option<String>,
    #[arg(long)]
    prim_cps_summary_resume: Option<String>,

    #[arg(long)]
    psi_out: Option<String>,
    #[arg(long)]
    psi_raw: Option<String>,
    #[arg(long)]
    psi_norm: Option<String>,
    #[arg(long)]
    psi_cps: Option<String>,
    #[arg(long)]
    psi_bound_ratio_min: Option<String>,
    #[arg(long)]
    psi_bound_ratio_max: Option<String>,
    #[arg(long)]
    psi_cps_summary: Option<String>,
    #[arg(long)]
    psi_cps_summary_resume: Option<String>,
}

/// Overwrite `target` field by field with whatever the command line set.
fn merge_paths(target: &mut OutputPaths, cli: OutputPaths) {
    let pairs = [
        (&mut target.full, cli.full),
        (&mut target.raw, cli.raw),
        (&mut target.norm, cli.norm),
        (&mut target.cps, cli.cps),
        (&mut target.bound_ratio_min, cli.bound_ratio_min),
        (&mut target.bound_ratio_max, cli.bound_ratio_max),
        (&mut target.cps_summary, cli.cps_summary),
        (&mut target.cps_summary_resume, cli.cps_summary_resume),
    ];
    for (slot, value) in pairs {
        if value.is_some() {
            *slot = value;
        }
    }
}

fn parse_trace(value: &str) -> Result<Option<AggregateKind>> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value.parse().map(Some).map_err(SummaryError::Config)
}

impl Cli {
    fn into_config(self) -> Result<RangeConfig> {
        let mut config = match &self.config {
            Some(path) => RangeConfig::from_json_file(path)?,
            None => RangeConfig::default(),
        };
        if !self.alphas.is_empty() {
            config.alphas = self.alphas;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(compat) = self.compat {
            config.compat = compat;
        }
        if let Some(mode) = self.euler_cap_mode {
            config.euler_cap = mode;
        } else if self.no_euler_cap {
            config.euler_cap = EulerCapMode::Off;
        } else if self.euler_cap {
            config.euler_cap = EulerCapMode::On;
        }
        config.include_trivial |= self.include_trivial;
        config.append |= self.append;
        config.config_line |= self.config_line;
        if let Some(trace) = &self.trace {
            config.trace = parse_trace(trace)?;
        }
        config.n_start = self.n_start.or(config.n_start);
        config.n_end = self.n_end.or(config.n_end);

        let per_kind = [
            (
                AggregateKind::Decade,
                self.dec_n_start,
                self.dec_n_end,
                OutputPaths {
                    full: self.dec_out,
                    raw: self.dec_raw,
                    norm: self.dec_norm,
                    cps: self.dec_cps,
                    bound_ratio_min: self.dec_bound_ratio_min,
                    bound_ratio_max: self.dec_bound_ratio_max,
                    cps_summary: self.dec_cps_summary,
                    cps_summary_resume: self.dec_cps_summary_resume,
                },
            ),
            (
                AggregateKind::Primorial,
                self.prim_n_start,
                self.prim_n_end,
                OutputPaths {
                    full: self.prim_out,
                    raw: self.prim_raw,
                    norm: self.prim_norm,
                    cps: self.prim_cps,
                    bound_ratio_min: self.prim_bound_ratio_min,
                    bound_ratio_max: self.prim_bound_ratio_max,
                    cps_summary: self.prim_cps_summary,
                    cps_summary_resume: self.prim_cps_summary_resume,
                },
            ),
            (
                AggregateKind::Psi,
                self.psi_n_start,
                self.psi_n_end,
                OutputPaths {
                    full: self.psi_out,
                    raw: self.psi_raw,
                    norm: self.psi_norm,
                    cps: self.psi_cps,
                    bound_ratio_min: self.psi_bound_ratio_min,
                    bound_ratio_max: self.psi_bound_ratio_max,
                    cps_summary: self.psi_cps_summary,
                    cps_summary_resume: self.psi_cps_summary_resume,
                },
            ),
        ];
        for (kind, n_start, n_end, outputs) in per_kind {
            let agg = config.aggregate_mut(kind);
            agg.n_start = n_start.or(agg.n_start);
            agg.n_end = n_end.or(agg.n_end);
            merge_paths(&mut agg.outputs, outputs);
        }
        Ok(config)
    }
}

fn load_primes(
    primes: Option<PathBuf>,
    sieve_limit: Option<u64>,
    verify_order: bool,
    config: &RangeConfig,
) -> Result<PrimeTable> {
    if let Some(path) = primes {
        return Ok(PrimeTable::open_with(path, verify_order)?);
    }
    let max_end = AggregateKind::ALL
        .iter()
        .map(|&kind| config.n_end(kind))
        .max()
        .unwrap_or(0);
    let limit = sieve_limit.unwrap_or_else(|| max_end.saturating_mul(2).saturating_add(SIEVE_MARGIN));
    info!("sieving primes up to {}", limit);
    Ok(PrimeTable::sieve(limit)?)
}

fn run(cli: Cli) -> Result<()> {
    let primes = cli.primes.clone();
    let sieve_limit = cli.sieve_limit;
    let verify_order = !cli.skip_order_check;
    let mut config = cli.into_config()?;
    config.validate()?;
    if config.config_line {
        println!("{}", config.describe());
    }

    let table = load_primes(primes, sieve_limit, verify_order, &config)?;
    let mut range = GbRange::new(&config, table.as_slice())?;
    range.run()?;
    info!("done");
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
