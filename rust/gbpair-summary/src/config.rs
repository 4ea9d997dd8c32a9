//! Run configuration.
//!
//! [`RangeConfig`] is plain data: the CLI fills it from flags, or it is
//! loaded from a JSON file, and [`RangeConfig::validate`] checks it before
//! a sweep is built from it.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use goldbach_core::CompatVersion;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SummaryError};
use crate::output::{contains_key, ALPHA_KEY, FORMAT_KEY};
use crate::partition::AggregateKind;

/// Smallest n any aggregate may start at.
pub const MIN_N_START: u64 = 4;

/// Where pair counts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Exact two-pointer counts.
    #[default]
    Empirical,
    /// Hardy-Littlewood prediction `2·S(2n)·HLCorr`.
    #[serde(alias = "hl-a")]
    Hla,
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "empirical" => Ok(Self::Empirical),
            "hl-a" | "hla" => Ok(Self::Hla),
            other => Err(format!("unknown model '{}'", other)),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empirical => write!(f, "empirical"),
            Self::Hla => write!(f, "hl-a"),
        }
    }
}

/// Whether windows apply the Euler safety cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EulerCapMode {
    #[default]
    On,
    Off,
    /// On, except for v0.1.5 windows with alpha <= 0.5.
    Auto,
}

impl EulerCapMode {
    pub fn enabled_for(self, compat: CompatVersion, alpha: f64) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Auto => compat != CompatVersion::V015 || alpha > 0.5,
        }
    }
}

impl FromStr for EulerCapMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "true" => Ok(Self::On),
            "off" | "false" => Ok(Self::Off),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown euler cap mode '{}'", other)),
        }
    }
}

/// Output path templates of one aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub full: Option<String>,
    pub raw: Option<String>,
    pub norm: Option<String>,
    pub cps: Option<String>,
    pub bound_ratio_min: Option<String>,
    pub bound_ratio_max: Option<String>,
    pub cps_summary: Option<String>,
    pub cps_summary_resume: Option<String>,
}

impl OutputPaths {
    /// A full path carrying `-=FORMAT=-` also names the raw, norm and
    /// (empirical only) cps streams unless they were given explicitly.
    pub fn apply_format_defaults(&mut self, model: Model) {
        let Some(full) = self.full.clone() else {
            return;
        };
        if !contains_key(&full, FORMAT_KEY) {
            return;
        }
        self.raw.get_or_insert_with(|| full.clone());
        self.norm.get_or_insert_with(|| full.clone());
        if model == Model::Empirical {
            self.cps.get_or_insert(full);
        }
    }

    /// Per-window streams as `(option name, template)`.
    pub fn window_templates(&self) -> Vec<(&'static str, &str)> {
        [
            ("out", &self.full),
            ("raw", &self.raw),
            ("norm", &self.norm),
            ("cps", &self.cps),
            ("bound-ratio-min", &self.bound_ratio_min),
            ("bound-ratio-max", &self.bound_ratio_max),
        ]
        .into_iter()
        .filter_map(|(name, path)| path.as_deref().map(|p| (name, p)))
        .collect()
    }

    pub fn has_window_streams(&self) -> bool {
        !self.window_templates().is_empty()
    }

    /// Streams that replace the stdout trace when present.
    pub fn has_table_streams(&self) -> bool {
        self.full.is_some() || self.raw.is_some() || self.norm.is_some() || self.cps.is_some()
    }
}

/// Range and outputs of one aggregate kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub n_start: Option<u64>,
    pub n_end: Option<u64>,
    pub outputs: OutputPaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub alphas: Vec<f64>,
    pub compat: CompatVersion,
    pub model: Model,
    pub euler_cap: EulerCapMode,
    pub include_trivial: bool,
    /// Default start for every aggregate without its own.
    pub n_start: Option<u64>,
    /// Default end for every aggregate without its own.
    pub n_end: Option<u64>,
    /// Append to existing files and skip headers.
    pub append: bool,
    /// Print a `#` provenance line before any output.
    pub config_line: bool,
    /// Aggregate whose full rows go to stdout when no table stream is open.
    pub trace: Option<AggregateKind>,
    pub decade: AggregateConfig,
    pub primorial: AggregateConfig,
    pub psi: AggregateConfig,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            alphas: Vec::new(),
            compat: CompatVersion::Current,
            model: Model::Empirical,
            euler_cap: EulerCapMode::On,
            include_trivial: false,
            n_start: None,
            n_end: None,
            append: false,
            config_line: false,
            trace: Some(AggregateKind::Decade),
            decade: AggregateConfig::default(),
            primorial: AggregateConfig::default(),
            psi: AggregateConfig::default(),
        }
    }
}

impl RangeConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn aggregate(&self, kind: AggregateKind) -> &AggregateConfig {
        match kind {
            AggregateKind::Decade => &self.decade,
            AggregateKind::Primorial => &self.primorial,
            AggregateKind::Psi => &self.psi,
        }
    }

    pub fn aggregate_mut(&mut self, kind: AggregateKind) -> &mut AggregateConfig {
        match kind {
            AggregateKind::Decade => &mut self.decade,
            AggregateKind::Primorial => &mut self.primorial,
            AggregateKind::Psi => &mut self.psi,
        }
    }

    pub fn n_start(&self, kind: AggregateKind) -> u64 {
        let default = match kind {
            AggregateKind::Primorial => 6,
            _ => MIN_N_START,
        };
        self.aggregate(kind).n_start.or(self.n_start).unwrap_or(default)
    }

    pub fn n_end(&self, kind: AggregateKind) -> u64 {
        let default = match kind {
            AggregateKind::Primorial => 9,
            _ => 5,
        };
        self.aggregate(kind).n_end.or(self.n_end).unwrap_or(default)
    }

    /// Alphas sorted ascending without duplicates; 0.5 when none given.
    pub fn normalized_alphas(&self) -> Vec<f64> {
        let mut alphas = self.alphas.clone();
        alphas.sort_by(f64::total_cmp);
        alphas.dedup();
        if alphas.is_empty() {
            alphas.push(0.5);
        }
        alphas
    }

    /// Whether any aggregate writes a table stream of its own.
    pub fn has_table_streams(&self) -> bool {
        AggregateKind::ALL
            .iter()
            .any(|&kind| self.aggregate(kind).outputs.has_table_streams())
    }

    /// Fill in derived paths and check the whole configuration.
    pub fn validate(&mut self) -> Result<()> {
        let alphas = self.normalized_alphas();
        if let Some(bad) = alphas.iter().find(|a| !(0.0..=1.0).contains(*a)) {
            return Err(SummaryError::Config(format!("alpha {} is outside [0, 1]", bad)));
        }
        for kind in AggregateKind::ALL {
            let model = self.model;
            self.aggregate_mut(kind).outputs.apply_format_defaults(model);
        }
        for kind in AggregateKind::ALL {
            let (start, end) = (self.n_start(kind), self.n_end(kind));
            if start < MIN_N_START {
                return Err(SummaryError::Config(format!(
                    "{}-n-start ({}) must be at least {}",
                    kind.prefix(),
                    start,
                    MIN_N_START
                )));
            }
            if end <= start {
                return Err(SummaryError::Config(format!(
                    "{}-n-end ({}) must be > {}-n-start ({})",
                    kind.prefix(),
                    end,
                    kind.prefix(),
                    start
                )));
            }
            let outputs = &self.aggregate(kind).outputs;
            if self.model != Model::Empirical && (outputs.cps.is_some() || outputs.cps_summary.is_some()) {
                return Err(SummaryError::Config(format!(
                    "empirical model required for {} cps output",
                    kind.prefix()
                )));
            }
            if alphas.len() > 1 {
                for (name, template) in outputs.window_templates() {
                    if !contains_key(template, ALPHA_KEY) {
                        return Err(SummaryError::Config(format!(
                            "the {} macro is required with multiple alpha values: --{}-{}={}",
                            ALPHA_KEY,
                            kind.prefix(),
                            name,
                            template
                        )));
                    }
                }
            }
        }
        let any_window_streams = AggregateKind::ALL
            .iter()
            .any(|&kind| self.aggregate(kind).outputs.has_window_streams());
        if alphas.len() > 1 && !any_window_streams {
            return Err(SummaryError::Config(
                "multiple alpha values are not supported with trace output".to_string(),
            ));
        }
        Ok(())
    }

    /// The `#` provenance line.
    pub fn describe(&self) -> String {
        let alphas: Vec<String> = self.normalized_alphas().iter().map(|a| a.to_string()).collect();
        format!(
            "# alphas={} euler_cap={:?} include_trivial={} n_start={} n_end={} model={} compat={}",
            alphas.join(";"),
            self.euler_cap,
            self.include_trivial,
            self.n_start(AggregateKind::Decade),
            self.n_end(AggregateKind::Decade),
            self.model,
            self.compat
        )
    }
}
