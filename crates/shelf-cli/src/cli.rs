//! CLI argument definitions for the `shelf` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use shelf_ingest::{DEFAULT_MOCK_SEED, DEFAULT_TIME_COLUMN};
use shelf_model::BoundKind;

#[derive(Parser)]
#[command(
    name = "shelf",
    version,
    about = "Stability trending and shelf-life estimation",
    long_about = "Fit degradation trends to pharmaceutical stability data, test whether \
                  lots can be pooled, and project when the one-sided bound crosses the \
                  specification limit."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyse a stability table and estimate shelf life per assay.
    Analyze(AnalyzeArgs),

    /// List the measurement columns of a stability table.
    Assays(AssaysArgs),

    /// Write a seeded synthetic stability study as CSV.
    Mock(MockArgs),
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Stability table (CSV with product_id, lot_id, a time column and assays).
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// TOML analysis configuration (default: built-in purity and impurity limits).
    #[arg(long = "config", short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Name of the time column (overrides the configuration).
    #[arg(long = "time-column", value_name = "NAME")]
    pub time_column: Option<String>,

    /// Analyse only this assay; repeat for several.
    #[arg(long = "assay", value_name = "NAME")]
    pub assays: Vec<String>,

    /// Analyse only this product.
    #[arg(long = "product", value_name = "ID")]
    pub product: Option<String>,

    /// Analyse only these lots; repeat for several.
    #[arg(long = "lot", value_name = "ID")]
    pub lots: Vec<String>,

    /// Poolability significance threshold.
    #[arg(long = "significance", value_name = "ALPHA")]
    pub significance: Option<f64>,

    /// One-sided bound level.
    #[arg(long = "confidence", value_name = "LEVEL")]
    pub confidence: Option<f64>,

    /// Extrapolation horizon as a multiple of the observed time span.
    #[arg(long = "horizon-factor", value_name = "FACTOR")]
    pub horizon_factor: Option<f64>,

    /// Bound placed around the fitted trend.
    #[arg(long = "bound", value_enum)]
    pub bound: Option<BoundArg>,

    /// Samples per reported band curve.
    #[arg(long = "curve-points", value_name = "N")]
    pub curve_points: Option<usize>,

    /// Write the full analysis as pretty JSON.
    #[arg(long = "json", value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Write fitted curves and bounds as CSV for charting.
    #[arg(long = "bands", value_name = "PATH")]
    pub bands: Option<PathBuf>,

    /// Analyse assays one after another instead of in parallel.
    #[arg(long = "sequential")]
    pub sequential: bool,
}

#[derive(Parser)]
pub struct AssaysArgs {
    /// Stability table to inspect.
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// TOML analysis configuration used to show limits.
    #[arg(long = "config", short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Name of the time column (overrides the configuration).
    #[arg(long = "time-column", value_name = "NAME")]
    pub time_column: Option<String>,
}

#[derive(Parser)]
pub struct MockArgs {
    /// Destination CSV file.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Random seed; the same seed always produces the same study.
    #[arg(long = "seed", default_value_t = DEFAULT_MOCK_SEED)]
    pub seed: u64,

    /// Name of the time column to write.
    #[arg(long = "time-column", value_name = "NAME", default_value = DEFAULT_TIME_COLUMN)]
    pub time_column: String,

    /// Also write the matching analysis configuration.
    #[arg(long = "config-out", value_name = "PATH")]
    pub config_out: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BoundArg {
    Confidence,
    Prediction,
}

impl From<BoundArg> for BoundKind {
    fn from(value: BoundArg) -> Self {
        match value {
            BoundArg::Confidence => BoundKind::Confidence,
            BoundArg::Prediction => BoundKind::Prediction,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
