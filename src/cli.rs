//! CLI argument parsing for vaultrisk

use crate::estimate::IntervalMethod;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "vaultrisk")]
#[command(version)]
#[command(
    about = "Categorize DeFi exploits by root cause and estimate annual base rates",
    long_about = None
)]
pub struct Cli {
    /// Exploit dataset (DeFiLlama-style CSV)
    #[arg(
        long = "csv",
        value_name = "PATH",
        default_value = "data/defi_exploits.csv",
        global = true
    )]
    pub csv: PathBuf,

    /// Keyword rule table (TOML) replacing the built-in rules
    #[arg(long = "rules", value_name = "PATH", global = true)]
    pub rules: Option<PathBuf>,

    /// Configuration file (TOML); CLI flags override its values
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Abort on the first malformed dataset row
    #[arg(long = "strict", global = true)]
    pub strict: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Estimate per-primitive annual base rates
    BaseRates(BaseRatesArgs),

    /// Categorize exploits and report keyword coverage
    Categorize(CategorizeArgs),

    /// Rank vault strategies by combined annual failure probability
    Profile(ProfileArgs),
}

/// Exposure and interval overrides shared by estimating commands
#[derive(Args, Debug, Clone, Default)]
pub struct EstimatorArgs {
    /// Protocol universe size N
    #[arg(long = "vaults", value_name = "N")]
    pub vaults: Option<u64>,

    /// Observation period T in years
    #[arg(long = "years", value_name = "T")]
    pub years: Option<f64>,

    /// Confidence level for intervals, in (0, 1)
    #[arg(long = "confidence", value_name = "LEVEL")]
    pub confidence: Option<f64>,

    /// Confidence interval method
    #[arg(long = "interval", value_enum)]
    pub interval: Option<IntervalMethod>,

    /// Use the dataset's stored primitive labels instead of recategorizing
    #[arg(long = "trust-labels")]
    pub trust_labels: bool,
}

#[derive(Args, Debug)]
pub struct BaseRatesArgs {
    #[command(flatten)]
    pub estimator: EstimatorArgs,

    /// Output format (text, json or csv)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also report base rates for N = 300, 500, 800, 1000
    #[arg(long = "sensitivity")]
    pub sensitivity: bool,

    /// Write the results artifact (JSON) to PATH
    #[arg(long = "save", value_name = "PATH")]
    pub save: Option<PathBuf>,

    /// Fail if recomputed results differ from the artifact at PATH
    #[arg(long = "verify-cache", value_name = "PATH")]
    pub verify_cache: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CategorizeArgs {
    /// Print per-primitive counts and keyword coverage
    #[arg(long = "summary")]
    pub summary: bool,

    /// Compare against stored labels and fail on any drift
    #[arg(long = "verify-labels")]
    pub verify_labels: bool,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub estimator: EstimatorArgs,

    /// Vault profiles (TOML) replacing the built-in examples
    #[arg(long = "profiles", value_name = "PATH")]
    pub profiles: Option<PathBuf>,

    /// Output format (text, json or csv)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,
}
