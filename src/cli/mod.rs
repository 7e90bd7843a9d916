//! Command-line parsing for the population reconciliation tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the estimation/sampling code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "recon",
    version,
    about = "Reconcile population estimates and locate structural breaks in their discrepancies"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load source CSVs, run both estimators, and fit a changepoint to each discrepancy.
    Run(RunArgs),
}

/// Options for a reconciliation run.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Directory holding the source CSV files (defaults to `RECON_DATA_DIR`, then `data`).
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Cohort anchor year (defaults to the earliest official year).
    #[arg(long)]
    pub anchor_year: Option<i32>,

    /// Retained draws per chain.
    #[arg(long, default_value_t = 1000)]
    pub draws: usize,

    /// Discarded tuning sweeps per chain.
    #[arg(long, default_value_t = 1000)]
    pub tune: usize,

    /// Number of independent chains.
    #[arg(long, default_value_t = 2)]
    pub chains: usize,

    /// Base random seed; chain `i` uses `seed + i`.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Abort sampling of a series after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<f64>,

    /// Refuse changepoint inference on series shorter than this.
    #[arg(long, default_value_t = 10)]
    pub min_observations: usize,

    /// Probability mass of the reported break-year interval.
    #[arg(long, default_value_t = 0.94)]
    pub hdi_prob: f64,

    /// Scale of the regime-mean and noise priors.
    #[arg(long, default_value_t = 1e7)]
    pub prior_scale: f64,

    /// Refuse posteriors whose R-hat exceeds this.
    #[arg(long, default_value_t = 1.1)]
    pub max_r_hat: f64,

    /// Skip the convergence check.
    #[arg(long)]
    pub no_r_hat_check: bool,

    /// Print the run as JSON instead of the text summary.
    #[arg(long)]
    pub json: bool,
}
