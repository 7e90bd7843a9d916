//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments (with `.env` defaults)
//! - loads and aligns the source series
//! - runs the estimators and changepoint inference
//! - prints the text or JSON report

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::changepoint::MIN_DRAWS_PER_CHAIN;
use crate::cli::{Command, RunArgs};
use crate::domain::{ReconConfig, SamplerConfig};
use crate::error::AppError;

pub mod pipeline;

/// Environment variable holding the default data directory.
pub const DATA_DIR_ENV: &str = "RECON_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "data";

/// Entry point for the `recon` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let default_dir = std::env::var(DATA_DIR_ENV).ok().map(PathBuf::from);
    let config = recon_config_from_args(&args, default_dir)?;
    let run = pipeline::run(&config)?;

    if config.json {
        println!("{}", crate::report::to_json(&run)?);
    } else {
        println!("{}", crate::report::format_run_summary(&run, &config));
    }

    // Partial results are a success; nothing usable at all is not.
    let r = &run.reconciliation;
    if r.changepoints.is_empty() {
        if let Some(first) = r.failures.first() {
            return Err(AppError::new(
                first.error.exit_code(),
                format!("No changepoint could be fitted: {}", first.error),
            ));
        }
    }

    Ok(())
}

/// Validate CLI arguments into a run configuration.
pub fn recon_config_from_args(args: &RunArgs, default_dir: Option<PathBuf>) -> Result<ReconConfig, AppError> {
    if args.draws < MIN_DRAWS_PER_CHAIN {
        return Err(AppError::new(
            2,
            format!("--draws must be at least {MIN_DRAWS_PER_CHAIN}."),
        ));
    }
    if args.chains == 0 {
        return Err(AppError::new(2, "--chains must be at least 1."));
    }
    if !(args.hdi_prob > 0.0 && args.hdi_prob < 1.0) {
        return Err(AppError::new(2, "--hdi-prob must be in (0, 1)."));
    }
    if !(args.prior_scale.is_finite() && args.prior_scale > 0.0) {
        return Err(AppError::new(2, "--prior-scale must be a positive number."));
    }
    if !(args.max_r_hat.is_finite() && args.max_r_hat >= 1.0) {
        return Err(AppError::new(2, "--max-r-hat must be at least 1."));
    }
    let timeout = match args.timeout_secs {
        Some(secs) if !(secs.is_finite() && secs >= 0.0) => {
            return Err(AppError::new(2, "--timeout-secs must be a non-negative number."));
        }
        Some(secs) => Some(Duration::from_secs_f64(secs)),
        None => None,
    };

    let data_dir = args
        .data_dir
        .clone()
        .or(default_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    Ok(ReconConfig {
        data_dir,
        anchor_year: args.anchor_year,
        sampler: SamplerConfig {
            draws: args.draws,
            tune: args.tune,
            chains: args.chains,
            seed: args.seed,
            prior_scale: args.prior_scale,
            min_observations: args.min_observations,
            hdi_prob: args.hdi_prob,
            max_r_hat: (!args.no_r_hat_check).then_some(args.max_r_hat),
            timeout,
            ..SamplerConfig::default()
        },
        json: args.json,
    })
}
