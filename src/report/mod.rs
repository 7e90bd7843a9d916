//! Reporting: terminal summaries and the JSON view of a run.
//!
//! We keep output shaping in one place so:
//! - the estimators and sampler stay free of presentation concerns
//! - output changes are localized

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::app::pipeline::{Failure, RunOutput};
use crate::domain::{AnnualSeries, ChainStats, ChangepointFit, ChangepointSummary, DiscrepancySeries, EstimatorOutput};
use crate::error::AppError;

/// Serializable view of a run. Posterior draws are left out; the summary and
/// per-chain statistics describe them.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub official: &'a AnnualSeries,
    pub estimates: &'a [EstimatorOutput],
    pub discrepancies: &'a [DiscrepancySeries],
    pub changepoints: Vec<ChangepointReport<'a>>,
    pub failures: Vec<FailureReport>,
    pub fallbacks: Vec<&'static str>,
    pub missing_files: Vec<String>,
    pub row_errors: usize,
}

#[derive(Debug, Serialize)]
pub struct ChangepointReport<'a> {
    pub series: &'a str,
    pub draws_per_chain: usize,
    pub summary: &'a ChangepointSummary,
    pub chains: &'a [ChainStats],
}

#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub stage: &'static str,
    pub subject: String,
    pub span: Option<(i32, i32)>,
    pub exit_code: u8,
    pub message: String,
}

impl<'a> RunReport<'a> {
    pub fn new(run: &'a RunOutput) -> Self {
        let r = &run.reconciliation;
        Self {
            official: &r.official,
            estimates: &r.estimates,
            discrepancies: &r.discrepancies,
            changepoints: r.changepoints.iter().map(ChangepointReport::new).collect(),
            failures: r.failures.iter().map(FailureReport::new).collect(),
            fallbacks: r.fallbacks.iter().map(|k| k.name()).collect(),
            missing_files: run
                .load
                .missing_files
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            row_errors: run.load.row_errors.len(),
        }
    }
}

impl<'a> ChangepointReport<'a> {
    fn new(fit: &'a ChangepointFit) -> Self {
        Self {
            series: &fit.series,
            draws_per_chain: fit.posterior.draws_per_chain,
            summary: &fit.summary,
            chains: &fit.posterior.chain_stats,
        }
    }
}

impl FailureReport {
    fn new(f: &Failure) -> Self {
        Self {
            stage: f.stage.as_str(),
            subject: f.subject.clone(),
            span: f.span.as_ref().map(|r| (*r.start(), *r.end())),
            exit_code: f.error.exit_code(),
            message: f.error.to_string(),
        }
    }
}

/// Pretty-printed JSON for a run.
pub fn to_json(run: &RunOutput) -> Result<String, AppError> {
    serde_json::to_string_pretty(&RunReport::new(run))
        .map_err(|e| AppError::new(4, format!("Failed to serialize report: {e}")))
}
