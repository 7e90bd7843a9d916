//! Shared reconciliation pipeline.
//!
//! Explicit composition, one stage feeding the next:
//! load sources -> align (with fallbacks) -> estimators -> discrepancies -> changepoints
//!
//! Failures are isolated: an estimator that cannot run, or a discrepancy whose
//! inference is refused, is recorded in [`Reconciliation::failures`] and the
//! remaining stages still produce their results.

use std::ops::RangeInclusive;

use crate::changepoint;
use crate::data::{SourceKind, SourceSeries};
use crate::discrepancy;
use crate::domain::{
    AnnualSeries, ChangepointFit, DiscrepancySeries, EstimatorId, EstimatorOutput, ReconConfig, SamplerConfig,
};
use crate::error::{AppError, ReconError};
use crate::estimate::{cohort, housing};
use crate::io::ingest::{SourceLoad, load_sources};

/// Pipeline stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Estimate,
    Changepoint,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Estimate => "estimate",
            Stage::Changepoint => "changepoint",
        }
    }
}

/// A stage that failed without stopping the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub stage: Stage,
    /// Estimator id or discrepancy label.
    pub subject: String,
    /// Years of the input the stage was working on.
    pub span: Option<RangeInclusive<i32>>,
    pub error: ReconError,
}

/// Everything computed from one set of aligned sources.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub official: AnnualSeries,
    /// Derived estimates that succeeded, cohort first.
    pub estimates: Vec<EstimatorOutput>,
    pub discrepancies: Vec<DiscrepancySeries>,
    /// One fit per discrepancy whose inference succeeded.
    pub changepoints: Vec<ChangepointFit>,
    pub failures: Vec<Failure>,
    /// Sources replaced by synthetic fallbacks during alignment.
    pub fallbacks: Vec<SourceKind>,
}

impl Reconciliation {
    pub fn estimate(&self, id: EstimatorId) -> Option<&EstimatorOutput> {
        self.estimates.iter().find(|e| e.id == id)
    }

    pub fn changepoint(&self, id: EstimatorId) -> Option<&ChangepointFit> {
        let label = DiscrepancySeries {
            estimator: id,
            series: AnnualSeries::new(),
        }
        .label();
        self.changepoints.iter().find(|c| c.series == label)
    }
}

/// Outputs of a full `recon run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub load: SourceLoad,
    pub sources: SourceSeries,
    pub reconciliation: Reconciliation,
}

/// Load the source directory and reconcile it.
pub fn run(config: &ReconConfig) -> Result<RunOutput, AppError> {
    // 1) Read whatever source files exist.
    let load = load_sources(&config.data_dir)?;

    // 2) Align, substituting fallbacks for missing sources.
    let sources = SourceSeries::resolve(&load.raw)?;

    // 3) Estimators, discrepancies, and changepoints.
    let reconciliation = reconcile(&sources, config.anchor_year, &config.sampler);

    Ok(RunOutput {
        load,
        sources,
        reconciliation,
    })
}

/// Run every estimator, compute discrepancies, and fit a changepoint to each.
pub fn reconcile(sources: &SourceSeries, anchor_year: Option<i32>, sampler: &SamplerConfig) -> Reconciliation {
    let mut failures = Vec::new();
    let mut estimates = Vec::new();

    log::info!("running estimators");
    let flows = cohort::Flows {
        births: &sources.births,
        deaths: &sources.deaths,
        net_migration: &sources.net_migration,
    };
    let cohort = cohort::anchor(&sources.official, anchor_year).and_then(|(year, _)| {
        let horizon = cohort::projection_horizon(year, &flows);
        cohort::project(&sources.official, &flows, &horizon, Some(year))
    });
    match cohort {
        Ok(out) => estimates.push(out),
        Err(error) => failures.push(record(
            Stage::Estimate,
            EstimatorId::CohortModel.as_str(),
            sources.official.span(),
            error,
        )),
    }

    estimates.push(housing::estimate(
        &sources.housing_units,
        &sources.occupancy_rate,
        &sources.persons_per_household,
    ));

    let discrepancies = discrepancy::compute_all(&sources.official, &estimates);

    // Sequential across series; each inference is parallel across chains.
    let mut changepoints = Vec::new();
    for d in &discrepancies {
        match changepoint::infer_discrepancy(d, sampler) {
            Ok(fit) => changepoints.push(fit),
            Err(error) => failures.push(record(Stage::Changepoint, &d.label(), d.series.span(), error)),
        }
    }

    log::info!(
        "reconciled {} estimate(s), {} changepoint fit(s), {} failure(s)",
        estimates.len(),
        changepoints.len(),
        failures.len()
    );

    Reconciliation {
        official: sources.official.clone(),
        estimates,
        discrepancies,
        changepoints,
        failures,
        fallbacks: sources.fallbacks.clone(),
    }
}

fn record(stage: Stage, subject: &str, span: Option<RangeInclusive<i32>>, error: ReconError) -> Failure {
    log::warn!("{} failed for {subject}: {error}", stage.as_str());
    Failure {
        stage,
        subject: subject.to_string(),
        span,
        error,
    }
}
