//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between pipeline stages as immutable values
//! - printed as JSON by the binary
//! - compared exactly in tests (series are plain `BTreeMap`s underneath)

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection reasons for checked series construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("year {0} appears more than once")]
    DuplicateYear(i32),
    #[error("non-finite value {value} for year {year}")]
    NonFinite { year: i32, value: f64 },
}

/// Year-keyed numeric series.
///
/// Years are unique and iterate in ascending order. A series is never mutated
/// after construction; every transform returns a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnualSeries {
    values: BTreeMap<i32, f64>,
}

impl AnnualSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checked construction: duplicate years and non-finite values are rejected.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = (i32, f64)>,
    {
        let mut values = BTreeMap::new();
        for (year, value) in pairs {
            if !value.is_finite() {
                return Err(SeriesError::NonFinite { year, value });
            }
            if values.insert(year, value).is_some() {
                return Err(SeriesError::DuplicateYear(year));
            }
        }
        Ok(Self { values })
    }

    /// Same value for every year in `years`.
    pub fn constant(years: RangeInclusive<i32>, value: f64) -> Self {
        years.map(|y| (y, value)).collect()
    }

    pub fn get(&self, year: i32) -> Option<f64> {
        self.values.get(&year).copied()
    }

    pub fn contains(&self, year: i32) -> bool {
        self.values.contains_key(&year)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.values.keys().next().copied()
    }

    pub fn last_year(&self) -> Option<i32> {
        self.values.keys().next_back().copied()
    }

    /// Inclusive `[first_year, last_year]`, or `None` for an empty series.
    pub fn span(&self) -> Option<RangeInclusive<i32>> {
        Some(self.first_year()?..=self.last_year()?)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.values.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.values().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.values.iter().map(|(&y, &v)| (y, v))
    }

    /// Combine two series over the years present in both (inner join).
    pub fn zip_with(&self, other: &AnnualSeries, f: impl Fn(f64, f64) -> f64) -> AnnualSeries {
        self.iter()
            .filter_map(|(y, a)| other.get(y).map(|b| (y, f(a, b))))
            .collect()
    }
}

/// Later pairs overwrite earlier ones for the same year, and non-finite values
/// are skipped, so every series holds finite values only.
///
/// Use [`AnnualSeries::from_pairs`] when either must be rejected instead.
impl FromIterator<(i32, f64)> for AnnualSeries {
    fn from_iter<T: IntoIterator<Item = (i32, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().filter(|(_, v)| v.is_finite()).collect(),
        }
    }
}

/// Identity of a population estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorId {
    Official,
    CohortModel,
    HousingModel,
}

impl EstimatorId {
    pub fn as_str(self) -> &'static str {
        match self {
            EstimatorId::Official => "official",
            EstimatorId::CohortModel => "cohort_model",
            EstimatorId::HousingModel => "housing_model",
        }
    }
}

impl fmt::Display for EstimatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Degraded-confidence marker attached to an estimator output.
///
/// Values are never altered because of it; it only reports which years were
/// computed from incomplete inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quality {
    /// Years present in some operand but dropped from the output.
    pub dropped_years: Vec<i32>,
    /// Years whose value relied on a defaulted (zero) input component.
    pub imputed_years: Vec<i32>,
}

impl Quality {
    pub fn is_complete(&self) -> bool {
        self.dropped_years.is_empty() && self.imputed_years.is_empty()
    }
}

/// An annual series tagged with the estimator that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorOutput {
    pub id: EstimatorId,
    pub series: AnnualSeries,
    pub quality: Quality,
}

/// `official - estimate` over the years both define.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancySeries {
    pub estimator: EstimatorId,
    pub series: AnnualSeries,
}

impl DiscrepancySeries {
    /// Label used in logs and error context, e.g. `official-cohort_model`.
    pub fn label(&self) -> String {
        format!("official-{}", self.estimator)
    }
}

/// One retained posterior draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Draw {
    pub chain: usize,
    pub tau: i32,
    pub alpha1: f64,
    pub alpha2: f64,
    pub sigma: f64,
}

/// Per-chain sampler statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStats {
    pub chain: usize,
    pub seed: u64,
    /// Acceptance rate of the `sigma` proposal over retained draws.
    pub sigma_accept_rate: f64,
    /// Random-walk step on `ln sigma` after tuning.
    pub sigma_step: f64,
}

/// Full set of retained draws from one inference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangepointPosterior {
    pub years: RangeInclusive<i32>,
    pub chains: usize,
    pub draws_per_chain: usize,
    /// Draws ordered by chain, then by iteration.
    pub draws: Vec<Draw>,
    pub chain_stats: Vec<ChainStats>,
}

impl ChangepointPosterior {
    /// Draws of one chain, in iteration order.
    pub fn chain(&self, chain: usize) -> &[Draw] {
        let start = chain * self.draws_per_chain;
        let end = (start + self.draws_per_chain).min(self.draws.len());
        if start >= end {
            return &[];
        }
        &self.draws[start..end]
    }

    /// Fraction of draws with `|tau - center| <= radius`.
    pub fn mass_within(&self, center: i32, radius: i32) -> f64 {
        if self.draws.is_empty() {
            return 0.0;
        }
        let hits = self
            .draws
            .iter()
            .filter(|d| (d.tau - center).abs() <= radius)
            .count();
        hits as f64 / self.draws.len() as f64
    }
}

/// Gelman-Rubin diagnostics per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RHat {
    pub tau: f64,
    pub alpha1: f64,
    pub alpha2: f64,
    pub sigma: f64,
}

impl RHat {
    /// Largest diagnostic; NaN if any parameter's is undefined.
    pub fn max(&self) -> f64 {
        [self.tau, self.alpha1, self.alpha2, self.sigma]
            .into_iter()
            .fold(f64::NEG_INFINITY, |acc, r| if acc.is_nan() || r.is_nan() { f64::NAN } else { acc.max(r) })
    }
}

/// Summary statistics derived from a posterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangepointSummary {
    /// Most frequent break year; ties resolve to the earliest year.
    pub tau_mode: i32,
    pub tau_mean: f64,
    /// Highest-density interval for `tau` at `hdi_prob`.
    pub tau_hdi: (i32, i32),
    pub hdi_prob: f64,
    pub alpha1_mean: f64,
    pub alpha2_mean: f64,
    pub sigma_mean: f64,
    /// Posterior probability per candidate break year (years with no draws omitted).
    pub tau_mass: BTreeMap<i32, f64>,
    pub r_hat: RHat,
}

/// Posterior plus its summary, as returned by the changepoint engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangepointFit {
    pub series: String,
    pub posterior: ChangepointPosterior,
    pub summary: ChangepointSummary,
}

/// Sampler settings for changepoint inference.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Retained draws per chain.
    pub draws: usize,
    /// Discarded tuning sweeps per chain.
    pub tune: usize,
    pub chains: usize,
    /// Base seed; chain `i` uses `seed + i`.
    pub seed: u64,
    /// Scale of the `alpha` normal priors and the `sigma` half-normal prior.
    pub prior_scale: f64,
    /// Fewer observations than this is refused with `InsufficientData`.
    pub min_observations: usize,
    pub hdi_prob: f64,
    /// Refuse the posterior when any R-hat exceeds this (None disables the check).
    pub max_r_hat: Option<f64>,
    pub timeout: Option<Duration>,
    /// Sweeps between cancellation polls.
    pub cancel_check_every: usize,
    /// Target acceptance rate for the `sigma` random walk during tuning.
    pub target_accept: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            draws: 1000,
            tune: 1000,
            chains: 2,
            seed: 42,
            prior_scale: 1e7,
            min_observations: 10,
            hdi_prob: 0.94,
            max_r_hat: Some(1.1),
            timeout: None,
            cancel_check_every: 64,
            target_accept: 0.44,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment defaults).
#[derive(Debug, Clone)]
pub struct ReconConfig {
    pub data_dir: PathBuf,
    /// Designated cohort anchor year (defaults to the earliest official year).
    pub anchor_year: Option<i32>,
    pub sampler: SamplerConfig,
    pub json: bool,
}
