//! Changepoint inference on a discrepancy series.
//!
//! Responsibilities:
//!
//! - refuse series too short (or too dirty) to say anything about a break
//! - run independent chains in parallel (one seeded RNG each)
//! - enforce the optional deadline through a shared cancel token
//! - merge draws and summarise them, refusing unconverged posteriors

pub mod cancel;
pub mod model;
pub mod sampler;
pub mod summary;

use std::time::Instant;

use rayon::prelude::*;

pub use cancel::{Budget, CancelToken, Interrupt};
pub use model::MeanShiftModel;
pub use summary::summarize;

use crate::domain::{AnnualSeries, ChangepointFit, ChangepointPosterior, DiscrepancySeries, RHat, SamplerConfig};
use crate::error::ReconError;

/// Fewest retained draws per chain that still split into two halves of two.
pub const MIN_DRAWS_PER_CHAIN: usize = 4;

/// Fit the two-regime mean-shift model to `data`.
///
/// `label` names the series in logs and errors.
pub fn infer(label: &str, data: &AnnualSeries, config: &SamplerConfig) -> Result<ChangepointFit, ReconError> {
    infer_with_cancel(label, data, config, CancelToken::new())
}

/// Same as [`infer`], fitted to a discrepancy series under its own label.
pub fn infer_discrepancy(
    discrepancy: &DiscrepancySeries,
    config: &SamplerConfig,
) -> Result<ChangepointFit, ReconError> {
    infer(&discrepancy.label(), &discrepancy.series, config)
}

/// [`infer`] with a caller-held token; cancelling it stops every chain.
pub fn infer_with_cancel(
    label: &str,
    data: &AnnualSeries,
    config: &SamplerConfig,
    token: CancelToken,
) -> Result<ChangepointFit, ReconError> {
    let points: Vec<(i32, f64)> = data.iter().collect();
    let required = config.min_observations.max(2);
    let insufficient = |reason: String| ReconError::InsufficientData {
        series: label.to_string(),
        observed: points.len(),
        required,
        span: data.span(),
        reason,
    };

    if points.len() < required {
        return Err(insufficient("too few observations".to_string()));
    }
    if let Some((year, value)) = points.iter().find(|(_, v)| !v.is_finite()) {
        return Err(insufficient(format!("non-finite value {value} in {year}")));
    }
    if config.draws < MIN_DRAWS_PER_CHAIN {
        return Err(insufficient(format!(
            "{} retained draws per chain, need at least {MIN_DRAWS_PER_CHAIN}",
            config.draws
        )));
    }
    let Some(years) = data.span() else {
        return Err(insufficient("empty series".to_string()));
    };

    let model = MeanShiftModel::new(&points, config.prior_scale);
    let chains = config.chains.max(1);
    let budget = Budget::new(token, config.timeout, config.cancel_check_every);
    let started = Instant::now();

    log::info!(
        "{label}: sampling {chains} chain(s) x ({} tune + {} draws) over {}-{}",
        config.tune,
        config.draws,
        years.start(),
        years.end()
    );

    let results: Vec<_> = (0..chains)
        .into_par_iter()
        .map(|chain| {
            let seed = config.seed.wrapping_add(chain as u64);
            sampler::run_chain(&model, chain, seed, config, &budget)
        })
        .collect();

    let completed_chains = results.iter().filter(|r| r.is_ok()).count();
    if completed_chains < chains {
        return Err(ReconError::SamplingTimeout {
            series: label.to_string(),
            elapsed: started.elapsed(),
            completed_chains,
            chains,
        });
    }

    let (draws, chain_stats): (Vec<_>, Vec<_>) = results
        .into_iter()
        .flatten()
        .map(|out| (out.draws, out.stats))
        .unzip();

    let posterior = ChangepointPosterior {
        years,
        chains,
        draws_per_chain: config.draws,
        draws: draws.into_iter().flatten().collect(),
        chain_stats,
    };
    let summary = summarize(&posterior, config.hdi_prob);

    if let Some(limit) = config.max_r_hat {
        check_convergence(&summary.r_hat, limit).map_err(|worst| {
            insufficient(format!("chains did not converge (max R-hat {worst:.3} > {limit})"))
        })?;
    }

    log::info!(
        "{label}: tau mode {} ({:.0}% HDI {}-{}), regimes {:.4e} -> {:.4e}, {:.2}s",
        summary.tau_mode,
        summary.hdi_prob * 100.0,
        summary.tau_hdi.0,
        summary.tau_hdi.1,
        summary.alpha1_mean,
        summary.alpha2_mean,
        started.elapsed().as_secs_f64()
    );

    Ok(ChangepointFit {
        series: label.to_string(),
        posterior,
        summary,
    })
}

/// `Err(worst)` when any R-hat exceeds `limit` or is undefined.
fn check_convergence(r_hat: &RHat, limit: f64) -> Result<(), f64> {
    let worst = r_hat.max();
    if worst <= limit { Ok(()) } else { Err(worst) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Level shift after `break_year`, with deterministic noise.
    fn shifted(start: i32, len: i32, break_year: i32, before: f64, after: f64, noise: f64) -> AnnualSeries {
        (0..len)
            .map(|i| {
                let year = start + i;
                let level = if year <= break_year { before } else { after };
                let wiggle = noise * (((i * 7919) % 13) as f64 / 6.0 - 1.0);
                (year, level + wiggle)
            })
            .collect()
    }

    fn fast() -> SamplerConfig {
        SamplerConfig {
            draws: 400,
            tune: 400,
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn recovers_known_break() {
        let data = shifted(1950, 60, 1985, 1.0e7, -1.5e7, 2.0e6);
        let fit = infer("official-cohort_model", &data, &fast()).unwrap();
        assert!(fit.posterior.mass_within(1985, 2) > 0.7);
        assert!((fit.summary.tau_mode - 1985).abs() <= 2);
        assert_eq!(fit.posterior.draws.len(), 800);
        assert_eq!(fit.posterior.chain(1).len(), 400);
        assert!(fit.posterior.chain(1).iter().all(|d| d.chain == 1));
        assert!((fit.summary.alpha1_mean - 1.0e7).abs() < 2.0e6);
        assert!((fit.summary.alpha2_mean + 1.5e7).abs() < 2.0e6);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let data = shifted(1960, 30, 1975, 0.0, 5.0, 1.0);
        let config = SamplerConfig {
            prior_scale: 100.0,
            ..fast()
        };
        let a = infer("x", &data, &config).unwrap();
        let b = infer("x", &data, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_agree_on_break() {
        let data = shifted(1960, 30, 1975, 0.0, 5.0, 1.0);
        let base = SamplerConfig {
            prior_scale: 100.0,
            ..fast()
        };
        let a = infer("x", &data, &base).unwrap();
        let b = infer("x", &data, &SamplerConfig { seed: 9001, ..base }).unwrap();
        assert_eq!(a.summary.tau_mode, b.summary.tau_mode);
        assert!((a.summary.alpha2_mean - b.summary.alpha2_mean).abs() < 0.5);
    }

    #[test]
    fn single_year_is_refused() {
        let data: AnnualSeries = [(2000, 5.0)].into_iter().collect();
        let config = SamplerConfig {
            min_observations: 1,
            ..fast()
        };
        match infer("one", &data, &config) {
            Err(ReconError::InsufficientData {
                observed, required, span, ..
            }) => {
                assert_eq!(observed, 1);
                assert_eq!(required, 2);
                assert_eq!(span, Some(2000..=2000));
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn short_series_is_refused_by_default() {
        let data = shifted(2000, 9, 2004, 0.0, 1.0, 0.1);
        let err = infer("short", &data, &fast()).unwrap_err();
        assert!(matches!(err, ReconError::InsufficientData { required: 10, .. }));
    }

    #[test]
    fn too_few_draws_are_refused() {
        let data = shifted(1960, 30, 1975, 0.0, 5.0, 1.0);
        for draws in [0, 3] {
            let config = SamplerConfig {
                draws,
                prior_scale: 100.0,
                ..fast()
            };
            match infer("thin", &data, &config) {
                Err(ReconError::InsufficientData { reason, .. }) => {
                    assert!(reason.contains("retained draws"), "{reason}");
                }
                other => panic!("draws={draws}: expected InsufficientData, got {other:?}"),
            }
        }

        let config = SamplerConfig {
            draws: MIN_DRAWS_PER_CHAIN,
            max_r_hat: None,
            prior_scale: 100.0,
            ..fast()
        };
        let fit = infer("thin", &data, &config).unwrap();
        assert_eq!(fit.posterior.draws.len(), 2 * MIN_DRAWS_PER_CHAIN);
    }

    #[test]
    fn undefined_r_hat_fails_the_gate() {
        let mixed = RHat { tau: 1.0, alpha1: 1.02, alpha2: 1.01, sigma: 1.0 };
        let undefined = RHat { alpha1: f64::NAN, ..mixed };
        let stuck = RHat { tau: f64::INFINITY, ..mixed };

        assert_eq!(check_convergence(&mixed, 1.1), Ok(()));
        assert!(check_convergence(&undefined, 1.1).unwrap_err().is_nan());
        assert_eq!(check_convergence(&stuck, 1.1), Err(f64::INFINITY));
        assert_eq!(check_convergence(&mixed, 1.01), Err(1.02));
    }

    #[test]
    fn zero_timeout_reports_timeout() {
        let data = shifted(1960, 30, 1975, 0.0, 5.0, 1.0);
        let config = SamplerConfig {
            timeout: Some(Duration::ZERO),
            ..fast()
        };
        match infer("slow", &data, &config) {
            Err(ReconError::SamplingTimeout {
                completed_chains, chains, ..
            }) => {
                assert_eq!(completed_chains, 0);
                assert_eq!(chains, 2);
            }
            other => panic!("expected SamplingTimeout, got {other:?}"),
        }
    }

    #[test]
    fn cancelled_token_stops_sampling() {
        let data = shifted(1960, 30, 1975, 0.0, 5.0, 1.0);
        let token = CancelToken::new();
        token.cancel();
        let err = infer_with_cancel("x", &data, &fast(), token).unwrap_err();
        assert!(matches!(err, ReconError::SamplingTimeout { .. }));
    }

    #[test]
    fn discrepancy_label_flows_into_fit() {
        let d = DiscrepancySeries {
            estimator: crate::domain::EstimatorId::HousingModel,
            series: shifted(1960, 30, 1975, 0.0, 5.0, 1.0),
        };
        let config = SamplerConfig {
            prior_scale: 100.0,
            ..fast()
        };
        let fit = infer_discrepancy(&d, &config).unwrap();
        assert_eq!(fit.series, "official-housing_model");
    }
}
