//! One Metropolis-within-Gibbs chain.
//!
//! Each sweep:
//! 1. draws `tau` from its exact discrete conditional with both regime means
//!    integrated out (so `tau` can jump anywhere in one step)
//! 2. draws `alpha1`, `alpha2` from their conjugate normal conditionals
//! 3. updates `sigma` with a random walk on `ln sigma`
//!
//! Steps 1-2 together are an exact block draw of `(tau, alpha1, alpha2)`.
//! During tuning the `ln sigma` step size adapts toward the target acceptance
//! rate; it is frozen once retained draws begin.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::changepoint::cancel::{Budget, Interrupt};
use crate::changepoint::model::MeanShiftModel;
use crate::domain::{ChainStats, Draw, SamplerConfig};
use crate::math::log_sum_exp;

const INITIAL_STEP: f64 = 0.5;
const STEP_BOUNDS: (f64, f64) = (1e-4, 10.0);
/// Smallest `sigma` considered, relative to the prior scale.
const SIGMA_FLOOR_REL: f64 = 1e-12;

/// Retained draws and statistics of one chain.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub draws: Vec<Draw>,
    pub stats: ChainStats,
}

#[derive(Debug, Clone, Copy)]
struct State {
    split: usize,
    tau: i32,
    alpha1: f64,
    alpha2: f64,
    sigma: f64,
}

pub fn run_chain(
    model: &MeanShiftModel,
    chain: usize,
    seed: u64,
    config: &SamplerConfig,
    budget: &Budget,
) -> Result<ChainOutput, Interrupt> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sigma_floor = model.prior_scale() * SIGMA_FLOOR_REL;

    let mut state = initial_state(model, &mut rng, sigma_floor);
    let mut log_step = INITIAL_STEP.ln();
    let mut accepted = 0usize;
    let mut draws = Vec::with_capacity(config.draws);

    for iter in 0..(config.tune + config.draws) {
        budget.poll(iter)?;

        update_regimes(model, &mut state, &mut rng);
        let (accept_prob, moved) =
            update_sigma(model, &mut state, log_step.exp(), sigma_floor, &mut rng);

        if iter < config.tune {
            // Robbins-Monro on the log step.
            let gain = ((iter + 1) as f64).powf(-0.6);
            log_step = (log_step + gain * (accept_prob - config.target_accept))
                .clamp(STEP_BOUNDS.0.ln(), STEP_BOUNDS.1.ln());
            if iter + 1 == config.tune {
                log::debug!("chain {chain}: tuned ln-sigma step {:.4}", log_step.exp());
            }
            continue;
        }

        if moved {
            accepted += 1;
        }
        draws.push(Draw {
            chain,
            tau: state.tau,
            alpha1: state.alpha1,
            alpha2: state.alpha2,
            sigma: state.sigma,
        });
    }

    let sigma_accept_rate = if draws.is_empty() {
        0.0
    } else {
        accepted as f64 / draws.len() as f64
    };

    Ok(ChainOutput {
        draws,
        stats: ChainStats {
            chain,
            seed,
            sigma_accept_rate,
            sigma_step: log_step.exp(),
        },
    })
}

fn initial_state(model: &MeanShiftModel, rng: &mut StdRng, sigma_floor: f64) -> State {
    let candidates = model.candidates();
    let (tau, split) = candidates[rng.gen_range(0..candidates.len())];
    let (left, right) = model.regimes(split);
    let z: f64 = rng.sample(StandardNormal);
    let sigma = (model.data_scale() * (0.5 * z).exp()).max(sigma_floor * 1e3);
    State {
        split,
        tau,
        alpha1: left.mean(),
        alpha2: right.mean(),
        sigma,
    }
}

/// Block draw of `(tau, alpha1, alpha2)` given `sigma`.
fn update_regimes(model: &MeanShiftModel, state: &mut State, rng: &mut StdRng) {
    let weights = model.tau_log_weights(state.sigma);
    let idx = sample_log_weights(&weights, rng);
    let (tau, split) = model.candidates()[idx];

    let (left, right) = model.regimes(split);
    let (m1, s1) = model.alpha_conditional(&left, state.sigma);
    let (m2, s2) = model.alpha_conditional(&right, state.sigma);
    let z1: f64 = rng.sample(StandardNormal);
    let z2: f64 = rng.sample(StandardNormal);

    state.tau = tau;
    state.split = split;
    state.alpha1 = m1 + s1 * z1;
    state.alpha2 = m2 + s2 * z2;
}

/// Random-walk Metropolis on `ln sigma`. Returns the acceptance probability
/// and whether the proposal was taken.
fn update_sigma(
    model: &MeanShiftModel,
    state: &mut State,
    step: f64,
    sigma_floor: f64,
    rng: &mut StdRng,
) -> (f64, bool) {
    let log_target = |sigma: f64| {
        model.log_likelihood(state.split, state.alpha1, state.alpha2, sigma)
            + model.log_prior_sigma(sigma)
            + sigma.ln()
    };

    let z: f64 = rng.sample(StandardNormal);
    let proposal = state.sigma * (step * z).exp();
    if !(proposal.is_finite() && proposal > sigma_floor) {
        return (0.0, false);
    }

    let log_ratio = log_target(proposal) - log_target(state.sigma);
    let accept_prob = if log_ratio.is_nan() { 0.0 } else { log_ratio.exp().min(1.0) };
    let moved = rng.r#gen::<f64>() < accept_prob;
    if moved {
        state.sigma = proposal;
    }
    (accept_prob, moved)
}

/// Index drawn with probability proportional to `exp(weights[i])`.
pub fn sample_log_weights(weights: &[f64], rng: &mut StdRng) -> usize {
    let norm = log_sum_exp(weights);
    if !norm.is_finite() {
        return rng.gen_range(0..weights.len());
    }
    let mut u = rng.r#gen::<f64>();
    for (i, w) in weights.iter().enumerate() {
        let p = (w - norm).exp();
        if u < p {
            return i;
        }
        u -= p;
    }
    // Rounding left `u` past the last bucket.
    weights.iter().rposition(|w| w.is_finite()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changepoint::cancel::CancelToken;

    fn step_series() -> Vec<(i32, f64)> {
        (0..30)
            .map(|i| {
                let level = if i < 15 { -2e6 } else { 3e6 };
                let wiggle = if i % 2 == 0 { 5e4 } else { -5e4 };
                (1980 + i, level + wiggle)
            })
            .collect()
    }

    fn quick_config() -> SamplerConfig {
        SamplerConfig {
            draws: 300,
            tune: 300,
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn sample_log_weights_respects_dominant_weight() {
        let mut rng = StdRng::seed_from_u64(7);
        let w = [f64::NEG_INFINITY, 0.0, -1000.0];
        for _ in 0..100 {
            assert_eq!(sample_log_weights(&w, &mut rng), 1);
        }
    }

    #[test]
    fn chain_is_deterministic_for_seed() {
        let model = MeanShiftModel::new(&step_series(), 1e7);
        let config = quick_config();
        let budget = Budget::new(CancelToken::new(), None, 64);
        let a = run_chain(&model, 0, 11, &config, &budget).unwrap();
        let b = run_chain(&model, 0, 11, &config, &budget).unwrap();
        assert_eq!(a.draws, b.draws);
        assert_eq!(a.draws.len(), 300);
    }

    #[test]
    fn chain_finds_break_and_levels() {
        let model = MeanShiftModel::new(&step_series(), 1e7);
        let budget = Budget::new(CancelToken::new(), None, 64);
        let out = run_chain(&model, 0, 3, &quick_config(), &budget).unwrap();

        let at_break = out.draws.iter().filter(|d| d.tau == 1994).count();
        assert!(at_break as f64 / out.draws.len() as f64 > 0.9);

        let a1 = out.draws.iter().map(|d| d.alpha1).sum::<f64>() / out.draws.len() as f64;
        let a2 = out.draws.iter().map(|d| d.alpha2).sum::<f64>() / out.draws.len() as f64;
        assert!((a1 + 2e6).abs() < 1e5, "alpha1={a1}");
        assert!((a2 - 3e6).abs() < 1e5, "alpha2={a2}");
        assert!(out.stats.sigma_accept_rate > 0.05 && out.stats.sigma_accept_rate < 0.95);
    }

    #[test]
    fn cancelled_token_interrupts_chain() {
        let model = MeanShiftModel::new(&step_series(), 1e7);
        let token = CancelToken::new();
        token.cancel();
        let budget = Budget::new(token, None, 1);
        let err = run_chain(&model, 0, 1, &quick_config(), &budget).unwrap_err();
        assert_eq!(err, Interrupt::Cancelled);
    }
}
