//! Posterior summaries: point estimates, `tau` HDI and mass table, R-hat.

use std::collections::BTreeMap;

use crate::domain::{ChangepointPosterior, ChangepointSummary, Draw, RHat};
use crate::math::{hdi, mean, split_r_hat};

pub fn summarize(posterior: &ChangepointPosterior, hdi_prob: f64) -> ChangepointSummary {
    let draws = &posterior.draws;

    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for d in draws {
        *counts.entry(d.tau).or_default() += 1;
    }
    // Ascending iteration; a later year only wins with a strictly higher count.
    let tau_mode = counts
        .iter()
        .fold(None::<(i32, usize)>, |best, (&year, &count)| match best {
            Some((_, c)) if c >= count => best,
            _ => Some((year, count)),
        })
        .map(|(year, _)| year)
        .unwrap_or(*posterior.years.start());

    let total = draws.len().max(1) as f64;
    let tau_mass = counts
        .iter()
        .map(|(&year, &count)| (year, count as f64 / total))
        .collect();

    let taus: Vec<f64> = draws.iter().map(|d| d.tau as f64).collect();
    let mut sorted = taus.clone();
    sorted.sort_by(f64::total_cmp);
    let tau_hdi = hdi(&sorted, hdi_prob)
        .map(|(lo, hi)| (lo as i32, hi as i32))
        .unwrap_or((tau_mode, tau_mode));

    ChangepointSummary {
        tau_mode,
        tau_mean: mean(&taus),
        tau_hdi,
        hdi_prob,
        alpha1_mean: mean(&column(draws, |d| d.alpha1)),
        alpha2_mean: mean(&column(draws, |d| d.alpha2)),
        sigma_mean: mean(&column(draws, |d| d.sigma)),
        tau_mass,
        r_hat: r_hat(posterior),
    }
}

fn column(draws: &[Draw], f: impl Fn(&Draw) -> f64) -> Vec<f64> {
    draws.iter().map(f).collect()
}

fn r_hat(posterior: &ChangepointPosterior) -> RHat {
    let per_chain = |f: fn(&Draw) -> f64| -> f64 {
        let chains: Vec<Vec<f64>> = (0..posterior.chains)
            .map(|c| column(posterior.chain(c), f))
            .collect();
        split_r_hat(&chains)
    };
    RHat {
        tau: per_chain(|d| d.tau as f64),
        alpha1: per_chain(|d| d.alpha1),
        alpha2: per_chain(|d| d.alpha2),
        sigma: per_chain(|d| d.sigma),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posterior(taus: &[i32], chains: usize) -> ChangepointPosterior {
        let per = taus.len() / chains;
        let draws = taus
            .iter()
            .enumerate()
            .map(|(i, &tau)| Draw {
                chain: i / per,
                tau,
                alpha1: -1.0 + (i % 3) as f64 * 0.1,
                alpha2: 2.0,
                sigma: 0.5 + (i % 2) as f64 * 0.1,
            })
            .collect();
        ChangepointPosterior {
            years: 2000..=2010,
            chains,
            draws_per_chain: per,
            draws,
            chain_stats: Vec::new(),
        }
    }

    #[test]
    fn mode_ties_resolve_to_earliest_year() {
        let p = posterior(&[2004, 2006, 2006, 2004, 2005, 2005, 2004, 2006], 2);
        let s = summarize(&p, 0.94);
        assert_eq!(s.tau_mode, 2004);
        assert!((s.tau_mass[&2004] - 3.0 / 8.0).abs() < 1e-12);
        assert!(!s.tau_mass.contains_key(&2003));
        assert!((s.tau_mass.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn point_estimates_and_interval() {
        let taus: Vec<i32> = (0..100).map(|i| if i % 10 == 0 { 2001 } else { 2005 }).collect();
        let s = summarize(&posterior(&taus, 2), 0.8);
        assert_eq!(s.tau_mode, 2005);
        assert_eq!(s.tau_hdi, (2005, 2005));
        assert!((s.tau_mean - 2004.6).abs() < 1e-9);
        assert!((s.alpha2_mean - 2.0).abs() < 1e-12);
        assert!((s.sigma_mean - 0.55).abs() < 1e-12);

        let s = summarize(&posterior(&taus, 2), 0.95);
        assert_eq!(s.tau_hdi, (2001, 2005));
    }

    #[test]
    fn r_hat_is_one_for_agreeing_chains() {
        let taus: Vec<i32> = (0..200).map(|i| 2003 + (i * 7 % 3)).collect();
        let s = summarize(&posterior(&taus, 2), 0.94);
        assert!(s.r_hat.tau < 1.05, "{:?}", s.r_hat);
        assert_eq!(s.r_hat.alpha2, 1.0);
    }
}
