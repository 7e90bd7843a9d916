//! Small statistics helpers for posterior summaries.

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator); `NaN` with fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n as f64 - 1.0)
}

/// `ln(sum(exp(x)))` without overflow.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Narrowest interval containing `prob` of the sorted sample.
///
/// Ties in width resolve to the lowest interval. Returns `None` for an empty
/// sample.
pub fn hdi(sorted: &[f64], prob: f64) -> Option<(f64, f64)> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let prob = prob.clamp(0.0, 1.0);
    let inc = ((prob * n as f64).floor() as usize).min(n - 1);

    let mut best = (sorted[0], sorted[inc]);
    for i in 1..(n - inc) {
        let (lo, hi) = (sorted[i], sorted[i + inc]);
        if hi - lo < best.1 - best.0 {
            best = (lo, hi);
        }
    }
    Some(best)
}

/// Split-chain Gelman-Rubin potential scale reduction factor.
///
/// Each chain is halved, so a single chain still yields a diagnostic. Chains
/// frozen at one shared value give 1.0; chains frozen at different values
/// give infinity. Fewer than two draws per half gives `NaN`.
pub fn split_r_hat(chains: &[Vec<f64>]) -> f64 {
    let halves: Vec<&[f64]> = chains
        .iter()
        .flat_map(|c| {
            let half = c.len() / 2;
            // Drop the middle draw of odd-length chains.
            [&c[..half], &c[c.len() - half..]]
        })
        .collect();

    let n = halves.iter().map(|h| h.len()).min().unwrap_or(0);
    if n < 2 || halves.len() < 2 {
        return f64::NAN;
    }

    let means: Vec<f64> = halves.iter().map(|h| mean(&h[..n])).collect();
    let w = mean(
        &halves
            .iter()
            .map(|h| sample_variance(&h[..n]))
            .collect::<Vec<_>>(),
    );
    let b_over_n = sample_variance(&means);
    let var_hat = (n as f64 - 1.0) / n as f64 * w + b_over_n;

    if w <= 0.0 {
        return if var_hat <= 0.0 { 1.0 } else { f64::INFINITY };
    }
    (var_hat / w).sqrt()
}
