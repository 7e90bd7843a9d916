//! Two-regime mean-shift model.
//!
//! ```text
//! tau    ~ DiscreteUniform[min(years), max(years)]
//! alpha1 ~ Normal(0, s0)        alpha2 ~ Normal(0, s0)
//! sigma  ~ HalfNormal(s0)
//! y[i]   ~ Normal(alpha1 if year[i] <= tau else alpha2, sigma)
//! ```
//!
//! Everything the sampler needs reduces to the sufficient statistics of the
//! two regimes. Those only depend on the split index, so the model precomputes
//! them for every prefix and suffix once (Welford updates, numerically stable
//! even when noise is many orders of magnitude below the level) and answers
//! queries in O(1).
//!
//! Numerical notes:
//! - The regime means are integrated out for the `tau` update:
//!
//!   ```text
//!   ln p(y_seg | sigma) = -n/2 ln(2 pi sigma^2) - 1/2 ln(1 + n s0^2 / sigma^2)
//!                         - SSE_c / (2 sigma^2) - S1^2 / (2 n (sigma^2 + n s0^2))
//!   ```

use std::f64::consts::PI;

/// Sufficient statistics of one contiguous run of observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub n: usize,
    /// Sum of raw values.
    pub sum: f64,
    /// Running mean (0 for an empty segment).
    pub mean: f64,
    /// Sum of squared deviations from the segment mean.
    pub sse: f64,
}

impl Segment {
    const EMPTY: Segment = Segment { n: 0, sum: 0.0, mean: 0.0, sse: 0.0 };

    /// Welford update with one more observation.
    fn push(self, y: f64) -> Segment {
        let n = self.n + 1;
        let delta = y - self.mean;
        let mean = self.mean + delta / n as f64;
        Segment {
            n,
            sum: self.sum + y,
            mean,
            sse: self.sse + delta * (y - mean),
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// `sum((y - a)^2)` over the segment.
    pub fn sse_about(&self, a: f64) -> f64 {
        let d = self.mean() - a;
        self.sse + self.n as f64 * d * d
    }
}

/// Observed discrepancy data prepared for sampling.
#[derive(Debug, Clone)]
pub struct MeanShiftModel {
    years: Vec<i32>,
    /// Candidate break years `min..=max`, each mapped to its split index
    /// (number of observations with `year <= tau`).
    candidates: Vec<(i32, usize)>,
    /// `prefix[k]`: statistics of observations `[0, k)`.
    prefix: Vec<Segment>,
    /// `suffix[k]`: statistics of observations `[k, n)`.
    suffix: Vec<Segment>,
    prior_scale: f64,
}

impl MeanShiftModel {
    /// `points` must be sorted by strictly increasing year.
    pub fn new(points: &[(i32, f64)], prior_scale: f64) -> Self {
        let years: Vec<i32> = points.iter().map(|p| p.0).collect();

        let prefix: Vec<Segment> = std::iter::once(Segment::EMPTY)
            .chain(points.iter().scan(Segment::EMPTY, |acc, &(_, y)| {
                *acc = acc.push(y);
                Some(*acc)
            }))
            .collect();
        let mut suffix: Vec<Segment> = std::iter::once(Segment::EMPTY)
            .chain(points.iter().rev().scan(Segment::EMPTY, |acc, &(_, y)| {
                *acc = acc.push(y);
                Some(*acc)
            }))
            .collect();
        suffix.reverse();

        let candidates = match (years.first(), years.last()) {
            (Some(&lo), Some(&hi)) => (lo..=hi)
                .map(|tau| (tau, years.partition_point(|&y| y <= tau)))
                .collect(),
            _ => Vec::new(),
        };

        Self {
            years,
            candidates,
            prefix,
            suffix,
            prior_scale,
        }
    }

    pub fn n(&self) -> usize {
        self.years.len()
    }

    pub fn prior_scale(&self) -> f64 {
        self.prior_scale
    }

    pub fn candidates(&self) -> &[(i32, usize)] {
        &self.candidates
    }

    /// Split index for a break year.
    pub fn split_of(&self, tau: i32) -> usize {
        self.years.partition_point(|&y| y <= tau)
    }

    /// Both regimes for a split index: `([0, split), [split, n))`.
    pub fn regimes(&self, split: usize) -> (Segment, Segment) {
        (self.prefix[split], self.suffix[split])
    }

    /// Log marginal likelihood of a segment with its mean integrated out.
    pub fn log_marginal(&self, seg: &Segment, sigma: f64) -> f64 {
        if seg.n == 0 {
            return 0.0;
        }
        let n = seg.n as f64;
        let s2 = sigma * sigma;
        let v0 = self.prior_scale * self.prior_scale;
        -0.5 * n * (2.0 * PI * s2).ln()
            - 0.5 * (n * v0 / s2).ln_1p()
            - seg.sse / (2.0 * s2)
            - seg.sum * seg.sum / (2.0 * n * (s2 + n * v0))
    }

    /// Log of `p(y | tau, sigma)` up to a constant, for every candidate year.
    pub fn tau_log_weights(&self, sigma: f64) -> Vec<f64> {
        // Marginals depend on the split index only; compute each once.
        let by_split: Vec<f64> = (0..=self.n())
            .map(|k| {
                let (left, right) = self.regimes(k);
                self.log_marginal(&left, sigma) + self.log_marginal(&right, sigma)
            })
            .collect();
        self.candidates.iter().map(|&(_, k)| by_split[k]).collect()
    }

    /// Mean and standard deviation of `alpha | segment, sigma` (conjugate normal).
    ///
    /// An empty segment returns the prior.
    pub fn alpha_conditional(&self, seg: &Segment, sigma: f64) -> (f64, f64) {
        let v0 = self.prior_scale * self.prior_scale;
        let precision = 1.0 / v0 + seg.n as f64 / (sigma * sigma);
        let mean = (seg.sum / (sigma * sigma)) / precision;
        (mean, precision.recip().sqrt())
    }

    /// Log likelihood of the data given all parameters, up to a constant.
    pub fn log_likelihood(&self, split: usize, alpha1: f64, alpha2: f64, sigma: f64) -> f64 {
        let (left, right) = self.regimes(split);
        let sse = left.sse_about(alpha1) + right.sse_about(alpha2);
        -(self.n() as f64) * sigma.ln() - sse / (2.0 * sigma * sigma)
    }

    /// Half-normal log prior on `sigma`, up to a constant.
    pub fn log_prior_sigma(&self, sigma: f64) -> f64 {
        if sigma <= 0.0 {
            return f64::NEG_INFINITY;
        }
        -sigma * sigma / (2.0 * self.prior_scale * self.prior_scale)
    }

    /// Standard deviation of the observations (used to initialise chains).
    pub fn data_scale(&self) -> f64 {
        let all = self.prefix[self.n()];
        if all.n < 2 {
            return self.prior_scale;
        }
        (all.sse / (all.n as f64 - 1.0)).sqrt()
    }
}
