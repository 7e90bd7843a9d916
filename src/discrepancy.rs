//! Official-minus-estimate discrepancies.

use crate::domain::{AnnualSeries, DiscrepancySeries, EstimatorId, EstimatorOutput};

/// `official[y] - estimate[y]` for every year both series define.
pub fn compute(official: &AnnualSeries, estimate: &EstimatorOutput) -> DiscrepancySeries {
    DiscrepancySeries {
        estimator: estimate.id,
        series: official.zip_with(&estimate.series, |off, est| off - est),
    }
}

/// One discrepancy series per non-official estimator, in input order.
pub fn compute_all(official: &AnnualSeries, estimates: &[EstimatorOutput]) -> Vec<DiscrepancySeries> {
    estimates
        .iter()
        .filter(|e| e.id != EstimatorId::Official)
        .map(|e| compute(official, e))
        .collect()
}
