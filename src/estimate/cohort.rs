//! Cohort-survival projection.
//!
//! Starting from a known population at the anchor year, each following year is
//!
//! ```text
//! pop[y + 1] = pop[y] + births[y] - deaths[y] + net_migration[y]
//! ```
//!
//! The recursion is a left fold over consecutive years, so it is inherently
//! sequential; the full trajectory (not just the final value) is the output.
//! A flow component missing for a year counts as zero, and that year is
//! reported in `Quality::imputed_years`. Years whose projected value overflows
//! are left out of the series and reported in `Quality::dropped_years`.

use std::collections::BTreeSet;

use crate::domain::{AnnualSeries, EstimatorId, EstimatorOutput, Quality};
use crate::error::ReconError;

/// Horizons reaching further than this past the last official year get a warning.
const FAR_HORIZON_YEARS: i32 = 100;

/// Demographic flows driving the projection.
#[derive(Debug, Clone, Copy)]
pub struct Flows<'a> {
    pub births: &'a AnnualSeries,
    pub deaths: &'a AnnualSeries,
    pub net_migration: &'a AnnualSeries,
}

impl Flows<'_> {
    /// Net change applied between `year` and `year + 1`, plus whether any
    /// component had to be defaulted.
    fn net_change(&self, year: i32) -> (f64, bool) {
        let b = self.births.get(year);
        let d = self.deaths.get(year);
        let m = self.net_migration.get(year);
        let imputed = b.is_none() || d.is_none() || m.is_none();
        (
            b.unwrap_or(0.0) - d.unwrap_or(0.0) + m.unwrap_or(0.0),
            imputed,
        )
    }

    fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.births
            .years()
            .chain(self.deaths.years())
            .chain(self.net_migration.years())
    }
}

/// Resolve the anchor year and its official value.
///
/// Without a designated year, the earliest official year is used.
pub fn anchor(official: &AnnualSeries, designated: Option<i32>) -> Result<(i32, f64), ReconError> {
    let year = designated.or_else(|| official.first_year());
    year.and_then(|y| official.get(y).map(|v| (y, v)))
        .ok_or_else(|| ReconError::NoAnchor {
            estimator: EstimatorId::CohortModel,
            span: official.span(),
        })
}

/// Default projection horizon: the anchor plus every year any flow covers.
pub fn projection_horizon(anchor_year: i32, flows: &Flows<'_>) -> BTreeSet<i32> {
    std::iter::once(anchor_year).chain(flows.years()).collect()
}

/// Project population forward from the anchor through the last horizon year.
///
/// Horizon years before the anchor are ignored. The walk is gap-free: every
/// year between the anchor and the last horizon year gets a value.
pub fn project(
    official: &AnnualSeries,
    flows: &Flows<'_>,
    horizon: &BTreeSet<i32>,
    anchor_year: Option<i32>,
) -> Result<EstimatorOutput, ReconError> {
    let (start, seed) = anchor(official, anchor_year)?;
    let end = horizon.last().copied().unwrap_or(start).max(start);
    let last_official = official.last_year().unwrap_or(start);
    if end - last_official > FAR_HORIZON_YEARS {
        log::warn!(
            "{}: projecting to {end}, {} years past the last official year {last_official}; check flow inputs for mistyped years",
            EstimatorId::CohortModel,
            end - last_official
        );
    }

    let mut imputed_years = Vec::new();
    let trajectory: AnnualSeries = std::iter::once((start, seed))
        .chain((start..end).scan(seed, |pop, year| {
            let (delta, imputed) = flows.net_change(year);
            if imputed {
                imputed_years.push(year);
            }
            *pop += delta;
            Some((year + 1, *pop))
        }))
        .collect();

    let dropped_years: Vec<i32> = (start..=end).filter(|&y| !trajectory.contains(y)).collect();
    if !dropped_years.is_empty() {
        log::warn!(
            "{}: {} year(s) dropped for non-finite projected values from {}",
            EstimatorId::CohortModel,
            dropped_years.len(),
            dropped_years[0]
        );
    }

    if !imputed_years.is_empty() {
        log::warn!(
            "{}: flow components defaulted to zero for {} year(s) in {start}-{end}",
            EstimatorId::CohortModel,
            imputed_years.len()
        );
    }

    Ok(EstimatorOutput {
        id: EstimatorId::CohortModel,
        series: trajectory,
        quality: Quality {
            dropped_years,
            imputed_years,
        },
    })
}
