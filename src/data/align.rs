//! Annual series alignment.
//!
//! Raw inputs arrive either dated (monthly/quarterly stamps) or already keyed by
//! year, sometimes with several records per year. This module collapses them
//! into one value per calendar year:
//!
//! - [`Collapse::Last`]: last observed value per year, in input order
//!   (official-style series, where a later estimate supersedes an earlier one)
//! - [`Collapse::Mean`]: mean of observed values per year
//!   (stock-style series such as quarterly housing-unit counts)
//!
//! Non-finite values are skipped, never averaged in.
//!
//! A required input that is absent is a [`ReconError::MissingSource`]. Callers
//! recover with [`with_fallback`], which substitutes a synthetic series built by
//! [`interpolate_anchors`] / [`linear_ramp`].

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};

use crate::domain::AnnualSeries;
use crate::error::ReconError;

/// A single raw record, reduced to its calendar year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub year: i32,
    pub value: f64,
}

impl Observation {
    pub fn dated(date: NaiveDate, value: f64) -> Self {
        Self {
            year: date.year(),
            value,
        }
    }

    pub fn annual(year: i32, value: f64) -> Self {
        Self { year, value }
    }
}

/// How repeated records for the same year are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collapse {
    Last,
    Mean,
}

/// Collapse raw observations into one value per year.
pub fn collapse(observations: &[Observation], policy: Collapse) -> AnnualSeries {
    match policy {
        Collapse::Last => observations
            .iter()
            .filter(|o| o.value.is_finite())
            .map(|o| (o.year, o.value))
            .collect(),
        Collapse::Mean => {
            let mut acc: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
            for o in observations.iter().filter(|o| o.value.is_finite()) {
                let slot = acc.entry(o.year).or_insert((0.0, 0));
                slot.0 += o.value;
                slot.1 += 1;
            }
            acc.into_iter()
                .map(|(year, (sum, n))| (year, sum / n as f64))
                .collect()
        }
    }
}

/// Align a required input.
///
/// `None` (the source was never supplied) and inputs with no usable record both
/// fail with `MissingSource`.
pub fn align(
    name: &str,
    observations: Option<&[Observation]>,
    policy: Collapse,
) -> Result<AnnualSeries, ReconError> {
    let Some(observations) = observations else {
        return Err(ReconError::missing_source(name));
    };
    let series = collapse(observations, policy);
    if series.is_empty() {
        return Err(ReconError::missing_source(name));
    }
    Ok(series)
}

/// Recover from a missing source by substituting `fallback()`.
///
/// Any other error is passed through untouched.
pub fn with_fallback(
    aligned: Result<AnnualSeries, ReconError>,
    fallback: impl FnOnce() -> AnnualSeries,
) -> Result<AnnualSeries, ReconError> {
    match aligned {
        Err(ReconError::MissingSource { name }) => {
            let series = fallback();
            log::warn!(
                "source `{name}` missing; using synthetic fallback over {} years",
                series.len()
            );
            Ok(series)
        }
        other => other,
    }
}

/// Linear interpolation between anchor points over `years`.
///
/// Years before the first anchor are left undefined; years after the last
/// anchor hold the last anchor value. Anchors outside `years` are ignored.
pub fn interpolate_anchors(anchors: &[(i32, f64)], years: RangeInclusive<i32>) -> AnnualSeries {
    let mut points: Vec<(i32, f64)> = anchors
        .iter()
        .copied()
        .filter(|(y, v)| years.contains(y) && v.is_finite())
        .collect();
    points.sort_by_key(|&(y, _)| y);
    points.dedup_by_key(|p| p.0);

    let Some(&(first_year, _)) = points.first() else {
        return AnnualSeries::new();
    };

    let mut out = BTreeMap::new();
    for year in first_year..=*years.end() {
        // Index of the first anchor strictly after `year`.
        let next = points.partition_point(|&(y, _)| y <= year);
        let (y0, v0) = points[next - 1];
        let value = match points.get(next) {
            Some(&(y1, v1)) => v0 + (v1 - v0) * (year - y0) as f64 / (y1 - y0) as f64,
            None => v0,
        };
        out.insert(year, value);
    }
    out.into_iter().collect()
}

/// Evenly spaced values from `start` to `end` over `years` (both endpoints included).
pub fn linear_ramp(years: RangeInclusive<i32>, start: f64, end: f64) -> AnnualSeries {
    let anchors = [(*years.start(), start), (*years.end(), end)];
    interpolate_anchors(&anchors, years)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn collapse_last_keeps_last_record_per_year() {
        let obs = [
            Observation::dated(date(2000, 1), 1.0),
            Observation::dated(date(2000, 7), 2.0),
            Observation::dated(date(2001, 1), 5.0),
            Observation::dated(date(2000, 12), 3.0),
        ];
        let s = collapse(&obs, Collapse::Last);
        assert_eq!(s.get(2000), Some(3.0));
        assert_eq!(s.get(2001), Some(5.0));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn collapse_mean_averages_quarters_and_skips_nan() {
        let obs = [
            Observation::dated(date(2000, 1), 100.0),
            Observation::dated(date(2000, 4), 102.0),
            Observation::dated(date(2000, 7), f64::NAN),
            Observation::dated(date(2000, 10), 104.0),
        ];
        let s = collapse(&obs, Collapse::Mean);
        assert!((s.get(2000).unwrap() - 102.0).abs() < 1e-12);
    }

    #[test]
    fn align_reports_missing_source() {
        let err = align("births", None, Collapse::Last).unwrap_err();
        assert_eq!(err, ReconError::missing_source("births"));

        let nan_only = [Observation::annual(2000, f64::NAN)];
        assert!(align("births", Some(&nan_only), Collapse::Last).is_err());
    }

    #[test]
    fn with_fallback_substitutes_only_for_missing_source() {
        let got = with_fallback(Err(ReconError::missing_source("x")), || {
            linear_ramp(2000..=2002, 0.0, 2.0)
        })
        .unwrap();
        assert_eq!(got.get(2001), Some(1.0));

        let other = ReconError::NoAnchor {
            estimator: crate::domain::EstimatorId::CohortModel,
            span: None,
        };
        let passed = with_fallback(Err(other.clone()), AnnualSeries::new);
        assert_eq!(passed.unwrap_err(), other);
    }

    #[test]
    fn linear_ramp_matches_linspace() {
        let s = linear_ramp(1940..=2023, 132e6, 336e6);
        assert_eq!(s.len(), 84);
        assert!((s.get(1940).unwrap() - 132e6).abs() < 1e-6);
        assert!((s.get(2023).unwrap() - 336e6).abs() < 1e-6);
        let step = (336e6 - 132e6) / 83.0;
        assert!((s.get(1941).unwrap() - (132e6 + step)).abs() < 1e-6);
    }

    #[test]
    fn interpolate_anchors_leaves_leading_gap_and_holds_tail() {
        let s = interpolate_anchors(&[(2002, 10.0), (2004, 20.0)], 2000..=2006);
        assert!(!s.contains(2000));
        assert!(!s.contains(2001));
        assert_eq!(s.get(2003), Some(15.0));
        assert_eq!(s.get(2006), Some(20.0));
    }
}
