use std::collections::{BTreeMap, BTreeSet};

use pop_reconcile::discrepancy;
use pop_reconcile::domain::{AnnualSeries, EstimatorId, EstimatorOutput, Quality};
use pop_reconcile::estimate::{cohort, housing};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

/// Sparse year-keyed series inside a small window, so operands overlap partially.
fn series_strategy(lo: f64, hi: f64) -> impl Strategy<Value = AnnualSeries> {
    prop::collection::btree_map(1990i32..2010, lo..hi, 0..20)
        .prop_map(|m: BTreeMap<i32, f64>| m.into_iter().collect())
}

fn years(s: &AnnualSeries) -> BTreeSet<i32> {
    s.years().collect()
}

fn output(id: EstimatorId, series: AnnualSeries) -> EstimatorOutput {
    EstimatorOutput {
        id,
        series,
        quality: Quality::default(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn housing_is_exact_product_over_intersection(
        units in series_strategy(1e6, 2e8),
        occ in series_strategy(0.5, 1.0),
        pph in series_strategy(-1.0, 5.0),
    ) {
        let out = housing::estimate(&units, &occ, &pph);
        let common: BTreeSet<i32> = years(&units)
            .intersection(&years(&occ))
            .copied()
            .filter(|y| pph.contains(*y))
            .collect();

        prop_assert_eq!(years(&out.series), common.clone());
        for y in common {
            let expected = units.get(y).unwrap() * occ.get(y).unwrap() * pph.get(y).unwrap();
            prop_assert_eq!(out.series.get(y), Some(expected));
        }
        for y in &out.quality.dropped_years {
            prop_assert!(!out.series.contains(*y));
        }
    }

    #[test]
    fn discrepancy_is_exact_difference_over_inner_join(
        official in series_strategy(-1e9, 1e9),
        estimate in series_strategy(-1e9, 1e9),
    ) {
        let d = discrepancy::compute(&official, &output(EstimatorId::HousingModel, estimate.clone()));
        let common: BTreeSet<i32> = years(&official).intersection(&years(&estimate)).copied().collect();

        prop_assert_eq!(d.estimator, EstimatorId::HousingModel);
        prop_assert_eq!(years(&d.series), common.clone());
        for y in common {
            prop_assert_eq!(d.series.get(y), Some(official.get(y).unwrap() - estimate.get(y).unwrap()));
        }
    }

    #[test]
    fn cohort_walk_is_gap_free_and_follows_recursion(
        anchor_value in 1e6f64..4e8,
        births in series_strategy(0.0, 5e6),
        deaths in series_strategy(0.0, 3e6),
        mig in series_strategy(-1e6, 2e6),
    ) {
        let official: AnnualSeries = [(1990, anchor_value)].into_iter().collect();
        let flows = cohort::Flows { births: &births, deaths: &deaths, net_migration: &mig };
        let horizon = cohort::projection_horizon(1990, &flows);
        let out = cohort::project(&official, &flows, &horizon, None).unwrap();
        let again = cohort::project(&official, &flows, &horizon, None).unwrap();
        prop_assert_eq!(&out, &again);

        let last = *horizon.last().unwrap();
        let expected_years: BTreeSet<i32> = (1990..=last).collect();
        prop_assert_eq!(years(&out.series), expected_years);
        prop_assert_eq!(out.series.get(1990), Some(anchor_value));

        for y in 1990..last {
            let step = births.get(y).unwrap_or(0.0) - deaths.get(y).unwrap_or(0.0) + mig.get(y).unwrap_or(0.0);
            prop_assert_eq!(out.series.get(y + 1), Some(out.series.get(y).unwrap() + step));

            let complete = births.contains(y) && deaths.contains(y) && mig.contains(y);
            prop_assert_eq!(out.quality.imputed_years.contains(&y), !complete);
        }
    }
}
