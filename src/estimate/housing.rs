//! Housing-stock population estimate.
//!
//! `population[y] = housing_units[y] * occupancy_rate[y] * persons_per_household[y]`
//!
//! Only years where all three operands are defined, and whose product is
//! finite, are emitted. Nothing is interpolated or validated here: a zero or
//! negative household size flows straight through the product.

use std::collections::BTreeSet;

use crate::domain::{AnnualSeries, EstimatorId, EstimatorOutput, Quality};

pub fn estimate(
    housing_units: &AnnualSeries,
    occupancy_rate: &AnnualSeries,
    persons_per_household: &AnnualSeries,
) -> EstimatorOutput {
    let series: AnnualSeries = housing_units
        .iter()
        .filter_map(|(y, units)| {
            let occ = occupancy_rate.get(y)?;
            let pph = persons_per_household.get(y)?;
            Some((y, units * occ * pph))
        })
        .collect();

    let dropped_years: Vec<i32> = housing_units
        .years()
        .chain(occupancy_rate.years())
        .chain(persons_per_household.years())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|&y| !series.contains(y))
        .collect();

    if !dropped_years.is_empty() {
        log::warn!(
            "{}: {} year(s) dropped for missing operands or non-finite products",
            EstimatorId::HousingModel,
            dropped_years.len()
        );
    }

    EstimatorOutput {
        id: EstimatorId::HousingModel,
        series,
        quality: Quality {
            dropped_years,
            imputed_years: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pairs: &[(i32, f64)]) -> AnnualSeries {
        AnnualSeries::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn product_over_common_years() {
        let h = series(&[(2000, 100.0), (2001, 110.0), (2002, 120.0)]);
        let o = series(&[(2000, 0.9), (2001, 0.8)]);
        let p = series(&[(2000, 2.5), (2001, 2.0), (2003, 3.0)]);

        let out = estimate(&h, &o, &p);
        assert_eq!(out.id, EstimatorId::HousingModel);
        assert_eq!(out.series.years().collect::<Vec<_>>(), vec![2000, 2001]);
        assert_eq!(out.series.get(2000), Some(100.0 * 0.9 * 2.5));
        assert_eq!(out.series.get(2001), Some(110.0 * 0.8 * 2.0));
        assert_eq!(out.quality.dropped_years, vec![2002, 2003]);
    }

    #[test]
    fn single_year_gives_single_entry() {
        let one = series(&[(1950, 2.0)]);
        let out = estimate(&one, &one, &one);
        assert_eq!(out.series.len(), 1);
        assert_eq!(out.series.get(1950), Some(8.0));
        assert!(out.quality.is_complete());
    }

    #[test]
    fn overflowing_product_is_dropped() {
        let h = series(&[(2000, 1e200), (2001, 10.0)]);
        let o = series(&[(2000, 1.0), (2001, 1.0)]);
        let p = series(&[(2000, 1e200), (2001, 2.0)]);

        let out = estimate(&h, &o, &p);
        assert_eq!(out.series.get(2000), None);
        assert_eq!(out.series.get(2001), Some(20.0));
        assert_eq!(out.quality.dropped_years, vec![2000]);
    }

    #[test]
    fn negative_household_size_is_not_validated() {
        let h = series(&[(2000, 10.0)]);
        let o = series(&[(2000, 1.0)]);
        let p = series(&[(2000, -1.0)]);
        assert_eq!(estimate(&h, &o, &p).series.get(2000), Some(-10.0));
    }
}
