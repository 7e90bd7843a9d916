//! Source series bundle and synthetic fallbacks.
//!
//! The pipeline consumes seven annual series. Each has a fixed collapse policy
//! and a synthetic stand-in used when the source is absent, so a missing file
//! degrades the run instead of aborting it.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::data::align::{align, linear_ramp, with_fallback, Collapse, Observation};
use crate::domain::AnnualSeries;
use crate::error::ReconError;

/// Horizon for synthetic fallbacks when nothing else pins one down.
pub const DEFAULT_HORIZON: RangeInclusive<i32> = 1940..=2023;

/// Every input the core can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Official,
    HousingUnits,
    OccupancyRate,
    PersonsPerHousehold,
    Births,
    Deaths,
    NetMigration,
}

impl SourceKind {
    pub const ALL: [SourceKind; 7] = [
        SourceKind::Official,
        SourceKind::HousingUnits,
        SourceKind::OccupancyRate,
        SourceKind::PersonsPerHousehold,
        SourceKind::Births,
        SourceKind::Deaths,
        SourceKind::NetMigration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Official => "official",
            SourceKind::HousingUnits => "housing_units",
            SourceKind::OccupancyRate => "occupancy_rate",
            SourceKind::PersonsPerHousehold => "persons_per_household",
            SourceKind::Births => "births",
            SourceKind::Deaths => "deaths",
            SourceKind::NetMigration => "net_migration",
        }
    }

    pub fn collapse(self) -> Collapse {
        match self {
            SourceKind::HousingUnits => Collapse::Mean,
            _ => Collapse::Last,
        }
    }

    /// Synthetic stand-in over `years`.
    pub fn fallback(self, years: RangeInclusive<i32>) -> AnnualSeries {
        match self {
            SourceKind::Official => linear_ramp(years, 132e6, 336e6),
            SourceKind::HousingUnits => linear_ramp(years, 37e6, 146e6),
            SourceKind::OccupancyRate => AnnualSeries::constant(years, 0.9),
            SourceKind::PersonsPerHousehold => linear_ramp(years, 3.6, 2.5),
            SourceKind::Births => AnnualSeries::constant(years, 3e6),
            SourceKind::Deaths => AnnualSeries::constant(years, 2e6),
            SourceKind::NetMigration => AnnualSeries::constant(years, 500e3),
        }
    }
}

/// Raw observations per source, as handed over by a loader.
///
/// A source that is not present in the map was never supplied.
#[derive(Debug, Clone, Default)]
pub struct RawSources {
    observations: HashMap<SourceKind, Vec<Observation>>,
}

impl RawSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: SourceKind, observations: Vec<Observation>) {
        self.observations.insert(kind, observations);
    }

    pub fn with(mut self, kind: SourceKind, observations: Vec<Observation>) -> Self {
        self.insert(kind, observations);
        self
    }

    pub fn get(&self, kind: SourceKind) -> Option<&[Observation]> {
        self.observations.get(&kind).map(Vec::as_slice)
    }
}

/// The seven aligned series consumed by the estimators.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSeries {
    pub official: AnnualSeries,
    pub housing_units: AnnualSeries,
    pub occupancy_rate: AnnualSeries,
    pub persons_per_household: AnnualSeries,
    pub births: AnnualSeries,
    pub deaths: AnnualSeries,
    pub net_migration: AnnualSeries,
    /// Sources replaced by a synthetic fallback.
    pub fallbacks: Vec<SourceKind>,
}

impl SourceSeries {
    /// Align every source, substituting fallbacks for the missing ones.
    ///
    /// Fallbacks span the union of the supplied sources' years, or
    /// [`DEFAULT_HORIZON`] when nothing was supplied. A missing net-migration
    /// source on its own is treated as zero migration over the births years.
    pub fn resolve(raw: &RawSources) -> Result<Self, ReconError> {
        let aligned: Vec<(SourceKind, Result<AnnualSeries, ReconError>)> = SourceKind::ALL
            .iter()
            .map(|&kind| (kind, align(kind.name(), raw.get(kind), kind.collapse())))
            .collect();

        let horizon = aligned
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok().and_then(AnnualSeries::span))
            .reduce(|a, b| (*a.start()).min(*b.start())..=(*a.end()).max(*b.end()))
            .unwrap_or(DEFAULT_HORIZON);

        let births_years = aligned
            .iter()
            .find(|(k, _)| *k == SourceKind::Births)
            .and_then(|(_, r)| r.as_ref().ok())
            .and_then(AnnualSeries::span);

        let mut fallbacks = Vec::new();
        let mut resolved: HashMap<SourceKind, AnnualSeries> = HashMap::new();
        for (kind, result) in aligned {
            if result.is_err() {
                fallbacks.push(kind);
            }
            let series = match (kind, &births_years) {
                (SourceKind::NetMigration, Some(years)) => {
                    let years = years.clone();
                    with_fallback(result, || AnnualSeries::constant(years, 0.0))?
                }
                _ => with_fallback(result, || kind.fallback(horizon.clone()))?,
            };
            resolved.insert(kind, series);
        }

        let mut take = |kind: SourceKind| resolved.remove(&kind).unwrap_or_default();
        Ok(Self {
            official: take(SourceKind::Official),
            housing_units: take(SourceKind::HousingUnits),
            occupancy_rate: take(SourceKind::OccupancyRate),
            persons_per_household: take(SourceKind::PersonsPerHousehold),
            births: take(SourceKind::Births),
            deaths: take(SourceKind::Deaths),
            net_migration: take(SourceKind::NetMigration),
            fallbacks,
        })
    }
}
