//! Population estimators derived from non-census inputs.
//!
//! - `housing`: housing stock x occupancy x household size
//! - `cohort`: births - deaths + migration, projected from an anchor year

pub mod cohort;
pub mod housing;
