//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the year-keyed series every component exchanges (`AnnualSeries`)
//! - estimator outputs and discrepancies (`EstimatorOutput`, `DiscrepancySeries`)
//! - changepoint posterior draws and summaries
//! - run configuration (`ReconConfig`, `SamplerConfig`)

pub mod types;

pub use types::*;
