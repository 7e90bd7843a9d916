//! `pop-reconcile` library crate.
//!
//! The binary (`recon`) is a thin wrapper around this library so that:
//!
//! - the estimators and the sampler are testable without spawning processes
//! - every pipeline stage can be called on its own with plain annual series

pub mod app;
pub mod changepoint;
pub mod cli;
pub mod data;
pub mod discrepancy;
pub mod domain;
pub mod error;
pub mod estimate;
pub mod io;
pub mod math;
pub mod report;
