//! Mathematical utilities: posterior summary statistics.

pub mod stats;

pub use stats::*;
