//! Input alignment and source bundling.
//!
//! - `align`: collapse raw records into year-keyed series, fallback helpers
//! - `source`: the seven-series bundle consumed by the estimators

pub mod align;
pub mod source;

pub use align::*;
pub use source::*;
