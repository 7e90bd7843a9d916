//! Error types.
//!
//! Two layers:
//!
//! - [`ReconError`]: the domain taxonomy raised by estimators and the changepoint
//!   engine. Each variant carries enough context (which series, which years) to
//!   diagnose the failure without re-running.
//! - [`AppError`]: what the binary reports. An exit code plus a message, so
//!   `main` can map failures to process status.

use std::ops::RangeInclusive;
use std::time::Duration;

use thiserror::Error;

use crate::domain::EstimatorId;

/// Failures of the reconciliation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconError {
    /// A required input series was not supplied.
    ///
    /// Recoverable at the aligner boundary by substituting a synthetic fallback.
    #[error("missing source series `{name}`")]
    MissingSource { name: String },

    /// The cohort recursion has no official value to seed from.
    #[error("{estimator}: no anchor value in official series (official years: {})", fmt_span(.span))]
    NoAnchor {
        estimator: EstimatorId,
        span: Option<RangeInclusive<i32>>,
    },

    /// Changepoint inference refused to produce a posterior.
    #[error(
        "{series}: insufficient data for changepoint inference ({observed} observations over {}, need {required}): {reason}",
        fmt_span(.span)
    )]
    InsufficientData {
        series: String,
        observed: usize,
        required: usize,
        span: Option<RangeInclusive<i32>>,
        reason: String,
    },

    /// Sampling did not finish before the configured deadline.
    #[error(
        "{series}: sampling timed out after {:.2}s ({completed_chains}/{chains} chains complete)",
        .elapsed.as_secs_f64()
    )]
    SamplingTimeout {
        series: String,
        elapsed: Duration,
        completed_chains: usize,
        chains: usize,
    },
}

impl ReconError {
    pub fn missing_source(name: impl Into<String>) -> Self {
        Self::MissingSource { name: name.into() }
    }

    /// Exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReconError::MissingSource { .. } => 2,
            ReconError::NoAnchor { .. } | ReconError::InsufficientData { .. } => 3,
            ReconError::SamplingTimeout { .. } => 4,
        }
    }
}

fn fmt_span(span: &Option<RangeInclusive<i32>>) -> String {
    match span {
        Some(r) => format!("{}-{}", r.start(), r.end()),
        None => "none".to_string(),
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ReconError> for AppError {
    fn from(err: ReconError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_anchor_message_names_estimator_and_span() {
        let err = ReconError::NoAnchor {
            estimator: EstimatorId::CohortModel,
            span: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("cohort_model"), "{msg}");
        assert!(msg.contains("none"), "{msg}");
    }

    #[test]
    fn insufficient_data_maps_to_exit_code_3() {
        let err = ReconError::InsufficientData {
            series: "housing_model".to_string(),
            observed: 1,
            required: 10,
            span: Some(2000..=2000),
            reason: "too few observations".to_string(),
        };
        assert!(err.to_string().contains("2000-2000"));
        let app: AppError = err.into();
        assert_eq!(app.exit_code(), 3);
    }
}
