//! Error types for boundary model operations.

use lf_core::error::LfError;
use thiserror::Error;

/// Result type for boundary model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while constructing or advancing a boundary model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Pole {index} has value {value} but must be negative for stability")]
    UnstablePole { index: usize, value: f64 },

    #[error("{what} list size ({found}) must equal nPoles ({expected})")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Unknown {what} '{value}' (expected one of: {expected})")]
    UnknownVariant {
        what: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Vector fitting failed: {what}")]
    FitFailed { what: &'static str },

    #[error("Sample mismatch: {what}")]
    SampleMismatch { what: String },
}

impl From<LfError> for ModelError {
    fn from(e: LfError) -> Self {
        match e {
            LfError::NonFinite { what, .. } => ModelError::NonPhysical { what },
            LfError::InvalidArg { what } => ModelError::InvalidArg { what },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstable_pole_cites_index() {
        let err = ModelError::UnstablePole {
            index: 0,
            value: 0.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("Pole 0"));
        assert!(msg.contains("negative"));
    }

    #[test]
    fn non_finite_maps_to_non_physical() {
        let err: ModelError = LfError::NonFinite {
            what: "patch flux",
            value: f64::NAN,
        }
        .into();
        assert_eq!(err, ModelError::NonPhysical { what: "patch flux" });
    }
}
