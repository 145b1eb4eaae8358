//! Error types for the outlet adapter and driver.

use lf_case::CaseError;
use lf_models::ModelError;
use thiserror::Error;

/// Errors raised while wiring outlets to host fields or driving them.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Field '{field}' not found for patch '{patch}'")]
    MissingField { field: String, patch: String },

    #[error("Unknown patch: {name}")]
    UnknownPatch { name: String },

    #[error("Patch '{patch}': {source}")]
    Model {
        patch: String,
        #[source]
        source: ModelError,
    },

    #[error("Case error: {0}")]
    Case(#[from] CaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;

impl From<lf_case::ValidationError> for SimError {
    fn from(e: lf_case::ValidationError) -> Self {
        SimError::Case(CaseError::Validation(e))
    }
}
