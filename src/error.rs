//! Error types for the susceptibility pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, SusceptibilityError>;

/// Main error type for the pipeline
///
/// Every variant is fatal to the current run; stages never retry.
#[derive(Error, Debug)]
pub enum SusceptibilityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Unknown classifier variant: {0}")]
    UnknownVariant(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Factor grids are misaligned: {0}")]
    MisalignedFactors(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Computation error: {0}")]
    Computation(String),
}

impl SusceptibilityError {
    pub(crate) fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        SusceptibilityError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for SusceptibilityError {
    fn from(err: polars::error::PolarsError) -> Self {
        SusceptibilityError::Format(err.to_string())
    }
}

impl From<serde_json::Error> for SusceptibilityError {
    fn from(err: serde_json::Error) -> Self {
        SusceptibilityError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SusceptibilityError {
    fn from(err: ndarray::ShapeError) -> Self {
        SusceptibilityError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<tiff::TiffError> for SusceptibilityError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(e) => SusceptibilityError::Io(e),
            other => SusceptibilityError::Format(other.to_string()),
        }
    }
}
