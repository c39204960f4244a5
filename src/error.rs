//! Error types for the vintner pipeline

use thiserror::Error;

/// Result type alias for vintner operations
pub type Result<T> = std::result::Result<T, VintnerError>;

/// Main error type for the pipeline and the prediction service
#[derive(Error, Debug)]
pub enum VintnerError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Insufficient data for class {class} ({count} samples): {reason}")]
    DataInsufficient {
        class: i64,
        count: usize,
        reason: String,
    },

    #[error("Too few rows to stratify: holdout of {held} and remainder of {kept} cannot both cover {classes} classes")]
    SplitTooSmall {
        held: usize,
        kept: usize,
        classes: usize,
    },

    #[error("Candidate {candidate} failed: {reason}")]
    CandidateTrainingFailure { candidate: String, reason: String },

    #[error("Unsupported metric: {0}")]
    UnsupportedMetric(String),

    #[error("Failed to load artifact {path}: {reason}")]
    ArtifactLoad { path: String, reason: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Missing features: {0:?}")]
    MissingFeatures(Vec<String>),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl VintnerError {
    /// Shorthand for an invalid hyperparameter value
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        VintnerError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for VintnerError {
    fn from(err: polars::error::PolarsError) -> Self {
        VintnerError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for VintnerError {
    fn from(err: serde_json::Error) -> Self {
        VintnerError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for VintnerError {
    fn from(err: bincode::Error) -> Self {
        VintnerError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for VintnerError {
    fn from(err: ndarray::ShapeError) -> Self {
        VintnerError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
