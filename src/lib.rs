//! Vintner - wine quality model selection, tuning and serving
//!
//! This crate trains a quality classifier from the red and white wine tables
//! and serves it:
//! - Stratified train/validation/test partitioning
//! - Standardization fitted on the training partition only
//! - Candidate training over an injectable algorithm registry
//! - Validation-driven selection and randomized hyperparameter search
//! - Held-out evaluation and a versioned artifact bundle
//! - A stateless predictor behind an HTTP API and a CLI
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`data`] - Dataset, canonical feature order and splitting
//! - [`preprocessing`] - Feature scaling
//! - [`training`] - Algorithm families, registry, candidates and selection
//! - [`optimizer`] - Randomized hyperparameter search
//! - [`evaluation`] - Accuracy, ROC-AUC, classification report
//!
//! ## Artifacts and Serving
//! - [`export`] - Artifact bundle and metadata normalization
//! - [`inference`] - Prediction over a loaded bundle
//! - [`pipeline`] - End-to-end training run
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod optimizer;
pub mod evaluation;

// Artifacts and serving
pub mod export;
pub mod inference;
pub mod pipeline;

// Utilities
pub mod utils;

// Services
pub mod server;
pub mod cli;

pub use error::{Result, VintnerError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, VintnerError};

    // Data
    pub use crate::data::{Dataset, Split, StratifiedSplitter, FEATURE_NAMES, N_FEATURES};

    // Preprocessing
    pub use crate::preprocessing::Scaler;

    // Training
    pub use crate::training::{
        select_best, CandidateModel, CandidateTrainer, Hyperparameters, ModelRegistry, TrainedModel,
        TrainingConfig,
    };

    // Optimization
    pub use crate::optimizer::{HyperparameterTuner, SearchSpace, TunedModel, TuningConfig};

    // Evaluation
    pub use crate::evaluation::{evaluate, ModelEvaluation};

    // Export
    pub use crate::export::{ArtifactStore, ModelMetadata, NumericValue};

    // Inference
    pub use crate::inference::Predictor;

    // Pipeline
    pub use crate::pipeline::{TrainingPipeline, TrainingSummary};
}
