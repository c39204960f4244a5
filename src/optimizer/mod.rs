//! Hyperparameter tuning
//!
//! Randomized search over finite per-family grids, scored by stratified
//! cross-validation accuracy on the training partition.

mod config;
mod search_space;
mod tuner;

pub use config::TuningConfig;
pub use search_space::{Parameter, SearchSpace};
pub use tuner::{HyperparameterTuner, Study, TrialResult, TunedModel};
