//! Tuning configuration

use serde::{Deserialize, Serialize};

use crate::training::TrainingConfig;

/// Configuration for randomized hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Maximum number of sampled combinations
    pub n_iter: usize,

    /// Cross-validation folds for scoring each trial
    pub cv_folds: usize,

    /// Seed for the sampler, the folds and the refitted model
    pub random_state: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            n_iter: 30,
            cv_folds: 3,
            random_state: 42,
        }
    }
}

impl TuningConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_training(config: &TrainingConfig) -> Self {
        Self {
            n_iter: config.n_iter,
            cv_folds: config.cv_folds,
            random_state: config.random_state,
        }
    }

    /// Builder method to set the number of sampled combinations
    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}
