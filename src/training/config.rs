//! Training pipeline configuration

use crate::error::{VintnerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a full training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Directory holding `winequality-red.csv` and `winequality-white.csv`
    pub data_dir: PathBuf,

    /// Directory the artifact bundle is written to
    pub models_dir: PathBuf,

    /// Fraction of the full dataset held out as the test partition
    pub test_size: f64,

    /// Fraction of the full dataset used as the validation partition
    pub validation_size: f64,

    /// Number of cross-validation folds for candidate scoring and tuning
    pub cv_folds: usize,

    /// Number of parameter combinations drawn by the randomized search
    pub n_iter: usize,

    /// Random seed for splitting, fold assignment and search sampling
    pub random_state: u64,

    /// Number of rayon worker threads (None = rayon default)
    pub n_jobs: Option<usize>,

    /// Skip the hyperparameter search even when a space is registered
    pub skip_tuning: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            models_dir: PathBuf::from("./models"),
            test_size: 0.15,
            validation_size: 0.15,
            cv_folds: 3,
            n_iter: 30,
            random_state: 42,
            n_jobs: None,
            skip_tuning: false,
        }
    }
}

impl TrainingConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `DATA_DIR`, `MODELS_DIR` and `RANDOM_STATE`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("MODELS_DIR") {
            config.models_dir = PathBuf::from(dir);
        }
        if let Some(seed) = std::env::var("RANDOM_STATE").ok().and_then(|s| s.parse().ok()) {
            config.random_state = seed;
        }
        config
    }

    /// Load a configuration from a JSON file; absent keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check fractions and fold counts
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_size) || self.test_size == 0.0 {
            return Err(VintnerError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.validation_size <= 0.0 || self.test_size + self.validation_size >= 1.0 {
            return Err(VintnerError::ConfigError(format!(
                "validation_size must be positive and test_size + validation_size < 1, got {} + {}",
                self.test_size, self.validation_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(VintnerError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        Ok(())
    }

    /// Validation fraction relative to the train+validation remainder
    pub fn relative_validation_size(&self) -> f64 {
        self.validation_size / (1.0 - self.test_size)
    }

    /// Builder method to set the data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Builder method to set the models directory
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    /// Builder method to set CV folds
    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set the number of search iterations
    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Builder method to set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set the worker count
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = Some(n);
        self
    }

    /// Builder method to disable tuning
    pub fn with_skip_tuning(mut self, skip: bool) -> Self {
        self.skip_tuning = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.n_iter, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_relative_validation_size() {
        let config = TrainingConfig::default();
        let rel = config.relative_validation_size();
        assert!((rel - 0.15 / 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_builder_pattern() {
        let config = TrainingConfig::new()
            .with_cv(5)
            .with_n_iter(10)
            .with_random_state(7);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.n_iter, 10);
        assert_eq!(config.random_state, 7);
    }

    #[test]
    fn test_invalid_fractions_rejected() {
        let mut config = TrainingConfig::default();
        config.test_size = 0.6;
        config.validation_size = 0.5;
        assert!(matches!(config.validate(), Err(VintnerError::ConfigError(_))));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"n_iter": 5, "random_state": 1}"#).unwrap();
        let config = TrainingConfig::from_json_file(&path).unwrap();
        assert_eq!(config.n_iter, 5);
        assert_eq!(config.random_state, 1);
        assert_eq!(config.cv_folds, 3);
    }
}
