//! Fits every available family and scores it on validation and CV

use crate::data::Dataset;
use crate::error::{Result, VintnerError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use super::cross_validation::{cross_val_accuracy, CrossValidator};
use super::models::{accuracy, TrainedModel};
use super::params::Hyperparameters;
use super::registry::{AlgorithmSpec, ModelRegistry, Tier};

/// Scores recorded for a successful candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub train_accuracy: f64,
    pub validation_accuracy: f64,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub training_time_secs: f64,
}

/// A fitted candidate with its scores
#[derive(Debug, Clone)]
pub struct CandidateModel {
    pub algorithm: String,
    pub tier: Tier,
    pub params: Hyperparameters,
    pub model: TrainedModel,
    pub metrics: CandidateMetrics,
}

/// Outcome of training the whole registry
#[derive(Debug, Default)]
pub struct CandidateReport {
    /// Successful candidates in registration order
    pub successes: Vec<CandidateModel>,
    /// `CandidateTrainingFailure` for each family that failed
    pub failures: Vec<VintnerError>,
    /// Families skipped by their availability check
    pub skipped: Vec<String>,
}

/// Trains registry candidates in parallel
pub struct CandidateTrainer {
    cv_folds: usize,
    random_state: u64,
}

impl CandidateTrainer {
    pub fn new(cv_folds: usize, random_state: u64) -> Self {
        Self { cv_folds, random_state }
    }

    /// Fit and score every available family; failures never abort the run
    pub fn train_all(&self, registry: &ModelRegistry, train: &Dataset, validation: &Dataset) -> CandidateReport {
        let mut report = CandidateReport::default();

        let available: Vec<&AlgorithmSpec> = registry
            .specs()
            .iter()
            .filter(|spec| {
                let ok = spec.is_available();
                if !ok {
                    info!(algorithm = %spec.id, "Skipping unavailable algorithm");
                    report.skipped.push(spec.id.clone());
                }
                ok
            })
            .collect();

        // Indexed parallel collect keeps registration order
        let outcomes: Vec<Result<CandidateModel>> = available
            .par_iter()
            .map(|spec| self.train_one(spec, train, validation))
            .collect();

        for (spec, outcome) in available.iter().zip(outcomes) {
            match outcome {
                Ok(candidate) => {
                    info!(
                        algorithm = %candidate.algorithm,
                        train_accuracy = candidate.metrics.train_accuracy,
                        validation_accuracy = candidate.metrics.validation_accuracy,
                        cv_mean = candidate.metrics.cv_mean,
                        cv_std = candidate.metrics.cv_std,
                        "Candidate trained"
                    );
                    report.successes.push(candidate);
                }
                Err(e) => {
                    warn!(algorithm = %spec.id, error = %e, "Candidate failed");
                    report.failures.push(VintnerError::CandidateTrainingFailure {
                        candidate: spec.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn train_one(&self, spec: &AlgorithmSpec, train: &Dataset, validation: &Dataset) -> Result<CandidateModel> {
        let start = Instant::now();
        let params = Hyperparameters::new();

        let mut model = spec.build(&params, self.random_state)?;
        model.fit(train.x(), train.y())?;

        let train_accuracy = accuracy(train.y(), &model.predict(train.x())?);
        let validation_accuracy = accuracy(validation.y(), &model.predict(validation.x())?);

        let splits = CrossValidator::new(self.cv_folds)
            .with_random_state(self.random_state)
            .split(train.y())?;
        let cv = cross_val_accuracy(|| spec.build(&params, self.random_state), train.x(), train.y(), &splits)?;

        Ok(CandidateModel {
            algorithm: spec.id.clone(),
            tier: spec.tier,
            params,
            model,
            metrics: CandidateMetrics {
                train_accuracy,
                validation_accuracy,
                cv_mean: cv.mean_score,
                cv_std: cv.std_score,
                training_time_secs: start.elapsed().as_secs_f64(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic;
    use crate::training::{Capabilities, ModelRegistry};

    fn failing_builder(_: &Hyperparameters, _: u64) -> Result<TrainedModel> {
        Err(VintnerError::TrainingError("solver diverged".to_string()))
    }

    fn never_available() -> bool {
        false
    }

    #[test]
    fn test_failure_is_recorded_not_fatal() {
        let data = synthetic(&[4, 5, 6], 9);
        let broken = AlgorithmSpec::new(
            "Broken",
            Tier::Advanced,
            Capabilities {
                probabilities: true,
                feature_importances: false,
            },
            failing_builder,
        );
        let registry = ModelRegistry::new()
            .register(ModelRegistry::dummy())
            .register(broken)
            .register(ModelRegistry::decision_tree());

        let report = CandidateTrainer::new(3, 42).train_all(&registry, &data, &data);

        let ids: Vec<&str> = report.successes.iter().map(|c| c.algorithm.as_str()).collect();
        assert_eq!(ids, vec!["DummyClassifier", "DecisionTree"]);
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0] {
            VintnerError::CandidateTrainingFailure { candidate, reason } => {
                assert_eq!(candidate, "Broken");
                assert!(reason.contains("solver diverged"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_unavailable_family_is_skipped() {
        let data = synthetic(&[1, 2], 6);
        let registry = ModelRegistry::new()
            .register(ModelRegistry::svm().with_availability(never_available))
            .register(ModelRegistry::dummy());

        let report = CandidateTrainer::new(3, 0).train_all(&registry, &data, &data);
        assert_eq!(report.skipped, vec!["SVM".to_string()]);
        assert_eq!(report.successes.len(), 1);
    }

    #[test]
    fn test_metrics_are_recorded() {
        let data = synthetic(&[5, 6, 7], 9);
        let registry = ModelRegistry::new().register(ModelRegistry::decision_tree());
        let report = CandidateTrainer::new(3, 42).train_all(&registry, &data, &data);

        let metrics = report.successes[0].metrics;
        assert_eq!(metrics.train_accuracy, 1.0);
        assert!((0.0..=1.0).contains(&metrics.cv_mean));
        assert!(metrics.cv_std >= 0.0);
    }
}
