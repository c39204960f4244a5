//! Randomized search over a family's registered grid

use crate::data::Dataset;
use crate::error::{Result, VintnerError};
use crate::training::{AlgorithmSpec, CandidateModel, CrossValidator, Hyperparameters, TrainedModel, cross_val_accuracy};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::config::TuningConfig;

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number
    pub trial_id: usize,
    /// Parameters used
    pub params: Hyperparameters,
    /// Mean CV accuracy, `None` when the trial failed
    pub value: Option<f64>,
    /// Standard deviation of the fold accuracies
    pub std: f64,
    /// Trial duration in seconds
    pub duration_secs: f64,
    /// Failure reason
    pub error: Option<String>,
}

/// Study containing all trials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    /// All trial results, in trial order
    pub trials: Vec<TrialResult>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
}

impl Study {
    /// Get the best trial
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.and_then(|idx| self.trials.get(idx))
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().and_then(|t| t.value)
    }

    /// Add a trial result; only a strictly higher score replaces the best
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();

        if let Some(value) = result.value {
            let is_better = match self.best_value() {
                None => true,
                Some(best) => value > best,
            };
            if is_better {
                self.best_trial_idx = Some(idx);
            }
        }

        self.trials.push(result);
    }
}

/// The selected family after tuning
#[derive(Debug, Clone)]
pub struct TunedModel {
    pub algorithm: String,
    pub params: Hyperparameters,
    pub model: TrainedModel,
    /// Best mean CV accuracy when a search ran
    pub cv_score: Option<f64>,
    pub study: Option<Study>,
}

impl TunedModel {
    /// Pass a candidate through unchanged
    pub fn untuned(candidate: &CandidateModel) -> Self {
        Self {
            algorithm: candidate.algorithm.clone(),
            params: candidate.params.clone(),
            model: candidate.model.clone(),
            cv_score: None,
            study: None,
        }
    }

    pub fn was_tuned(&self) -> bool {
        self.study.is_some()
    }
}

/// Randomized search tuner
pub struct HyperparameterTuner {
    config: TuningConfig,
}

impl HyperparameterTuner {
    pub fn new(config: TuningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// Tune the selected candidate's family on the training partition.
    ///
    /// Families without a registered space come back unchanged.
    pub fn tune(&self, spec: &AlgorithmSpec, selected: &CandidateModel, train: &Dataset) -> Result<TunedModel> {
        let space = match &spec.search_space {
            Some(space) if !space.is_empty() => space,
            _ => {
                info!(algorithm = %spec.id, "No search space registered, keeping selected model");
                return Ok(TunedModel::untuned(selected));
            }
        };

        let start = Instant::now();
        let seed = self.config.random_state;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let combinations = space.sample(self.config.n_iter, &mut rng);
        info!(
            algorithm = %spec.id,
            trials = combinations.len(),
            grid_size = space.n_combinations(),
            "Starting randomized search"
        );

        let splits = CrossValidator::new(self.config.cv_folds)
            .with_random_state(seed)
            .split(train.y())?;

        let trials: Vec<TrialResult> = combinations
            .into_par_iter()
            .enumerate()
            .map(|(trial_id, params)| {
                let trial_start = Instant::now();
                let outcome = cross_val_accuracy(|| spec.build(&params, seed), train.x(), train.y(), &splits);
                let (value, std, error) = match outcome {
                    Ok(cv) => (Some(cv.mean_score), cv.std_score, None),
                    Err(e) => (None, 0.0, Some(e.to_string())),
                };
                TrialResult {
                    trial_id,
                    params,
                    value,
                    std,
                    duration_secs: trial_start.elapsed().as_secs_f64(),
                    error,
                }
            })
            .collect();

        let mut study = Study::default();
        for trial in trials {
            match (&trial.value, &trial.error) {
                (Some(value), _) => debug!(trial = trial.trial_id, params = %trial.params, score = value, "Trial finished"),
                (None, Some(reason)) => warn!(trial = trial.trial_id, params = %trial.params, %reason, "Trial failed"),
                _ => {}
            }
            study.add_trial(trial);
        }
        study.total_duration_secs = start.elapsed().as_secs_f64();

        let best = study
            .best_trial()
            .cloned()
            .ok_or_else(|| VintnerError::TrainingError(format!("every tuning trial for {} failed", spec.id)))?;

        let mut model = spec.build(&best.params, seed)?;
        model.fit(train.x(), train.y())?;

        info!(
            algorithm = %spec.id,
            best_score = best.value.unwrap_or_default(),
            best_params = %best.params,
            elapsed_secs = study.total_duration_secs,
            "Randomized search finished"
        );

        Ok(TunedModel {
            algorithm: spec.id.clone(),
            params: best.params,
            model,
            cv_score: best.value,
            study: Some(study),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic;
    use crate::optimizer::SearchSpace;
    use crate::training::{CandidateTrainer, ModelRegistry, ParamValue};

    fn trial(id: usize, value: Option<f64>) -> TrialResult {
        TrialResult {
            trial_id: id,
            params: Hyperparameters::new().with("k", id as i64),
            value,
            std: 0.0,
            duration_secs: 0.0,
            error: None,
        }
    }

    #[test]
    fn test_ties_keep_lowest_trial() {
        let mut study = Study::default();
        study.add_trial(trial(0, Some(0.5)));
        study.add_trial(trial(1, Some(0.8)));
        study.add_trial(trial(2, None));
        study.add_trial(trial(3, Some(0.8)));
        assert_eq!(study.best_trial_idx, Some(1));
        assert_eq!(study.best_value(), Some(0.8));
    }

    #[test]
    fn test_two_point_grid() {
        let data = synthetic(&[5, 6, 7], 10);
        let space = SearchSpace::new().choice("n_neighbors", [1i64, 3]);
        let registry = ModelRegistry::new().register(ModelRegistry::knn().with_search_space(Some(space)));

        let report = CandidateTrainer::new(3, 42).train_all(&registry, &data, &data);
        let selected = &report.successes[0];
        let spec = registry.get("KNN").unwrap();

        let tuned = HyperparameterTuner::new(TuningConfig::new().with_n_iter(30))
            .tune(spec, selected, &data)
            .unwrap();
        let study = tuned.study.as_ref().unwrap();
        assert_eq!(study.trials.len(), 2);
        assert!(tuned.cv_score.is_some());
        assert!(matches!(tuned.params.get("n_neighbors"), Some(ParamValue::Int(1 | 3))));
        assert_eq!(tuned.model.classes(), &[5, 6, 7]);
    }

    #[test]
    fn test_family_without_space_is_unchanged() {
        let data = synthetic(&[1, 2], 6);
        let registry = ModelRegistry::new().register(ModelRegistry::dummy());
        let report = CandidateTrainer::new(3, 0).train_all(&registry, &data, &data);
        let spec = registry.get("DummyClassifier").unwrap();

        let tuned = HyperparameterTuner::new(TuningConfig::default())
            .tune(spec, &report.successes[0], &data)
            .unwrap();
        assert!(!tuned.was_tuned());
        assert_eq!(tuned.cv_score, None);
        assert_eq!(tuned.algorithm, "DummyClassifier");
    }
}
