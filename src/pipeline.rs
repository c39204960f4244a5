//! End-to-end training run
//!
//! Load → split → scale → train candidates → select → tune → evaluate → save.
//! The test partition is read once, after tuning.

use chrono::Utc;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::data::{feature_names, Dataset, StratifiedSplitter};
use crate::error::Result;
use crate::evaluation::{evaluate, ClassMetrics, ClassificationReport, ModelEvaluation};
use crate::export::{ArtifactPaths, ArtifactStore, NumericValue};
use crate::optimizer::{HyperparameterTuner, TunedModel, TuningConfig};
use crate::preprocessing::Scaler;
use crate::training::{
    accuracy, select_best, CandidateMetrics, CandidateTrainer, Hyperparameters, ModelRegistry, TrainingConfig,
};
use crate::utils::{configure_thread_pool, Timer, WineDataLoader};

/// Scores of one candidate as reported after a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub algorithm: String,
    pub metrics: CandidateMetrics,
}

/// What a training run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub model_type: String,
    pub params: Hyperparameters,
    pub validation_accuracy: f64,
    pub train_accuracy: f64,
    pub cv_score: Option<f64>,
    pub evaluation: ModelEvaluation,
    /// Successful candidates in registration order
    pub candidates: Vec<CandidateSummary>,
    /// One message per failed candidate
    pub failures: Vec<String>,
    pub skipped: Vec<String>,
    pub split_sizes: [usize; 3],
    pub classes: Vec<i64>,
    pub total_time_secs: f64,
}

/// Orchestrates a full training run
pub struct TrainingPipeline {
    config: TrainingConfig,
    registry: ModelRegistry,
    loader: WineDataLoader,
}

impl TrainingPipeline {
    /// Pipeline over the standard registry
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            registry: ModelRegistry::standard(),
            loader: WineDataLoader::new(),
        }
    }

    /// Replace the algorithm registry
    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Load the tables from `data_dir` and run
    pub fn run(&self) -> Result<(TrainingSummary, ArtifactPaths)> {
        self.config.validate()?;
        let dataset = self.loader.load_dir(&self.config.data_dir)?;
        self.run_on(&dataset)
    }

    /// Run on an already loaded dataset
    pub fn run_on(&self, dataset: &Dataset) -> Result<(TrainingSummary, ArtifactPaths)> {
        self.config.validate()?;
        configure_thread_pool(self.config.n_jobs);
        let timer = Timer::start();

        let split = StratifiedSplitter::from_config(&self.config).split(dataset)?;
        info!(
            train = split.train().n_samples(),
            validation = split.validation().n_samples(),
            test = split.test().n_samples(),
            "Data split"
        );

        let scaler = Scaler::fit(split.train().x())?;
        let train = scale(&scaler, split.train())?;
        let validation = scale(&scaler, split.validation())?;
        let test = scale(&scaler, split.test())?;

        let trainer = CandidateTrainer::new(self.config.cv_folds, self.config.random_state);
        let report = trainer.train_all(&self.registry, &train, &validation);
        for failure in &report.failures {
            warn!(error = %failure, "Candidate excluded");
        }

        let selected = select_best(&report.successes)?;
        info!(
            algorithm = %selected.algorithm,
            validation_accuracy = selected.metrics.validation_accuracy,
            "Best candidate selected"
        );

        let spec = self.registry.require(&selected.algorithm)?;
        let tuned = if self.config.skip_tuning {
            info!("Tuning skipped");
            TunedModel::untuned(selected)
        } else {
            HyperparameterTuner::new(TuningConfig::from_training(&self.config)).tune(spec, selected, &train)?
        };

        let train_accuracy = accuracy(train.y(), &tuned.model.predict(train.x())?);
        let evaluation = evaluate(&tuned.model, &test)?;

        let classes = dataset.classes();
        let metadata = build_metadata(&MetadataInputs {
            tuned: &tuned,
            evaluation: &evaluation,
            validation_accuracy: selected.metrics.validation_accuracy,
            train_accuracy,
            training_size: train.n_samples(),
            classes: &classes,
            data_shape: dataset.table_shape(),
        });

        let store = ArtifactStore::new(&self.config.models_dir);
        let paths = store.save(&tuned.model, &scaler, &metadata)?;

        let summary = TrainingSummary {
            model_type: tuned.model.model_type().to_string(),
            params: tuned.params.clone(),
            validation_accuracy: selected.metrics.validation_accuracy,
            train_accuracy,
            cv_score: tuned.cv_score,
            candidates: report
                .successes
                .iter()
                .map(|c| CandidateSummary {
                    algorithm: c.algorithm.clone(),
                    metrics: c.metrics,
                })
                .collect(),
            failures: report.failures.iter().map(ToString::to_string).collect(),
            skipped: report.skipped.clone(),
            split_sizes: [train.n_samples(), validation.n_samples(), test.n_samples()],
            classes,
            evaluation,
            total_time_secs: timer.elapsed_secs(),
        };

        info!(
            model_type = %summary.model_type,
            test_accuracy = summary.evaluation.accuracy,
            elapsed_secs = summary.total_time_secs,
            "Training run complete"
        );
        Ok((summary, paths))
    }
}

fn scale(scaler: &Scaler, partition: &Dataset) -> Result<Dataset> {
    Dataset::new(scaler.transform(partition.x())?, partition.y().clone())
}

struct MetadataInputs<'a> {
    tuned: &'a TunedModel,
    evaluation: &'a ModelEvaluation,
    validation_accuracy: f64,
    train_accuracy: f64,
    training_size: usize,
    classes: &'a [i64],
    data_shape: (usize, usize),
}

fn build_metadata(inputs: &MetadataInputs<'_>) -> NumericValue {
    let model = &inputs.tuned.model;
    let names = feature_names();

    let mut meta = NumericValue::mapping();
    meta.insert("model_type", model.model_type());
    meta.insert("test_accuracy", inputs.evaluation.accuracy);
    meta.insert("roc_auc", inputs.evaluation.roc_auc);
    meta.insert("validation_accuracy", inputs.validation_accuracy);
    meta.insert("train_accuracy", inputs.train_accuracy);
    meta.insert("cv_score", inputs.tuned.cv_score);
    meta.insert("features_count", names.len());
    meta.insert("feature_names", names.clone());
    meta.insert("classes", inputs.classes.to_vec());
    meta.insert("training_size", inputs.training_size);
    meta.insert("training_date", Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string());
    meta.insert(
        "data_shape",
        NumericValue::Tuple(vec![inputs.data_shape.0.into(), inputs.data_shape.1.into()]),
    );
    meta.insert("best_params", &inputs.tuned.params);
    meta.insert("classification_report", report_tree(&inputs.evaluation.report));

    if model.capabilities().feature_importances {
        if let Some(importances) = model.feature_importances() {
            meta.insert("feature_importance", importance_tree(&names, &importances));
        }
    }
    meta
}

fn importance_tree(names: &[String], importances: &Array1<f64>) -> NumericValue {
    let map: BTreeMap<String, NumericValue> = names
        .iter()
        .zip(importances.iter())
        .map(|(name, &v)| (name.clone(), NumericValue::Float64(v)))
        .collect();
    NumericValue::Mapping(map)
}

fn metrics_tree(m: &ClassMetrics) -> NumericValue {
    let mut node = NumericValue::mapping();
    node.insert("precision", m.precision);
    node.insert("recall", m.recall);
    node.insert("f1-score", m.f1_score);
    node.insert("support", m.support);
    node
}

fn report_tree(report: &ClassificationReport) -> NumericValue {
    let mut node = NumericValue::mapping();
    for (label, metrics) in &report.classes {
        node.insert(label.to_string(), metrics_tree(metrics));
    }
    node.insert("accuracy", report.accuracy);
    node.insert("macro avg", metrics_tree(&report.macro_avg));
    node.insert("weighted avg", metrics_tree(&report.weighted_avg));
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic;
    use crate::error::VintnerError;
    use crate::export::{normalize, ModelMetadata};
    use crate::training::{DecisionTree, TrainedModel};
    use tempfile::tempdir;

    fn small_registry() -> ModelRegistry {
        ModelRegistry::new()
            .register(ModelRegistry::dummy())
            .register(ModelRegistry::decision_tree())
            .register(ModelRegistry::knn())
    }

    #[test]
    fn test_run_on_synthetic() {
        let dir = tempdir().unwrap();
        let config = TrainingConfig::default().with_models_dir(dir.path()).with_n_iter(4);
        let pipeline = TrainingPipeline::new(config).with_registry(small_registry());

        let data = synthetic(&[4, 6, 8], 10);
        let (summary, paths) = pipeline.run_on(&data).unwrap();

        assert_eq!(summary.classes, vec![4, 6, 8]);
        assert_eq!(summary.candidates.len(), 3);
        assert_eq!(summary.split_sizes.iter().sum::<usize>(), 30);
        assert!(paths.metadata.is_file());

        let meta = ArtifactStore::new(dir.path()).load_metadata().unwrap();
        assert_eq!(meta.model_type, summary.model_type);
        assert_eq!(meta.data_shape, vec![30, 13]);
        assert!(meta.classification_report.is_some());
    }

    #[test]
    fn test_single_class_test_partition_saves_nothing() {
        // 98 rows of quality 5 and 2 of quality 6: both 6s land outside the test partition
        let data = synthetic(&[5], 98).concat(&synthetic(&[6], 2)).unwrap();
        let config = TrainingConfig::default();
        let split = StratifiedSplitter::from_config(&config).split(&data).unwrap();
        assert_eq!(split.test().classes(), vec![5]);

        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new()
            .register(ModelRegistry::dummy())
            .register(ModelRegistry::decision_tree());
        let pipeline = TrainingPipeline::new(config.with_models_dir(dir.path()).with_skip_tuning(true))
            .with_registry(registry);

        let result = pipeline.run_on(&data);
        assert!(matches!(result, Err(VintnerError::UnsupportedMetric(_))));
        assert!(!ArtifactStore::new(dir.path()).exists());
    }

    #[test]
    fn test_scaler_ignores_held_out_rows() {
        let data = synthetic(&[4, 6, 8], 10);
        let config = TrainingConfig::default().with_skip_tuning(true);
        let split = StratifiedSplitter::from_config(&config).split(&data).unwrap();

        // Same labels, so the same split; only held-out feature values differ
        let mut x = data.x().clone();
        for &i in split.validation_indices().iter().chain(split.test_indices()) {
            x.row_mut(i).mapv_inplace(|v| v * 10.0 + 100.0);
        }
        let shifted = Dataset::new(x, data.y().clone()).unwrap();

        let registry = || ModelRegistry::new().register(ModelRegistry::decision_tree());
        let mut scalers = Vec::new();
        for dataset in [&data, &shifted] {
            let dir = tempdir().unwrap();
            TrainingPipeline::new(config.clone().with_models_dir(dir.path()))
                .with_registry(registry())
                .run_on(dataset)
                .unwrap();
            scalers.push(ArtifactStore::new(dir.path()).load().unwrap().scaler);
        }

        let expected = Scaler::fit(split.train().x()).unwrap();
        assert_eq!(scalers[0].mean(), expected.mean());
        assert_eq!(scalers[0].scale(), expected.scale());
        assert_eq!(scalers[1].mean(), scalers[0].mean());
        assert_eq!(scalers[1].scale(), scalers[0].scale());
    }

    #[test]
    fn test_metadata_tree_parses() {
        let data = synthetic(&[4, 6], 6);
        let mut model = TrainedModel::DecisionTree(DecisionTree::new_classifier());
        model.fit(data.x(), data.y()).unwrap();
        let evaluation = evaluate(&model, &data).unwrap();
        let tuned = TunedModel {
            algorithm: "DecisionTree".to_string(),
            params: Hyperparameters::new(),
            model,
            cv_score: None,
            study: None,
        };

        let tree = build_metadata(&MetadataInputs {
            tuned: &tuned,
            evaluation: &evaluation,
            validation_accuracy: 0.9,
            train_accuracy: 1.0,
            training_size: 12,
            classes: &[4, 6],
            data_shape: (12, 13),
        });
        let meta = ModelMetadata::from_json(normalize(&tree)).unwrap();
        assert_eq!(meta.feature_names, feature_names());
        assert_eq!(meta.features_count, 12);
        assert_eq!(meta.feature_importance.map(|m| m.len()), Some(12));
        assert_eq!(meta.cv_score, None);
    }
}
