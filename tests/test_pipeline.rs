//! Integration test: load tables → select → tune → evaluate → save

use std::io::Write;
use std::path::Path;
use vintner::data::{feature_names, FEATURE_NAMES};
use vintner::export::ArtifactStore;
use vintner::optimizer::SearchSpace;
use vintner::pipeline::TrainingPipeline;
use vintner::training::{ModelRegistry, TrainingConfig};
use vintner::utils::{RED_FILE, WHITE_FILE};

const HEADER: &str = "\"fixed acidity\";\"volatile acidity\";\"citric acid\";\"residual sugar\";\"chlorides\";\"free sulfur dioxide\";\"total sulfur dioxide\";\"density\";\"pH\";\"sulphates\";\"alcohol\";\"quality\"";

/// Ten rows per file, quality 5/6/7 separated by alcohol and volatile acidity
fn write_tables(dir: &Path) {
    let labels = [5, 6, 7, 5, 6, 7, 5, 6, 7, 5, 6, 7, 5, 6, 7, 5, 6, 7, 5, 6];
    for (file_idx, name) in [RED_FILE, WHITE_FILE].iter().enumerate() {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for i in 0..10 {
            let row = file_idx * 10 + i;
            let quality = labels[row];
            let level = (quality - 5) as f64;
            let wobble = (row as f64 * 0.7).sin() * 0.05;
            writeln!(
                file,
                "{:.2};{:.3};0.3;{:.1};0.05;{};{};0.996;3.3;0.6;{:.2};{}",
                7.0 + wobble,
                0.7 - 0.2 * level + wobble * 0.1,
                2.0 + i as f64 * 0.1,
                15 + i,
                40 + 2 * i,
                9.0 + 1.5 * level + wobble,
                quality
            )
            .unwrap();
        }
    }
}

fn two_point_registry() -> ModelRegistry {
    let grid = SearchSpace::new().choice("n_neighbors", [3i64, 5]);
    ModelRegistry::new()
        .register(ModelRegistry::dummy())
        .register(ModelRegistry::decision_tree())
        .register(ModelRegistry::knn().with_search_space(Some(grid)))
}

#[test]
fn test_end_to_end_artifact() {
    let data_dir = tempfile::tempdir().unwrap();
    let models_dir = tempfile::tempdir().unwrap();
    write_tables(data_dir.path());

    let config = TrainingConfig::default()
        .with_data_dir(data_dir.path())
        .with_models_dir(models_dir.path());
    let (summary, paths) = TrainingPipeline::new(config)
        .with_registry(two_point_registry())
        .run()
        .unwrap();

    assert_eq!(summary.split_sizes.iter().sum::<usize>(), 20);
    assert_eq!(summary.candidates.len(), 3);
    assert!(summary.failures.is_empty());
    assert!(paths.model.is_file() && paths.scaler.is_file() && paths.metadata.is_file());

    let meta = ArtifactStore::new(models_dir.path()).load_metadata().unwrap();
    assert_eq!(meta.classes, vec![5, 6, 7]);
    assert_eq!(meta.feature_names, feature_names());
    assert_eq!(meta.feature_names[11], FEATURE_NAMES[11]);
    assert_eq!(meta.features_count, 12);
    assert_eq!(meta.data_shape, vec![20, 13]);
    assert_eq!(meta.training_size, summary.split_sizes[0]);
    assert_eq!(meta.version.as_deref(), Some("1.0.0"));
}

#[test]
fn test_same_seed_same_choice() {
    let data_dir = tempfile::tempdir().unwrap();
    write_tables(data_dir.path());

    let run = || {
        let models_dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig::default()
            .with_data_dir(data_dir.path())
            .with_models_dir(models_dir.path())
            .with_random_state(7);
        let (summary, _) = TrainingPipeline::new(config)
            .with_registry(two_point_registry())
            .run()
            .unwrap();
        (summary.model_type, summary.params.to_string(), summary.evaluation.accuracy)
    };

    assert_eq!(run(), run());
}

#[test]
fn test_missing_tables_fail() {
    let data_dir = tempfile::tempdir().unwrap();
    let models_dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig::default()
        .with_data_dir(data_dir.path())
        .with_models_dir(models_dir.path());

    let err = TrainingPipeline::new(config).run().unwrap_err();
    assert!(err.to_string().contains(RED_FILE));
    assert!(!ArtifactStore::new(models_dir.path()).exists());
}
