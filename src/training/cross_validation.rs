//! Stratified k-fold cross-validation

use crate::error::{Result, VintnerError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::models::{accuracy, TrainedModel};

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified k-fold splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a shuffling stratified splitter
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate train/test splits that keep class proportions in every fold
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        if self.n_splits < 2 {
            return Err(VintnerError::ValidationError("n_splits must be at least 2".to_string()));
        }
        if n_samples < self.n_splits {
            return Err(VintnerError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, self.n_splits
            )));
        }

        // Group samples by class, ascending label order
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if self.shuffle {
            let mut rng = match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Round-robin over folds, continuing across classes so fold sizes stay balanced
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % self.n_splits].push(idx);
                next += 1;
            }
        }

        let splits = (0..self.n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: 0.0,
                std_score: 0.0,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// Accuracy of a freshly built model on every fold
pub fn cross_val_accuracy<F>(build: F, x: &Array2<f64>, y: &Array1<f64>, splits: &[CVSplit]) -> Result<CVResults>
where
    F: Fn() -> Result<TrainedModel>,
{
    let scores = splits
        .iter()
        .map(|split| {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut model = build()?;
            model.fit(&x_train, &y_train)?;
            let y_pred = model.predict(&x_test)?;
            Ok(accuracy(&y_test, &y_pred))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::DummyClassifier;

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, // 5 samples of class 0
            1.0, 1.0, 1.0, 1.0, 1.0, // 5 samples of class 1
        ]);

        let cv = CrossValidator::new(5).with_shuffle(false);
        let splits = cv.split(&y).unwrap();

        assert_eq!(splits.len(), 5);

        // Each fold should have 1 sample from each class
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let ones = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(ones, 1);
        }
    }

    #[test]
    fn test_folds_partition_indices() {
        let y = Array1::from_iter((0..14).map(|i| (i % 3) as f64 + 5.0));
        let splits = CrossValidator::new(3).with_random_state(42).split(&y).unwrap();

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..14).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 14);
            for &idx in &split.test_indices {
                assert!(!split.train_indices.contains(&idx));
            }
        }
    }

    #[test]
    fn test_seeded_folds_are_deterministic() {
        let y = Array1::from_iter((0..30).map(|i| (i % 2) as f64));
        let a = CrossValidator::new(3).with_random_state(7).split(&y).unwrap();
        let b = CrossValidator::new(3).with_random_state(7).split(&y).unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_rejects_too_few_samples() {
        let y = Array1::from_vec(vec![0.0, 1.0]);
        assert!(CrossValidator::new(3).split(&y).is_err());
        assert!(CrossValidator::new(1).split(&y).is_err());
    }

    #[test]
    fn test_cross_val_accuracy() {
        let x = Array2::zeros((9, 1));
        let y = Array1::from_vec(vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        let splits = CrossValidator::new(3).with_random_state(0).split(&y).unwrap();
        let results = cross_val_accuracy(|| Ok(TrainedModel::Dummy(DummyClassifier::new())), &x, &y, &splits).unwrap();
        assert_eq!(results.n_folds, 3);
        assert!((results.mean_score - 2.0 / 3.0).abs() < 1e-12);
    }
}
