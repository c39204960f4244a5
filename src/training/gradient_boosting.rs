//! Gradient Boosting classifier
//!
//! Multi-class softmax boosting: each round fits one regression tree per
//! class on the negative gradient of the log loss.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{argmax_labels, check_fit_input, check_n_features, encode_labels, sorted_classes};
use crate::error::{VintnerError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each round
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(VintnerError::invalid_parameter("n_estimators", 0, "must be positive"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(VintnerError::invalid_parameter("learning_rate", self.learning_rate, "must be positive"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(VintnerError::invalid_parameter("subsample", self.subsample, "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    /// One tree per class per round
    trees: Vec<Vec<DecisionTree>>,
    initial_scores: Vec<f64>,
    classes: Vec<i64>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_scores: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit the boosted ensemble
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.classes = sorted_classes(y);
        self.n_features = n_features;
        let n_classes = self.classes.len();
        let encoded = encode_labels(y, &self.classes)?;

        // Log class priors
        let mut counts = vec![0usize; n_classes];
        for &c in &encoded {
            counts[c] += 1;
        }
        self.initial_scores = counts
            .iter()
            .map(|&c| (c as f64 / n_samples as f64).max(1e-12).ln())
            .collect();

        let mut scores = Array2::from_shape_fn((n_samples, n_classes), |(_, k)| self.initial_scores[k]);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let probs = softmax_rows(&scores);
            let sample_indices = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &sample_indices);
            let tree_seed: u64 = rng.gen();

            let round: Vec<DecisionTree> = (0..n_classes)
                .into_par_iter()
                .map(|k| {
                    let residuals: Array1<f64> = sample_indices
                        .iter()
                        .map(|&i| {
                            let target = if encoded[i] == k { 1.0 } else { 0.0 };
                            target - probs[[i, k]]
                        })
                        .collect();
                    let mut tree = DecisionTree::new_regressor()
                        .with_max_depth(self.config.max_depth)
                        .with_min_samples_leaf(self.config.min_samples_leaf)
                        .with_random_state(tree_seed.wrapping_add(k as u64));
                    tree.fit(&x_sub, &residuals)?;
                    Ok(tree)
                })
                .collect::<Result<Vec<_>>>()?;

            for (k, tree) in round.iter().enumerate() {
                let update = tree.predict(x)?;
                scores
                    .column_mut(k)
                    .scaled_add(self.config.learning_rate, &update);
                if let Some(imp) = tree.feature_importances() {
                    for (acc, &v) in self.feature_importances.iter_mut().zip(imp.iter()) {
                        *acc += v;
                    }
                }
            }
            self.trees.push(round);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(argmax_labels(&probs, &self.classes))
    }

    /// Predict class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(VintnerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let n_classes = self.classes.len();
        let mut scores = Array2::from_shape_fn((x.nrows(), n_classes), |(_, k)| self.initial_scores[k]);
        for round in &self.trees {
            for (k, tree) in round.iter().enumerate() {
                let update = tree.predict(x)?;
                scores
                    .column_mut(k)
                    .scaled_add(self.config.learning_rate, &update);
            }
        }
        Ok(softmax_rows(&scores))
    }

    /// Classes seen at fit time
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.config.subsample >= 1.0 {
            return indices;
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}

/// Row-wise softmax with max subtraction
pub(crate) fn softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
    let mut out = scores.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    out
}
