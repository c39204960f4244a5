//! XGBoost-style gradient boosting with second-order approximation
//!
//! Multi-class softmax objective: each round grows one tree per class from
//! the gradient `p - y` and hessian `p * (1 - p)` of the log loss.
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)]
//! - Minimum child weight constraint, row and column subsampling per round

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::gradient_boosting::softmax_rows;
use super::models::{argmax_labels, check_fit_input, check_n_features, encode_labels, sorted_classes};
use crate::error::{Result, VintnerError};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl XGBoostConfig {
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
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(VintnerError::invalid_parameter(
                "colsample_bytree",
                self.colsample_bytree,
                "must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: &[f64]) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [f64]) {
        if let XGBNode::Split { feature, left, right, .. } = self {
            if let Some(c) = counts.get_mut(*feature) {
                *c += 1.0;
            }
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

/// Gradient statistics shared by every node of one tree
struct GradStats<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    stats: &GradStats<'_>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let g_sum: f64 = indices.iter().map(|&i| stats.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| stats.hess[i]).sum();
    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(stats, indices, f, config))
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| stats.x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(stats, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(stats, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

/// Best (feature, threshold, gain) for one feature using the exact greedy method
fn find_best_split_for_feature(
    stats: &GradStats<'_>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let x = stats.x;
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| stats.grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| stats.hess[i]).sum();
    let lambda = config.reg_lambda;

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    // The last position would leave the right child empty
    for pos in 0..sorted_indices.len().saturating_sub(1) {
        let idx = sorted_indices[pos];
        let next_idx = sorted_indices[pos + 1];
        g_left += stats.grad[idx];
        h_left += stats.hess[idx];

        if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |(_, g)| gain > g) {
            let threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
            best = Some((threshold, gain));
        }
    }

    best.map(|(threshold, gain)| (feature, threshold, gain))
}

/// XGBoost Classifier (softmax loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    /// One tree per class per round
    trees: Vec<Vec<XGBNode>>,
    base_scores: Vec<f64>,
    classes: Vec<i64>,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_scores: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

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
        self.base_scores = counts
            .iter()
            .map(|&c| (c as f64 / n_samples as f64).max(1e-12).ln())
            .collect();
        let mut raw = Array2::from_shape_fn((n_samples, n_classes), |(_, k)| self.base_scores[k]);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            let probs = softmax_rows(&raw);
            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let round: Vec<XGBNode> = (0..n_classes)
                .into_par_iter()
                .map(|k| {
                    let grad: Vec<f64> = (0..n_samples)
                        .map(|i| probs[[i, k]] - if encoded[i] == k { 1.0 } else { 0.0 })
                        .collect();
                    let hess: Vec<f64> = (0..n_samples)
                        .map(|i| (probs[[i, k]] * (1.0 - probs[[i, k]])).max(1e-7))
                        .collect();
                    let stats = GradStats { x, grad: &grad, hess: &hess };
                    build_xgb_tree(&stats, &row_indices, &col_indices, 0, &self.config)
                })
                .collect();

            for (k, tree) in round.iter().enumerate() {
                for (i, row) in rows.iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(row);
                }
            }
            self.trees.push(round);
        }

        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(argmax_labels(&probs, &self.classes))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(VintnerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let n_classes = self.classes.len();
        let mut raw = Array2::from_shape_fn((x.nrows(), n_classes), |(_, k)| self.base_scores[k]);
        for (i, row) in x.rows().into_iter().enumerate() {
            let sample = row.to_vec();
            for round in &self.trees {
                for (k, tree) in round.iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(&sample);
                }
            }
        }
        Ok(softmax_rows(&raw))
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Split-count importances across all trees, normalized to sum to 1
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in self.trees.iter().flatten() {
            tree.count_splits(&mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(Array1::from_vec(counts))
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil().max(1.0) as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((60, 2), (0..120).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| {
                let s = r[0] + r[1];
                if s < 4.0 {
                    5.0
                } else if s < 8.0 {
                    6.0
                } else {
                    7.0
                }
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_classifier() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 30,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert_eq!(model.classes(), &[5, 6, 7]);

        let preds = model.predict(&x).unwrap();
        let acc = crate::training::accuracy(&y, &preds);
        assert!(acc >= 0.9, "XGBoost classifier accuracy = {}", acc);
    }

    #[test]
    fn test_xgboost_predict_proba() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 10,
            subsample: 0.8,
            colsample_bytree: 0.5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (60, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_xgboost_regularization() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 10,
            reg_lambda: 10.0,
            reg_alpha: 1.0,
            gamma: 1.0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap().len(), 60);

        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
    }

    #[test]
    fn test_leaf_weight_soft_threshold() {
        assert_eq!(compute_leaf_weight(0.5, 2.0, 1.0, 1.0), 0.0);
        assert!((compute_leaf_weight(3.0, 1.0, 1.0, 1.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_and_invalid() {
        let (x, y) = classification_data();
        let model = XGBoostClassifier::new(XGBoostConfig::default());
        assert!(matches!(model.predict_proba(&x), Err(VintnerError::ModelNotFitted)));

        let mut bad = XGBoostClassifier::new(XGBoostConfig {
            colsample_bytree: 0.0,
            ..Default::default()
        });
        assert!(matches!(bad.fit(&x, &y), Err(VintnerError::InvalidParameter { .. })));
    }
}
