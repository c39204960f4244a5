//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Differences from the XGBoost-style learner:
//! - Leaf-wise (best-first) growth bounded by `num_leaves` instead of level-wise
//! - Optional Gradient-based One-Side Sampling (GOSS): keeps the largest
//!   gradients and samples the rest
//!
//! Multi-class softmax objective, one tree per class per round.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::gradient_boosting::softmax_rows;
use super::models::{argmax_labels, check_fit_input, check_n_features, encode_labels, sorted_classes};
use crate::error::{Result, VintnerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    /// `None` leaves depth unbounded
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// GOSS is used when `top_rate + other_rate < 1`
    pub top_rate: f64,
    pub other_rate: f64,
    pub random_state: Option<u64>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            top_rate: 1.0,
            other_rate: 0.0,
            random_state: Some(42),
        }
    }
}

impl LightGBMConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(VintnerError::invalid_parameter("n_estimators", 0, "must be positive"));
        }
        if self.num_leaves < 2 {
            return Err(VintnerError::invalid_parameter("num_leaves", self.num_leaves, "must be at least 2"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(VintnerError::invalid_parameter("learning_rate", self.learning_rate, "must be positive"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(VintnerError::invalid_parameter("subsample", self.subsample, "must be in (0, 1]"));
        }
        Ok(())
    }

    fn uses_goss(&self) -> bool {
        self.top_rate + self.other_rate < 1.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LGBNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<LGBNode>,
        right: Box<LGBNode>,
    },
}

impl LGBNode {
    fn predict(&self, sample: &[f64]) -> f64 {
        match self {
            LGBNode::Leaf { value } => *value,
            LGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [f64]) {
        if let LGBNode::Split { feature, left, right, .. } = self {
            if let Some(c) = counts.get_mut(*feature) {
                *c += 1.0;
            }
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

// ---- Tree building utilities ----

fn compute_leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() };
    -g_adj / (h + lambda)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn make_leaf(gradients: &[f64], hessians: &[f64], indices: &[usize], lambda: f64, alpha: f64) -> LGBNode {
    let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    LGBNode::Leaf {
        value: compute_leaf_weight(g, h, lambda, alpha),
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_indices: Vec<usize>,
    right_indices: Vec<usize>,
}

fn find_best_split_for_feature(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature: usize,
    config: &LightGBMConfig,
) -> Option<SplitCandidate> {
    let mut sorted: Vec<(usize, f64)> = indices.iter().map(|&i| (i, x[[i, feature]])).collect();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let total_g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    let base_score = compute_gain_single(total_g, total_h, config.reg_lambda);

    let mut left_g = 0.0;
    let mut left_h = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;
    let mut best_pos = 0;

    for i in 0..sorted.len().saturating_sub(1) {
        left_g += gradients[sorted[i].0];
        left_h += hessians[sorted[i].0];
        let right_g = total_g - left_g;
        let right_h = total_h - left_h;

        if i + 1 < config.min_child_samples || sorted.len() - i - 1 < config.min_child_samples {
            continue;
        }
        if sorted[i].1 == sorted[i + 1].1 {
            continue;
        }

        let gain = compute_gain_single(left_g, left_h, config.reg_lambda)
            + compute_gain_single(right_g, right_h, config.reg_lambda)
            - base_score;

        if gain > best_gain {
            best_gain = gain;
            best_threshold = (sorted[i].1 + sorted[i + 1].1) / 2.0;
            best_pos = i + 1;
        }
    }

    if best_gain <= 0.0 {
        return None;
    }

    Some(SplitCandidate {
        feature,
        threshold: best_threshold,
        gain: best_gain,
        left_indices: sorted[..best_pos].iter().map(|&(i, _)| i).collect(),
        right_indices: sorted[best_pos..].iter().map(|&(i, _)| i).collect(),
    })
}

fn best_split(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature_indices: &[usize],
    config: &LightGBMConfig,
) -> Option<SplitCandidate> {
    if indices.len() < config.min_child_samples * 2 {
        return None;
    }
    feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, gradients, hessians, indices, f, config))
        .max_by(|a, b| a.gain.partial_cmp(&b.gain).unwrap_or(Ordering::Equal))
}

/// Split waiting in the best-first queue, ordered by gain
struct PendingSplit {
    node_id: usize,
    split: SplitCandidate,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.split.gain == other.split.gain
    }
}

impl Eq for PendingSplit {}

impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.split.gain.partial_cmp(&other.split.gain).unwrap_or(Ordering::Equal)
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Build a tree with the leaf-wise (best-first) strategy
fn build_lgb_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    config: &LightGBMConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> LGBNode {
    let n_features = x.ncols();
    let n_selected = ((n_features as f64 * config.colsample_bytree).ceil() as usize).clamp(1, n_features.max(1));
    let mut feature_indices: Vec<usize> = (0..n_features).collect();
    feature_indices.shuffle(rng);
    feature_indices.truncate(n_selected);

    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();
    let max_depth = config.max_depth.unwrap_or(usize::MAX);

    if max_depth > 0 {
        if let Some(split) = best_split(x, gradients, hessians, indices, &feature_indices, config) {
            heap.push(PendingSplit { node_id: 0, split });
        }
    }

    let mut n_leaves = 1usize;
    while n_leaves < config.num_leaves {
        let Some(PendingSplit { node_id, split }) = heap.pop() else {
            break;
        };

        let depth = depths[node_id] + 1;
        let left_id = nodes.len();
        let right_id = left_id + 1;
        nodes[node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        n_leaves += 1;

        for (child_id, child_indices) in [(left_id, split.left_indices), (right_id, split.right_indices)] {
            if depth < max_depth {
                if let Some(next) = best_split(x, gradients, hessians, &child_indices, &feature_indices, config) {
                    heap.push(PendingSplit {
                        node_id: child_id,
                        split: next,
                    });
                }
            }
            nodes.push(NodeSlot::Leaf(child_indices));
            depths.push(depth);
        }
    }

    to_node(&nodes, 0, gradients, hessians, config)
}

fn to_node(nodes: &[NodeSlot], idx: usize, g: &[f64], h: &[f64], config: &LightGBMConfig) -> LGBNode {
    match &nodes[idx] {
        NodeSlot::Leaf(indices) => make_leaf(g, h, indices, config.reg_lambda, config.reg_alpha),
        NodeSlot::Split {
            feature,
            threshold,
            left,
            right,
        } => LGBNode::Split {
            feature: *feature,
            threshold: *threshold,
            left: Box::new(to_node(nodes, *left, g, h, config)),
            right: Box::new(to_node(nodes, *right, g, h, config)),
        },
    }
}

fn goss_sample(
    gradients: &[f64],
    n: usize,
    top_rate: f64,
    other_rate: f64,
    rng: &mut Xoshiro256PlusPlus,
) -> Vec<usize> {
    let n_top = ((n as f64 * top_rate).ceil() as usize).min(n);
    let n_other = (n as f64 * other_rate).ceil() as usize;
    let mut sorted: Vec<usize> = (0..n).collect();
    sorted.sort_by(|&a, &b| {
        gradients[b]
            .abs()
            .partial_cmp(&gradients[a].abs())
            .unwrap_or(Ordering::Equal)
    });
    let mut selected: Vec<usize> = sorted[..n_top].to_vec();
    let mut remaining: Vec<usize> = sorted[n_top..].to_vec();
    remaining.shuffle(rng);
    selected.extend(remaining.into_iter().take(n_other));
    selected
}

/// LightGBM Classifier (softmax loss, leaf-wise trees)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    config: LightGBMConfig,
    /// One tree per class per round
    trees: Vec<Vec<LGBNode>>,
    base_scores: Vec<f64>,
    classes: Vec<i64>,
    n_features: usize,
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_scores: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &LightGBMConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.config.validate()?;

        let n = x.nrows();
        self.classes = sorted_classes(y);
        self.n_features = x.ncols();
        let n_classes = self.classes.len();
        let encoded = encode_labels(y, &self.classes)?;

        let mut counts = vec![0usize; n_classes];
        for &c in &encoded {
            counts[c] += 1;
        }
        self.base_scores = counts
            .iter()
            .map(|&c| (c as f64 / n as f64).max(1e-12).ln())
            .collect();
        let mut raw = Array2::from_shape_fn((n, n_classes), |(_, k)| self.base_scores[k]);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            let probs = softmax_rows(&raw);
            let mut round = Vec::with_capacity(n_classes);

            for k in 0..n_classes {
                let gradients: Vec<f64> = (0..n)
                    .map(|i| probs[[i, k]] - if encoded[i] == k { 1.0 } else { 0.0 })
                    .collect();
                let hessians: Vec<f64> = (0..n)
                    .map(|i| (probs[[i, k]] * (1.0 - probs[[i, k]])).max(1e-7))
                    .collect();

                let indices = if self.config.uses_goss() {
                    goss_sample(&gradients, n, self.config.top_rate, self.config.other_rate, &mut rng)
                } else if self.config.subsample < 1.0 {
                    let size = ((n as f64 * self.config.subsample).ceil() as usize).max(1);
                    let mut idx: Vec<usize> = (0..n).collect();
                    idx.shuffle(&mut rng);
                    idx.truncate(size);
                    idx
                } else {
                    (0..n).collect()
                };

                let tree = build_lgb_tree(x, &gradients, &hessians, &indices, &self.config, &mut rng);
                for (i, row) in rows.iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(row);
                }
                round.push(tree);
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

        let mut raw = Array2::from_shape_fn((x.nrows(), self.classes.len()), |(_, k)| self.base_scores[k]);
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
