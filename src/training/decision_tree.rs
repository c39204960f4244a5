//! Decision tree implementation (CART)

use crate::error::{VintnerError, Result};
use super::models::{argmax_labels, check_fit_input, encode_labels, sorted_classes};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node: class distribution (classification) or `[mean]` (regression)
    Leaf {
        value: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at each node (all when None)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for per-node feature sampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Is classification task
    is_classification: bool,
    /// Classes (for classification), ascending
    classes: Vec<i64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

/// Best split candidate found on one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Per-fit state shared by the recursive builder
struct BuildContext<'a> {
    x: &'a Array2<f64>,
    targets: Targets<'a>,
    n_classes: usize,
    rng: ChaCha8Rng,
    importances: Vec<f64>,
}

enum Targets<'a> {
    Classes(&'a [usize]),
    Values(&'a Array1<f64>),
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set optional maximum depth
    pub fn with_max_depth_opt(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set the number of features sampled per node
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state for feature sampling
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if self.is_classification {
            let classes = sorted_classes(y);
            self.fit_with_classes(x, y, &classes)
        } else {
            check_fit_input(x, y)?;
            self.n_features = x.ncols();
            self.classes.clear();
            let ctx = BuildContext {
                x,
                targets: Targets::Values(y),
                n_classes: 0,
                rng: self.make_rng(),
                importances: vec![0.0; x.ncols()],
            };
            self.build(ctx, x.nrows());
            Ok(self)
        }
    }

    /// Fit a classifier against an explicit class list.
    ///
    /// Bootstrap samples may miss some classes; probability columns still
    /// follow `classes`.
    pub fn fit_with_classes(&mut self, x: &Array2<f64>, y: &Array1<f64>, classes: &[i64]) -> Result<&mut Self> {
        if !self.is_classification {
            return Err(VintnerError::InvalidInput(
                "fit_with_classes requires a classifier tree".to_string(),
            ));
        }
        check_fit_input(x, y)?;
        let encoded = encode_labels(y, classes)?;

        self.n_features = x.ncols();
        self.classes = classes.to_vec();
        let ctx = BuildContext {
            x,
            targets: Targets::Classes(&encoded),
            n_classes: classes.len(),
            rng: self.make_rng(),
            importances: vec![0.0; x.ncols()],
        };
        self.build(ctx, x.nrows());
        Ok(self)
    }

    fn make_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0))
    }

    fn build(&mut self, mut ctx: BuildContext<'_>, n_samples: usize) {
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(&mut ctx, &indices, 0);
        self.root = Some(root);

        let mut importances = ctx.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
    }

    fn build_tree(&self, ctx: &mut BuildContext<'_>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let impurity = self.node_impurity(ctx, indices);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.make_leaf(ctx, indices);
        }

        let features = self.features_to_try(ctx);
        let best = match self.find_best_split(ctx, indices, &features, impurity) {
            Some(best) => best,
            None => return self.make_leaf(ctx, indices),
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, best.feature_idx]] <= best.threshold);

        ctx.importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(ctx, &left_indices, depth + 1));
        let right = Box::new(self.build_tree(ctx, &right_indices, depth + 1));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn features_to_try(&self, ctx: &mut BuildContext<'_>) -> Vec<usize> {
        let n_features = ctx.x.ncols();
        match self.max_features {
            Some(k) if k < n_features => {
                let mut chosen = rand::seq::index::sample(&mut ctx.rng, n_features, k).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        ctx: &BuildContext<'_>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        // Each feature scans its sorted values independently
        let results: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| self.best_split_on_feature(ctx, indices, feature_idx, parent_impurity))
            .collect();

        // Sequential reduce keeps ties on the lowest feature index
        let mut best: Option<SplitCandidate> = None;
        for candidate in results.into_iter().flatten() {
            if best.map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }
        best
    }

    fn best_split_on_feature(
        &self,
        ctx: &BuildContext<'_>,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<(f64, usize)> = indices.iter().map(|&i| (ctx.x[[i, feature_idx]], i)).collect();
        order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let n = order.len();
        let n_f = n as f64;
        let min_leaf = self.min_samples_leaf;
        let mut best_gain = 0.0f64;
        let mut best_threshold = None;

        match ctx.targets {
            Targets::Classes(encoded) => {
                let mut left = vec![0usize; ctx.n_classes];
                let mut right = vec![0usize; ctx.n_classes];
                for &(_, i) in &order {
                    right[encoded[i]] += 1;
                }
                for pos in 0..n - 1 {
                    let c = encoded[order[pos].1];
                    left[c] += 1;
                    right[c] -= 1;

                    let n_left = pos + 1;
                    let n_right = n - n_left;
                    if order[pos].0 == order[pos + 1].0 || n_left < min_leaf || n_right < min_leaf {
                        continue;
                    }
                    let weighted = (n_left as f64 * self.class_impurity(&left, n_left)
                        + n_right as f64 * self.class_impurity(&right, n_right))
                        / n_f;
                    let gain = parent_impurity - weighted;
                    if gain > best_gain {
                        best_gain = gain;
                        best_threshold = Some((order[pos].0 + order[pos + 1].0) / 2.0);
                    }
                }
            }
            Targets::Values(y) => {
                let total_sum: f64 = order.iter().map(|&(_, i)| y[i]).sum();
                let total_sq: f64 = order.iter().map(|&(_, i)| y[i] * y[i]).sum();
                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                for pos in 0..n - 1 {
                    let yi = y[order[pos].1];
                    left_sum += yi;
                    left_sq += yi * yi;

                    let n_left = pos + 1;
                    let n_right = n - n_left;
                    if order[pos].0 == order[pos + 1].0 || n_left < min_leaf || n_right < min_leaf {
                        continue;
                    }
                    let left_var = variance(n_left, left_sum, left_sq);
                    let right_var = variance(n_right, total_sum - left_sum, total_sq - left_sq);
                    let weighted = (n_left as f64 * left_var + n_right as f64 * right_var) / n_f;
                    let gain = parent_impurity - weighted;
                    if gain > best_gain {
                        best_gain = gain;
                        best_threshold = Some((order[pos].0 + order[pos + 1].0) / 2.0);
                    }
                }
            }
        }

        best_threshold.map(|threshold| SplitCandidate {
            feature_idx,
            threshold,
            gain: best_gain,
        })
    }

    fn class_impurity(&self, counts: &[usize], n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self.criterion {
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            _ => 1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
        }
    }

    fn node_impurity(&self, ctx: &BuildContext<'_>, indices: &[usize]) -> f64 {
        match ctx.targets {
            Targets::Classes(encoded) => {
                let mut counts = vec![0usize; ctx.n_classes];
                for &i in indices {
                    counts[encoded[i]] += 1;
                }
                self.class_impurity(&counts, indices.len())
            }
            Targets::Values(y) => {
                let sum: f64 = indices.iter().map(|&i| y[i]).sum();
                let sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
                variance(indices.len(), sum, sq)
            }
        }
    }

    fn make_leaf(&self, ctx: &BuildContext<'_>, indices: &[usize]) -> TreeNode {
        let n_samples = indices.len();
        let value = match ctx.targets {
            Targets::Classes(encoded) => {
                let mut dist = vec![0.0; ctx.n_classes];
                for &i in indices {
                    dist[encoded[i]] += 1.0;
                }
                if n_samples > 0 {
                    for d in &mut dist {
                        *d /= n_samples as f64;
                    }
                }
                dist
            }
            Targets::Values(y) => {
                let mean = if n_samples > 0 {
                    indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64
                } else {
                    0.0
                };
                vec![mean]
            }
        };
        TreeNode::Leaf { value, n_samples }
    }

    fn leaf_for<'t>(&'t self, root: &'t TreeNode, sample: ArrayView1<f64>) -> &'t [f64] {
        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    fn check_predict_input(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(VintnerError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(VintnerError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    /// Make predictions: class labels for classifiers, values for regressors
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.is_classification {
            let proba = self.predict_proba(x)?;
            return Ok(argmax_labels(&proba, &self.classes));
        }
        let root = self.check_predict_input(x)?;
        Ok(x.rows().into_iter().map(|row| self.leaf_for(root, row)[0]).collect())
    }

    /// Class probabilities, columns ordered as [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classification {
            return Err(VintnerError::InvalidInput(
                "predict_proba is only defined for classifier trees".to_string(),
            ));
        }
        let root = self.check_predict_input(x)?;
        let mut out = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, &p) in self.leaf_for(root, row).iter().enumerate() {
                out[[i, k]] = p;
            }
        }
        Ok(out)
    }

    /// Classes seen at fit time, ascending
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

fn variance(n: usize, sum: f64, sq_sum: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    (sq_sum / n - (sum / n).powi(2)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![3.0, 3.0, 7.0, 7.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
        assert_eq!(tree.classes(), &[3, 7]);
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![4.0, 4.0, 5.0, 5.0, 6.0, 6.0];
        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
        assert!(tree.get_n_leaves() <= 4);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_fit_with_missing_class_keeps_columns() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![5.0, 5.0, 6.0];
        let mut tree = DecisionTree::new_classifier();
        tree.fit_with_classes(&x, &y, &[5, 6, 7]).unwrap();
        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        assert!(proba.column(2).iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(VintnerError::ModelNotFitted)));
    }
}
