//! K-Nearest Neighbors classifier

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::models::{argmax_labels, check_fit_input, check_n_features, encode_labels, sorted_classes};
use crate::error::{VintnerError, Result};

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

impl WeightScheme {
    /// Parse the search-space spelling (`uniform` / `distance`)
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "uniform" => Ok(WeightScheme::Uniform),
            "distance" => Ok(WeightScheme::Distance),
            other => Err(VintnerError::invalid_parameter("weights", other, "expected 'uniform' or 'distance'")),
        }
    }
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    /// Training labels as class indices
    y_train: Vec<usize>,
    classes: Vec<i64>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.n_neighbors == 0 {
            return Err(VintnerError::invalid_parameter("n_neighbors", 0, "must be positive"));
        }
        self.classes = sorted_classes(y);
        self.y_train = encode_labels(y, &self.classes)?;
        self.x_train = Some(x.to_owned());
        Ok(())
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(argmax_labels(&proba, &self.classes))
    }

    /// Predict class probabilities (parallelized over query rows)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let x_train = self.x_train.as_ref().ok_or(VintnerError::ModelNotFitted)?;
        check_n_features(x_train.ncols(), x)?;

        let n_classes = self.classes.len();
        let k = self.config.n_neighbors.min(x_train.nrows());

        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, k);
                class_probs_from(&neighbors, &self.y_train, n_classes, self.config.weights)
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((x.nrows(), n_classes), flat)?)
    }

    /// Classes seen at fit time
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }
}

/// Max-heap entry keeping the k smallest (distance, index) pairs
#[derive(PartialEq)]
struct Neighbor(f64, usize);

impl Eq for Neighbor {}
impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal distances resolve to the earlier training row
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// Find k nearest training rows with a bounded max-heap, O(n log k)
fn find_k_nearest(point: ArrayView1<f64>, x_train: &Array2<f64>, k: usize) -> Vec<(f64, usize)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let candidate = Neighbor(euclidean(point, row), i);
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    heap.into_iter().map(|n| (n.0, n.1)).collect()
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(ai, bi)| (ai - bi) * (ai - bi))
        .sum::<f64>()
        .sqrt()
}

fn class_probs_from(neighbors: &[(f64, usize)], y_train: &[usize], n_classes: usize, weights: WeightScheme) -> Vec<f64> {
    let mut probs = vec![0.0; n_classes];

    // An exact match dominates under distance weighting
    if weights == WeightScheme::Distance && neighbors.iter().any(|&(d, _)| d == 0.0) {
        for &(d, idx) in neighbors {
            if d == 0.0 {
                probs[y_train[idx]] += 1.0;
            }
        }
    } else {
        for &(d, idx) in neighbors {
            let w = match weights {
                WeightScheme::Uniform => 1.0,
                WeightScheme::Distance => 1.0 / d,
            };
            probs[y_train[idx]] += w;
        }
    }

    let total: f64 = probs.iter().sum();
    if total > 0.0 {
        for p in &mut probs {
            *p /= total;
        }
    }
    probs
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn clusters() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [5.0, 5.0],
            [5.1, 5.2],
            [5.2, 5.1],
        ];
        let y = array![3.0, 3.0, 3.0, 8.0, 8.0, 8.0];
        (x, y)
    }

    #[test]
    fn test_knn_classifier() {
        let (x, y) = clusters();
        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();

        let preds = knn.predict(&array![[0.05, 0.05], [5.05, 5.05]]).unwrap();
        assert_eq!(preds, array![3.0, 8.0]);
    }

    #[test]
    fn test_proba_uniform_votes() {
        let (x, y) = clusters();
        let mut knn = KNNClassifier::with_k(5);
        knn.fit(&x, &y).unwrap();

        let proba = knn.predict_proba(&array![[0.0, 0.0]]).unwrap();
        assert!((proba[[0, 0]] - 0.6).abs() < 1e-12);
        assert!((proba[[0, 1]] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weights() {
        let (x, y) = clusters();
        let mut knn = KNNClassifier::new(KNNConfig {
            n_neighbors: 6,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();
        let proba = knn.predict_proba(&array![[0.5, 0.5]]).unwrap();
        assert!(proba[[0, 0]] > 0.8);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let (x, y) = clusters();
        let mut knn = KNNClassifier::with_k(50);
        knn.fit(&x, &y).unwrap();
        let proba = knn.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (p - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_parse_weights() {
        assert_eq!(WeightScheme::parse("distance").unwrap(), WeightScheme::Distance);
        assert!(WeightScheme::parse("gaussian").is_err());
    }
}
