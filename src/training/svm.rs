//! Support Vector Machine classifier
//!
//! One-vs-rest SMO (Sequential Minimal Optimization) over a shared kernel
//! matrix, with optional Platt-scaled probability estimates.

use crate::error::{VintnerError, Result};
use super::models::{argmax_labels, check_fit_input, check_n_features, sorted_classes};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
pub const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Radial Basis Function: K(x, y) = exp(-γ * ||x - y||²).
    /// `None` resolves to `1 / (n_features * var(X))` at fit time.
    RBF { gamma: Option<f64> },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: None }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of full passes over the data
    pub max_iter: usize,
    /// Fit Platt sigmoids so `predict_proba` is available
    pub probability: bool,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 200,
            probability: true,
            random_state: Some(42),
        }
    }
}

/// A single binary SVM trained for one class vs rest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySVM {
    support_vectors: Array2<f64>,
    /// alpha_i * y_i for each support vector
    dual_coef: Array1<f64>,
    bias: f64,
    /// Platt sigmoid (A, B): P(positive | f) = 1 / (1 + exp(A f + B))
    platt: Option<(f64, f64)>,
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    /// Resolved kernel width (unused for the linear kernel)
    gamma: f64,
    classes: Vec<i64>,
    n_features: usize,
    machines: Vec<BinarySVM>,
}

impl SVMClassifier {
    /// Create a new SVM classifier
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            gamma: 1.0,
            classes: Vec::new(),
            n_features: 0,
            machines: Vec::new(),
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Whether probability estimates were fitted
    pub fn has_probability(&self) -> bool {
        self.config.probability
    }

    /// Fit one binary machine per class
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(VintnerError::InvalidInput(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVM kernel matrix. \
                 Consider subsampling or using a different algorithm.",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let classes = sorted_classes(y);
        if classes.len() < 2 {
            return Err(VintnerError::InvalidInput(
                "SVM requires at least 2 distinct classes".to_string(),
            ));
        }

        self.gamma = match self.config.kernel {
            KernelType::RBF { gamma: Some(g) } => g,
            _ => {
                let var = x.iter().map(|&v| v * v).sum::<f64>() / x.len() as f64
                    - (x.sum() / x.len() as f64).powi(2);
                if var > 0.0 { 1.0 / (x.ncols() as f64 * var) } else { 1.0 }
            }
        };
        self.n_features = x.ncols();

        let kernel_matrix = self.compute_kernel_matrix(x);
        let base_seed = self.config.random_state.unwrap_or(42);

        let machines: Vec<BinarySVM> = classes
            .par_iter()
            .enumerate()
            .map(|(k, &cls)| {
                let y_binary: Array1<f64> = y.mapv(|v| if v as i64 == cls { 1.0 } else { -1.0 });
                let seed = base_seed.wrapping_add(k as u64);
                let (alphas, bias, decision) = self.smo_train(&kernel_matrix, &y_binary, seed);

                let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
                let support_vectors = x.select(Axis(0), &support);
                let dual_coef: Array1<f64> = support.iter().map(|&i| alphas[i] * y_binary[i]).collect();

                let platt = if self.config.probability {
                    Some(platt_fit(&decision, &y_binary))
                } else {
                    None
                };

                BinarySVM {
                    support_vectors,
                    dual_coef,
                    bias,
                    platt,
                }
            })
            .collect();

        self.classes = classes;
        self.machines = machines;
        Ok(())
    }

    /// SMO on a precomputed kernel matrix. Returns (alphas, bias, training decision values).
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>, seed: u64) -> (Array1<f64>, f64, Array1<f64>) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        // f[t] = sum_j alpha_j y_j K(j, t), kept in sync with alphas
        let mut f = Array1::<f64>::zeros(n);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let max_passes = 5;
        let mut passes = 0;
        let mut total_iter = 0;

        while n > 1 && passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = f[i] + bias - y[i];
                if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = f[j] + bias - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let alpha_j_new = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alpha_j_new - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                let alpha_i_new = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j_new);
                alphas[i] = alpha_i_new;
                alphas[j] = alpha_j_new;

                let d_i = y[i] * (alpha_i_new - alpha_i_old);
                let d_j = y[j] * (alpha_j_new - alpha_j_old);

                let b1 = bias - e_i - d_i * k[[i, i]] - d_j * k[[i, j]];
                let b2 = bias - e_j - d_i * k[[i, j]] - d_j * k[[j, j]];
                bias = if alpha_i_new > 0.0 && alpha_i_new < c {
                    b1
                } else if alpha_j_new > 0.0 && alpha_j_new < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                f.scaled_add(d_i, &k.row(i));
                f.scaled_add(d_j, &k.row(j));
                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        let decision = &f + bias;
        (alphas, bias, decision)
    }

    /// Compute kernel matrix (rows in parallel)
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| self.kernel(x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                k[[i, j]] = v;
            }
        }
        k
    }

    fn kernel(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self.config.kernel {
            KernelType::Linear => a.dot(&b),
            KernelType::RBF { .. } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi) * (ai - bi)).sum();
                (-self.gamma * norm_sq).exp()
            }
        }
    }

    fn machine_score(&self, m: &BinarySVM, sample: ArrayView1<f64>) -> f64 {
        m.support_vectors
            .rows()
            .into_iter()
            .zip(m.dual_coef.iter())
            .map(|(sv, &coef)| coef * self.kernel(sv, sample))
            .sum::<f64>()
            + m.bias
    }

    /// One-vs-rest decision values, shape (n_samples, n_classes)
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.machines.is_empty() {
            return Err(VintnerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.machines.iter().map(|m| self.machine_score(m, x.row(i))).collect())
            .collect();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((x.nrows(), self.machines.len()), flat)?)
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = if self.config.probability {
            self.predict_proba(x)?
        } else {
            self.decision_function(x)?
        };
        Ok(argmax_labels(&scores, &self.classes))
    }

    /// Normalized Platt probabilities; only available when fitted with `probability = true`
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.config.probability {
            return Err(VintnerError::UnsupportedMetric(
                "SVM was fitted without probability estimates".to_string(),
            ));
        }
        let mut proba = self.decision_function(x)?;
        for mut row in proba.rows_mut() {
            for (v, m) in row.iter_mut().zip(self.machines.iter()) {
                let (a, b) = m.platt.unwrap_or((-1.0, 0.0));
                *v = platt_probability(*v, a, b);
            }
            let sum = row.sum();
            if sum > 0.0 {
                row /= sum;
            } else {
                row.fill(1.0 / self.classes.len() as f64);
            }
        }
        Ok(proba)
    }

    /// Classes seen at fit time
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Total support vectors across machines
    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.support_vectors.nrows()).sum()
    }
}

/// P(positive | f) under the sigmoid 1 / (1 + exp(A f + B)), evaluated stably
fn platt_probability(f: f64, a: f64, b: f64) -> f64 {
    let fapb = f * a + b;
    if fapb >= 0.0 {
        (-fapb).exp() / (1.0 + (-fapb).exp())
    } else {
        1.0 / (1.0 + fapb.exp())
    }
}

/// Newton fit of the Platt sigmoid with regularized targets
fn platt_fit(decision: &Array1<f64>, y: &Array1<f64>) -> (f64, f64) {
    let prior1 = y.iter().filter(|&&v| v > 0.0).count() as f64;
    let prior0 = y.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = y.iter().map(|&v| if v > 0.0 { hi_target } else { lo_target }).collect();

    let objective = |a: f64, b: f64| -> f64 {
        decision
            .iter()
            .zip(targets.iter())
            .map(|(&f, &t)| {
                let fapb = f * a + b;
                if fapb >= 0.0 {
                    t * fapb + (1.0 + (-fapb).exp()).ln()
                } else {
                    (t - 1.0) * fapb + (1.0 + fapb.exp()).ln()
                }
            })
            .sum()
    };

    let sigma = 1e-12;
    let min_step = 1e-10;
    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..100 {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (sigma, sigma, 0.0, 0.0, 0.0);
        for (&f, &t) in decision.iter().zip(targets.iter()) {
            let fapb = f * a + b;
            let (p, q) = if fapb >= 0.0 {
                let e = (-fapb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = fapb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }
        if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= min_step {
            let (na, nb) = (a + step * da, b + step * db);
            let nf = objective(na, nb);
            if nf < fval + 1e-4 * step * gd {
                a = na;
                b = nb;
                fval = nf;
                break;
            }
            step /= 2.0;
        }
        if step < min_step {
            break;
        }
    }
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn three_clusters() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec(
            (15, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, //
                5.0, 5.0, 5.5, 5.2, 6.0, 6.0, 5.2, 5.8, 4.8, 5.5, //
                1.0, 5.0, 1.5, 5.2, 2.0, 6.0, 1.2, 5.8, 0.8, 5.5,
            ],
        )
        .unwrap();
        let y = Array1::from_vec(vec![
            4.0, 4.0, 4.0, 4.0, 4.0, 5.0, 5.0, 5.0, 5.0, 5.0, 6.0, 6.0, 6.0, 6.0, 6.0,
        ]);
        (x, y)
    }

    #[test]
    fn test_svm_classifier_linear() {
        let x = array![[1.0, 1.0], [1.5, 1.0], [1.0, 1.5], [4.0, 4.0], [4.5, 4.0], [4.0, 4.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut svm = SVMClassifier::new(SVMConfig {
            kernel: KernelType::Linear,
            probability: false,
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();
        let predictions = svm.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 5, "only {} of 6 correct", correct);
    }

    #[test]
    fn test_svm_classifier_multiclass() {
        let (x, y) = three_clusters();
        let mut svm = SVMClassifier::new(SVMConfig {
            c: 10.0,
            kernel: KernelType::RBF { gamma: Some(0.5) },
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();

        let predictions = svm.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 12, "only {} of 15 correct", correct);
    }

    #[test]
    fn test_probabilities_normalized() {
        let (x, y) = three_clusters();
        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.fit(&x, &y).unwrap();
        let proba = svm.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (15, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_proba_unavailable_without_probability() {
        let (x, y) = three_clusters();
        let mut svm = SVMClassifier::new(SVMConfig {
            probability: false,
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();
        assert!(matches!(svm.predict_proba(&x), Err(VintnerError::UnsupportedMetric(_))));
        assert_eq!(svm.predict(&x).unwrap().len(), 15);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![5.0, 5.0];
        let mut svm = SVMClassifier::new(SVMConfig::default());
        assert!(svm.fit(&x, &y).is_err());
    }

    #[test]
    fn test_platt_orders_decisions() {
        let decision = array![-2.0, -1.5, -1.0, 1.0, 1.5, 2.0];
        let y = array![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        let (a, b) = platt_fit(&decision, &y);
        assert!(platt_probability(2.0, a, b) > platt_probability(-2.0, a, b));
    }
}
