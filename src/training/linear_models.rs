//! Linear model implementations

use crate::error::{VintnerError, Result};
use super::gradient_boosting::softmax_rows;
use super::models::{argmax_labels, check_fit_input, check_n_features, encode_labels, sorted_classes};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Multinomial logistic regression with L2 penalty, fitted by full-batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients, shape (n_features, n_classes)
    pub coefficients: Option<Array2<f64>>,
    /// Fitted intercepts, one per class
    pub intercept: Option<Array1<f64>>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Classes, ascending
    classes: Vec<i64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            classes: Vec::new(),
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Fit the model using gradient descent on the softmax cross-entropy
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        if !(self.learning_rate > 0.0) || self.alpha < 0.0 {
            return Err(VintnerError::invalid_parameter(
                "learning_rate",
                self.learning_rate,
                "learning_rate must be positive and alpha non-negative",
            ));
        }

        let n_samples = x.nrows() as f64;
        let n_features = x.ncols();
        let classes = sorted_classes(y);
        let n_classes = classes.len();
        let encoded = encode_labels(y, &classes)?;

        let mut one_hot = Array2::<f64>::zeros((x.nrows(), n_classes));
        for (i, &c) in encoded.iter().enumerate() {
            one_hot[[i, c]] = 1.0;
        }

        let mut weights = Array2::<f64>::zeros((n_features, n_classes));
        let mut bias = Array1::<f64>::zeros(n_classes);
        let lr = self.learning_rate;

        for _iter in 0..self.max_iter {
            let logits = x.dot(&weights) + &bias;
            let probs = softmax_rows(&logits);
            let errors = probs - &one_hot;

            let dw = x.t().dot(&errors) / n_samples + self.alpha * &weights;
            let db = if self.fit_intercept {
                errors.sum_axis(Axis(0)) / n_samples
            } else {
                Array1::zeros(n_classes)
            };

            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights.scaled_add(-lr, &dw);
            bias.scaled_add(-lr, &db);
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.classes = classes;
        Ok(self)
    }

    /// Predict class probabilities, columns ordered as [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(VintnerError::ModelNotFitted)?;
        let intercept = self.intercept.as_ref().ok_or(VintnerError::ModelNotFitted)?;
        check_n_features(coefficients.nrows(), x)?;

        let logits = x.dot(coefficients) + intercept;
        Ok(softmax_rows(&logits))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(argmax_labels(&proba, &self.classes))
    }

    /// Classes seen at fit time
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Get accuracy score
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        let correct = y_pred
            .iter()
            .zip(y.iter())
            .filter(|(pred, actual)| (*pred - *actual).abs() < 0.5)
            .count();
        Ok(correct as f64 / y.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression_binary() {
        let x = array![[-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.score(&x, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_logistic_regression_multiclass() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [3.0, 0.0],
            [3.1, 0.2],
            [0.0, 3.0],
            [0.1, 3.2],
        ];
        let y = array![5.0, 5.0, 6.0, 6.0, 7.0, 7.0];

        let mut model = LogisticRegression::new().with_learning_rate(0.5).with_max_iter(2000);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.classes(), &[5, 6, 7]);
        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unfitted() {
        let model = LogisticRegression::new();
        assert!(matches!(model.predict(&array![[1.0]]), Err(VintnerError::ModelNotFitted)));
    }
}
