//! Majority-class baseline

use crate::error::{VintnerError, Result};
use super::models::{check_fit_input, encode_labels, sorted_classes};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Predicts the most frequent training class; probabilities are the class priors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DummyClassifier {
    classes: Vec<i64>,
    priors: Vec<f64>,
    majority: Option<usize>,
}

impl DummyClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        let classes = sorted_classes(y);
        let mut counts = vec![0usize; classes.len()];
        for c in encode_labels(y, &classes)? {
            counts[c] += 1;
        }

        // Ties go to the smallest label
        let mut majority = 0;
        for (k, &count) in counts.iter().enumerate() {
            if count > counts[majority] {
                majority = k;
            }
        }

        let n = y.len() as f64;
        self.priors = counts.iter().map(|&c| c as f64 / n).collect();
        self.classes = classes;
        self.majority = Some(majority);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let majority = self.majority.ok_or(VintnerError::ModelNotFitted)?;
        Ok(Array1::from_elem(x.nrows(), self.classes[majority] as f64))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.majority.is_none() {
            return Err(VintnerError::ModelNotFitted);
        }
        Ok(Array2::from_shape_fn((x.nrows(), self.classes.len()), |(_, k)| self.priors[k]))
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Training class frequencies, aligned with [`Self::classes`]
    pub fn priors(&self) -> &[f64] {
        &self.priors
    }
}
