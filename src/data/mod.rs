//! Wine samples, the unified dataset and its stratified partitions
//!
//! Feature order is fixed crate-wide: every consumer addresses features by
//! name but stores and serializes them in [`FEATURE_NAMES`] order.

mod split;

pub use split::{Split, StratifiedSplitter};

use crate::error::{VintnerError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of model features
pub const N_FEATURES: usize = 12;

/// Canonical feature order
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "fixed_acidity",
    "volatile_acidity",
    "citric_acid",
    "residual_sugar",
    "chlorides",
    "free_sulfur_dioxide",
    "total_sulfur_dioxide",
    "density",
    "pH",
    "sulphates",
    "alcohol",
    "wine_type_red",
];

/// Human-readable descriptions, in canonical order
pub const FEATURE_DESCRIPTIONS: [&str; N_FEATURES] = [
    "Fixed acidity (g/L)",
    "Volatile acidity (g/L)",
    "Citric acid (g/L)",
    "Residual sugar (g/L)",
    "Chlorides (g/L)",
    "Free sulfur dioxide (mg/L)",
    "Total sulfur dioxide (mg/L)",
    "Density (g/mL)",
    "pH level",
    "Sulphates (g/L)",
    "Alcohol content (%)",
    "Wine type (1 = red, 0 = white)",
];

/// Label column in the raw tables
pub const TARGET_COLUMN: &str = "quality";

/// Canonical feature names as owned strings
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Position of a feature in the canonical order
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|&f| f == name)
}

/// Wine color, folded into the `wine_type_red` indicator at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WineType {
    Red,
    White,
}

impl WineType {
    /// Value of the `wine_type_red` feature
    pub fn indicator(self) -> f64 {
        match self {
            WineType::Red => 1.0,
            WineType::White => 0.0,
        }
    }
}

/// One labeled wine sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub features: [f64; N_FEATURES],
    pub quality: i64,
}

/// Feature matrix plus integer quality labels (stored as f64, one row per sample)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    x: Array2<f64>,
    y: Array1<f64>,
}

impl Dataset {
    /// Build a dataset, checking shape and label integrality
    pub fn new(x: Array2<f64>, y: Array1<f64>) -> Result<Self> {
        if x.ncols() != N_FEATURES {
            return Err(VintnerError::ShapeError {
                expected: format!("{} feature columns", N_FEATURES),
                actual: format!("{} columns", x.ncols()),
            });
        }
        if x.nrows() != y.len() {
            return Err(VintnerError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if let Some((i, v)) = y.iter().enumerate().find(|(_, v)| v.fract() != 0.0 || !v.is_finite()) {
            return Err(VintnerError::DataError(format!(
                "quality label at row {} is not an integer: {}",
                i, v
            )));
        }
        Ok(Self { x, y })
    }

    /// Build a dataset from individual samples
    pub fn from_samples(samples: &[Sample]) -> Result<Self> {
        let flat: Vec<f64> = samples.iter().flat_map(|s| s.features).collect();
        let x = Array2::from_shape_vec((samples.len(), N_FEATURES), flat)?;
        let y = samples.iter().map(|s| s.quality as f64).collect();
        Self::new(x, y)
    }

    /// Feature matrix in canonical column order
    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    /// Quality labels
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    /// Shape of the unified table: rows × (features + label)
    pub fn table_shape(&self) -> (usize, usize) {
        (self.x.nrows(), self.x.ncols() + 1)
    }

    /// Sorted distinct quality labels
    pub fn classes(&self) -> Vec<i64> {
        self.class_counts().into_keys().collect()
    }

    /// Number of samples per quality label, ordered by label
    pub fn class_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for &v in self.y.iter() {
            *counts.entry(v as i64).or_insert(0) += 1;
        }
        counts
    }

    /// Rows at the given indices, in index order
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }

    /// Append the rows of `other`
    pub fn concat(&self, other: &Dataset) -> Result<Dataset> {
        let x = ndarray::concatenate(Axis(0), &[self.x.view(), other.x.view()])?;
        let y = self.y.iter().chain(other.y.iter()).copied().collect();
        Dataset::new(x, y)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Deterministic synthetic dataset with `per_class` rows for each label.
    ///
    /// Alcohol and volatile acidity separate the classes so every algorithm
    /// family has signal to learn.
    pub fn synthetic(labels: &[i64], per_class: usize) -> Dataset {
        let mut samples = Vec::new();
        for (c, &label) in labels.iter().enumerate() {
            for i in 0..per_class {
                let jitter = (i as f64 * 0.37).sin() * 0.1;
                let features = [
                    7.0 + jitter,
                    0.7 - 0.15 * c as f64 + jitter * 0.1,
                    0.3,
                    2.0 + i as f64 * 0.1,
                    0.05,
                    15.0 + i as f64,
                    40.0 + 2.0 * i as f64,
                    0.996,
                    3.3 + jitter * 0.1,
                    0.6,
                    9.0 + 1.5 * c as f64 + jitter,
                    (i % 2) as f64,
                ];
                samples.push(Sample { features, quality: label });
            }
        }
        Dataset::from_samples(&samples).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        assert_eq!(FEATURE_NAMES.len(), 12);
        assert_eq!(feature_index("pH"), Some(8));
        assert_eq!(feature_index("wine_type_red"), Some(11));
        assert_eq!(feature_index("ph"), None);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let x = Array2::zeros((3, 11));
        let y = Array1::from_vec(vec![5.0, 6.0, 7.0]);
        assert!(matches!(Dataset::new(x, y), Err(VintnerError::ShapeError { .. })));
    }

    #[test]
    fn test_rejects_fractional_labels() {
        let x = Array2::zeros((2, N_FEATURES));
        let y = Array1::from_vec(vec![5.0, 5.5]);
        assert!(matches!(Dataset::new(x, y), Err(VintnerError::DataError(_))));
    }

    #[test]
    fn test_classes_sorted_and_counted() {
        let ds = fixtures::synthetic(&[7, 3, 5], 4);
        assert_eq!(ds.classes(), vec![3, 5, 7]);
        assert_eq!(ds.class_counts()[&5], 4);
        assert_eq!(ds.table_shape(), (12, 13));
    }

    #[test]
    fn test_select_preserves_alignment() {
        let ds = fixtures::synthetic(&[3, 4], 3);
        let sub = ds.select(&[5, 0]);
        assert_eq!(sub.y()[0], 4.0);
        assert_eq!(sub.y()[1], 3.0);
        assert_eq!(sub.x().row(0), ds.x().row(5));
    }
}
