//! Standard (z-score) feature scaling

use crate::error::{VintnerError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature parameters of a fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean
    scale: f64,  // population std, 1.0 when the feature is constant
}

/// Fitted standardization transform: `(x - mean) / std`.
///
/// Immutable once fitted; the same value transforms every partition and
/// every inference request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    params: Vec<ScalerParams>,
}

impl Scaler {
    /// Fit mean and population standard deviation (ddof = 0) per column
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(VintnerError::DataError("cannot fit scaler on zero rows".to_string()));
        }

        let params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let center = col.mean().unwrap_or(0.0);
                let std = col.std(0.0);
                ScalerParams {
                    center,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                }
            })
            .collect();

        Ok(Self { params })
    }

    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.params.len()
    }

    /// Fitted means
    pub fn mean(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.center).collect()
    }

    /// Divisors actually applied (constant features report 1.0)
    pub fn scale(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.scale).collect()
    }

    /// Standardize a matrix; never mutates its input
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.to_owned();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    /// Standardize a single feature vector
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .zip(self.params.iter())
            .map(|(&v, p)| (v - p.center) / p.scale)
            .collect())
    }

    fn check_width(&self, n: usize) -> Result<()> {
        if n != self.params.len() {
            return Err(VintnerError::ShapeError {
                expected: format!("{} features", self.params.len()),
                actual: format!("{} features", n),
            });
        }
        Ok(())
    }
}

/// Free-function form of [`Scaler::transform`]
pub fn transform(x: &Array2<f64>, scaler: &Scaler) -> Result<Array2<f64>> {
    scaler.transform(x)
}
