//! Finite hyperparameter grids

use crate::training::{Hyperparameters, ParamValue};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One tunable parameter and its candidate values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Ordered set of categorical parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with a finite list of values
    pub fn choice<T, I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        T: Into<ParamValue>,
        I: IntoIterator<Item = T>,
    {
        self.parameters.push(Parameter {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Size of the full grid
    pub fn n_combinations(&self) -> usize {
        if self.parameters.is_empty() {
            return 0;
        }
        self.parameters
            .iter()
            .map(|p| p.values.len())
            .fold(1usize, |acc, n| acc.saturating_mul(n))
    }

    /// Decode a grid index; the last parameter varies fastest
    pub fn combination(&self, mut index: usize) -> Hyperparameters {
        let mut picked: Vec<(String, ParamValue)> = Vec::with_capacity(self.parameters.len());
        for param in self.parameters.iter().rev() {
            let n = param.values.len().max(1);
            let value = param.values.get(index % n).cloned().unwrap_or(ParamValue::Null);
            picked.push((param.name.clone(), value));
            index /= n;
        }
        picked.into_iter().collect()
    }

    /// Up to `n_iter` distinct combinations drawn without replacement.
    /// The whole grid, in grid order, when it has at most `n_iter` points.
    pub fn sample<R: Rng + ?Sized>(&self, n_iter: usize, rng: &mut R) -> Vec<Hyperparameters> {
        let total = self.n_combinations();
        if total <= n_iter {
            return (0..total).map(|i| self.combination(i)).collect();
        }
        rand::seq::index::sample(rng, total, n_iter)
            .into_iter()
            .map(|i| self.combination(i))
            .collect()
    }
}
