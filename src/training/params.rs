//! Hyperparameter values as they appear in search spaces and metadata

use crate::error::{Result, VintnerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Absent / unbounded (e.g. no depth limit)
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "None"),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

/// Named hyperparameters, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(BTreeMap<String, ParamValue>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-negative integer parameter, `default` when absent
    pub fn get_usize(&self, name: &str, default: usize) -> Result<usize> {
        match self.get_opt_usize(name, Some(default))? {
            Some(v) => Ok(v),
            None => Err(VintnerError::invalid_parameter(name, "None", "a value is required")),
        }
    }

    /// Integer parameter where `Null` means unbounded
    pub fn get_opt_usize(&self, name: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Null) => Ok(None),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(Some(*v as usize)),
            Some(other) => Err(VintnerError::invalid_parameter(name, other, "expected a non-negative integer")),
        }
    }

    /// Float parameter; integers are widened
    pub fn get_f64(&self, name: &str, default: f64) -> Result<f64> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(VintnerError::invalid_parameter(name, other, "expected a number")),
        }
    }

    pub fn get_str<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(VintnerError::invalid_parameter(name, other, "expected a string")),
        }
    }
}

impl FromIterator<(String, ParamValue)> for Hyperparameters {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let params = Hyperparameters::new()
            .with("n_estimators", 200i64)
            .with("max_depth", ParamValue::Null)
            .with("learning_rate", 0.1)
            .with("weights", "distance");

        assert_eq!(params.get_usize("n_estimators", 100).unwrap(), 200);
        assert_eq!(params.get_usize("min_samples_leaf", 1).unwrap(), 1);
        assert_eq!(params.get_opt_usize("max_depth", Some(3)).unwrap(), None);
        assert_eq!(params.get_f64("learning_rate", 1.0).unwrap(), 0.1);
        assert_eq!(params.get_str("weights", "uniform").unwrap(), "distance");
        assert!(params.get_usize("learning_rate", 1).is_err());
    }

    #[test]
    fn test_json_shape() {
        let params = Hyperparameters::new()
            .with("max_depth", Option::<i64>::None)
            .with("n_estimators", 100i64)
            .with("subsample", 0.8);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"max_depth":null,"n_estimators":100,"subsample":0.8}"#);

        let back: Hyperparameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_display() {
        let params = Hyperparameters::new().with("k", 5i64).with("depth", ParamValue::Null);
        assert_eq!(params.to_string(), "{depth=None, k=5}");
    }
}
