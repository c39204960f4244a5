//! Artifact metadata
//!
//! Metadata is assembled from numeric-library values and normalized into
//! plain JSON before it is written.

use crate::error::{Result, VintnerError};
use crate::training::{Hyperparameters, ParamValue};
use ndarray::{Array0, Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A metadata node as produced by the training code
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    /// 0-d array
    Scalar(Array0<f64>),
    Vector(Array1<f64>),
    Matrix(Array2<f64>),
    Text(String),
    Sequence(Vec<NumericValue>),
    Tuple(Vec<NumericValue>),
    Mapping(BTreeMap<String, NumericValue>),
}

impl NumericValue {
    /// Empty mapping
    pub fn mapping() -> Self {
        NumericValue::Mapping(BTreeMap::new())
    }

    /// Insert into a mapping; other variants are left untouched
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<NumericValue>) {
        if let NumericValue::Mapping(map) = self {
            map.insert(key.into(), value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&NumericValue> {
        match self {
            NumericValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<f32> for NumericValue {
    fn from(v: f32) -> Self {
        NumericValue::Float32(v)
    }
}

impl From<f64> for NumericValue {
    fn from(v: f64) -> Self {
        NumericValue::Float64(v)
    }
}

impl From<i64> for NumericValue {
    fn from(v: i64) -> Self {
        NumericValue::Int(v)
    }
}

impl From<usize> for NumericValue {
    fn from(v: usize) -> Self {
        NumericValue::UInt(v as u64)
    }
}

impl From<bool> for NumericValue {
    fn from(v: bool) -> Self {
        NumericValue::Bool(v)
    }
}

impl From<&str> for NumericValue {
    fn from(v: &str) -> Self {
        NumericValue::Text(v.to_string())
    }
}

impl From<String> for NumericValue {
    fn from(v: String) -> Self {
        NumericValue::Text(v)
    }
}

impl From<Array0<f64>> for NumericValue {
    fn from(v: Array0<f64>) -> Self {
        NumericValue::Scalar(v)
    }
}

impl From<Array1<f64>> for NumericValue {
    fn from(v: Array1<f64>) -> Self {
        NumericValue::Vector(v)
    }
}

impl From<Array2<f64>> for NumericValue {
    fn from(v: Array2<f64>) -> Self {
        NumericValue::Matrix(v)
    }
}

impl<T: Into<NumericValue>> From<Option<T>> for NumericValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(NumericValue::Null)
    }
}

impl<T: Into<NumericValue>> From<Vec<T>> for NumericValue {
    fn from(v: Vec<T>) -> Self {
        NumericValue::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<NumericValue>> From<BTreeMap<String, T>> for NumericValue {
    fn from(v: BTreeMap<String, T>) -> Self {
        NumericValue::Mapping(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<&Hyperparameters> for NumericValue {
    fn from(params: &Hyperparameters) -> Self {
        let map = params
            .iter()
            .map(|(k, v)| {
                let node = match v {
                    ParamValue::Null => NumericValue::Null,
                    ParamValue::Int(i) => NumericValue::Int(*i),
                    ParamValue::Float(f) => NumericValue::Float64(*f),
                    ParamValue::Text(s) => NumericValue::Text(s.clone()),
                };
                (k.clone(), node)
            })
            .collect();
        NumericValue::Mapping(map)
    }
}

/// Recursively convert a metadata tree into JSON primitives.
///
/// `f32` goes through its shortest decimal form so `0.91f32` becomes `0.91`;
/// non-finite floats become `null`.
pub fn normalize(value: &NumericValue) -> Value {
    match value {
        NumericValue::Null => Value::Null,
        NumericValue::Bool(b) => Value::Bool(*b),
        NumericValue::Int(i) => Value::from(*i),
        NumericValue::UInt(u) => Value::from(*u),
        NumericValue::Float32(f) => float_json(widen_f32(*f)),
        NumericValue::Float64(f) => float_json(*f),
        NumericValue::Scalar(a) => a.iter().next().map_or(Value::Null, |&f| float_json(f)),
        NumericValue::Vector(a) => Value::Array(a.iter().map(|&f| float_json(f)).collect()),
        NumericValue::Matrix(a) => Value::Array(
            a.rows()
                .into_iter()
                .map(|row| Value::Array(row.iter().map(|&f| float_json(f)).collect()))
                .collect(),
        ),
        NumericValue::Text(s) => Value::String(s.clone()),
        NumericValue::Sequence(items) | NumericValue::Tuple(items) => {
            Value::Array(items.iter().map(normalize).collect())
        }
        NumericValue::Mapping(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), normalize(v));
            }
            Value::Object(out)
        }
    }
}

fn widen_f32(f: f32) -> f64 {
    if !f.is_finite() {
        return f64::NAN;
    }
    // Display prints the shortest string that round-trips the f32
    f.to_string().parse::<f64>().unwrap_or(f as f64)
}

fn float_json(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Typed view of `model_metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    pub test_accuracy: f64,
    pub roc_auc: Option<f64>,
    pub validation_accuracy: f64,
    pub feature_names: Vec<String>,
    pub classes: Vec<i64>,
    pub training_size: usize,
    pub features_count: usize,
    pub training_date: String,
    pub data_shape: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub best_params: Option<Hyperparameters>,
    #[serde(default)]
    pub cv_score: Option<f64>,
    #[serde(default)]
    pub train_accuracy: Option<f64>,
    #[serde(default)]
    pub classification_report: Option<Value>,
}

impl ModelMetadata {
    /// Parse a normalized metadata document
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| VintnerError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, array};
    use serde_json::json;

    #[test]
    fn test_f32_uses_shortest_decimal() {
        assert_eq!(normalize(&NumericValue::Float32(0.91)), json!(0.91));
        // Plain widening would give 0.9100000262260437
        assert_ne!(0.91f32 as f64, 0.91);
    }

    #[test]
    fn test_non_finite_becomes_null() {
        assert_eq!(normalize(&NumericValue::Float64(f64::NAN)), Value::Null);
        assert_eq!(normalize(&NumericValue::Float32(f32::INFINITY)), Value::Null);
    }

    #[test]
    fn test_nested_structures() {
        let mut tree = NumericValue::mapping();
        tree.insert("scalar", arr0(2.5));
        tree.insert("vector", array![1.0, 2.0]);
        tree.insert("matrix", array![[1.0, 0.0], [0.0, 1.0]]);
        tree.insert("shape", NumericValue::Tuple(vec![10usize.into(), 13usize.into()]));
        tree.insert("classes", vec![3i64, 5, 7]);
        tree.insert("missing", Option::<f64>::None);

        let mut nested = NumericValue::mapping();
        nested.insert("alcohol", 0.5f32);
        tree.insert("importance", nested);

        assert_eq!(
            normalize(&tree),
            json!({
                "scalar": 2.5,
                "vector": [1.0, 2.0],
                "matrix": [[1.0, 0.0], [0.0, 1.0]],
                "shape": [10, 13],
                "classes": [3, 5, 7],
                "missing": null,
                "importance": {"alcohol": 0.5}
            })
        );
    }

    #[test]
    fn test_typed_view_accepts_minimal_document() {
        let doc = json!({
            "model_type": "KNN",
            "test_accuracy": 0.6,
            "roc_auc": null,
            "validation_accuracy": 0.55,
            "feature_names": ["alcohol"],
            "classes": [5, 6],
            "training_size": 14,
            "features_count": 1,
            "training_date": "2024-01-01T00:00:00",
            "data_shape": [20, 2]
        });
        let meta = ModelMetadata::from_json(doc).unwrap();
        assert_eq!(meta.classes, vec![5, 6]);
        assert!(meta.feature_importance.is_none());
        assert!(meta.version.is_none());
    }
}
