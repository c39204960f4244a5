//! Stateless prediction over a loaded artifact bundle

use chrono::Utc;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::data::{FEATURE_NAMES, N_FEATURES};
use crate::error::{Result, VintnerError};
use crate::export::{ArtifactStore, ModelArtifact, ModelMetadata};
use crate::preprocessing::Scaler;
use crate::training::TrainedModel;

/// Single-sample response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: i64,
    /// Highest class probability
    pub confidence: f64,
    /// Class label (as string) to probability
    pub probabilities: BTreeMap<String, f64>,
    pub timestamp: String,
}

/// One entry of a batch response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    Success {
        index: usize,
        prediction: i64,
        confidence: f64,
    },
    Failure {
        index: usize,
        error: String,
    },
}

impl BatchItem {
    pub fn is_error(&self) -> bool {
        matches!(self, BatchItem::Failure { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
    pub timestamp: String,
}

/// Validate a request object and lay it out in canonical feature order.
///
/// Every canonical name must be present (the error lists all missing names)
/// and hold a JSON number. Extra keys are ignored.
pub fn feature_vector(sample: &Map<String, Value>) -> Result<Array1<f64>> {
    let missing: Vec<String> = FEATURE_NAMES
        .iter()
        .filter(|name| !sample.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(VintnerError::MissingFeatures(missing));
    }

    let mut values = Vec::with_capacity(N_FEATURES);
    for name in FEATURE_NAMES {
        match sample.get(name).and_then(Value::as_f64) {
            Some(v) => values.push(v),
            None => {
                return Err(VintnerError::ValidationError(format!(
                    "feature '{}' must be a number",
                    name
                )))
            }
        }
    }
    Ok(Array1::from(values))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Loaded model, scaler and metadata; never refits
#[derive(Debug, Clone)]
pub struct Predictor {
    model: TrainedModel,
    scaler: Scaler,
    metadata: ModelMetadata,
}

impl Predictor {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        if artifact.scaler.n_features() != N_FEATURES {
            return Err(VintnerError::ShapeError {
                expected: format!("{} features", N_FEATURES),
                actual: format!("{} features", artifact.scaler.n_features()),
            });
        }
        Ok(Self {
            model: artifact.model,
            scaler: artifact.scaler,
            metadata: artifact.metadata,
        })
    }

    /// Load the bundle from a models directory
    pub fn load(store: &ArtifactStore) -> Result<Self> {
        Self::from_artifact(store.load()?)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Predict already-ordered raw feature rows.
    ///
    /// Returns labels and a probability matrix aligned with the model's classes.
    /// Models without probability support report a one-hot row for the predicted class.
    pub fn predict_rows(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
        let scaled = self.scaler.transform(x)?;
        let labels = self.model.predict(&scaled)?;
        let proba = if self.model.capabilities().probabilities {
            self.model.predict_proba(&scaled)?
        } else {
            let classes = self.model.classes();
            Array2::from_shape_fn((labels.len(), classes.len()), |(i, k)| {
                if classes[k] as f64 == labels[i] {
                    1.0
                } else {
                    0.0
                }
            })
        };
        Ok((labels, proba))
    }

    fn predict_features(&self, features: Array1<f64>) -> Result<(i64, f64, Array1<f64>)> {
        let x = features.insert_axis(Axis(0));
        let (labels, proba) = self.predict_rows(&x)?;
        let row = proba.row(0).to_owned();
        let confidence = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok((labels[0].round() as i64, confidence, row))
    }

    /// Predict one request object
    pub fn predict_one(&self, sample: &Map<String, Value>) -> Result<Prediction> {
        let (prediction, confidence, row) = self.predict_features(feature_vector(sample)?)?;
        let probabilities = self
            .model
            .classes()
            .iter()
            .zip(row.iter())
            .map(|(class, &p)| (class.to_string(), p))
            .collect();

        Ok(Prediction {
            prediction,
            confidence,
            probabilities,
            timestamp: now(),
        })
    }

    /// Predict each sample independently; a bad sample becomes an error entry
    pub fn predict_batch(&self, samples: &[Value]) -> BatchResponse {
        let results = samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                let outcome = match sample.as_object() {
                    Some(obj) => feature_vector(obj).and_then(|f| self.predict_features(f)),
                    None => Err(VintnerError::ValidationError("sample must be a JSON object".to_string())),
                };
                match outcome {
                    Ok((prediction, confidence, _)) => BatchItem::Success {
                        index,
                        prediction,
                        confidence,
                    },
                    Err(e) => BatchItem::Failure {
                        index,
                        error: e.to_string(),
                    },
                }
            })
            .collect();

        BatchResponse {
            results,
            timestamp: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic;
    use crate::data::feature_names;
    use crate::training::DecisionTree;
    use serde_json::json;

    fn predictor() -> Predictor {
        let data = synthetic(&[5, 6, 7], 6);
        let scaler = Scaler::fit(data.x()).unwrap();
        let mut model = TrainedModel::DecisionTree(DecisionTree::new_classifier());
        model.fit(&scaler.transform(data.x()).unwrap(), data.y()).unwrap();
        let metadata = ModelMetadata {
            model_type: "DecisionTree".to_string(),
            test_accuracy: 1.0,
            roc_auc: Some(1.0),
            validation_accuracy: 1.0,
            feature_names: feature_names(),
            classes: vec![5, 6, 7],
            training_size: 18,
            features_count: 12,
            training_date: "2024-01-01T00:00:00".to_string(),
            data_shape: vec![18, 13],
            feature_importance: None,
            version: None,
            best_params: None,
            cv_score: None,
            train_accuracy: None,
            classification_report: None,
        };
        Predictor::from_artifact(ModelArtifact { model, scaler, metadata }).unwrap()
    }

    fn sample(alcohol: f64) -> Map<String, Value> {
        let mut obj = Map::new();
        for name in FEATURE_NAMES {
            obj.insert(name.to_string(), json!(0.0));
        }
        obj.insert("fixed_acidity".to_string(), json!(7.0));
        obj.insert("volatile_acidity".to_string(), json!(0.6));
        obj.insert("alcohol".to_string(), json!(alcohol));
        obj
    }

    #[test]
    fn test_missing_features_are_all_listed() {
        let mut obj = sample(10.0);
        obj.remove("alcohol");
        obj.remove("pH");
        match feature_vector(&obj) {
            Err(VintnerError::MissingFeatures(names)) => assert_eq!(names, vec!["pH", "alcohol"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_feature_rejected() {
        let mut obj = sample(10.0);
        obj.insert("density".to_string(), json!("heavy"));
        assert!(matches!(feature_vector(&obj), Err(VintnerError::ValidationError(_))));
    }

    #[test]
    fn test_canonical_order() {
        let mut obj = sample(11.0);
        obj.insert("wine_type_red".to_string(), json!(1));
        let v = feature_vector(&obj).unwrap();
        assert_eq!(v[0], 7.0);
        assert_eq!(v[10], 11.0);
        assert_eq!(v[11], 1.0);
    }

    #[test]
    fn test_predict_one() {
        let p = predictor().predict_one(&sample(12.0)).unwrap();
        assert_eq!(p.probabilities.len(), 3);
        assert!(p.probabilities.contains_key("7"));
        let sum: f64 = p.probabilities.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(p.confidence, p.probabilities.values().copied().fold(0.0, f64::max));
    }

    #[test]
    fn test_batch_partial_failure() {
        let predictor = predictor();
        let mut broken = sample(10.0);
        broken.remove("alcohol");
        let samples = vec![
            Value::Object(sample(9.0)),
            Value::Object(broken),
            Value::Object(sample(12.0)),
            json!(42),
        ];
        let response = predictor.predict_batch(&samples);
        assert_eq!(response.results.len(), 4);
        assert!(!response.results[0].is_error());
        assert!(response.results[1].is_error());
        assert!(response.results[3].is_error());

        let json = serde_json::to_value(&response.results[1]).unwrap();
        assert_eq!(json["index"], 1);
        assert!(json["error"].as_str().unwrap().contains("alcohol"));
    }
}
