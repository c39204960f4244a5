//! Trained model dispatch and shared label helpers

use crate::error::{Result, VintnerError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::dummy::DummyClassifier;
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::lightgbm::LightGBMClassifier;
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use super::xgboost::XGBoostClassifier;

/// What a fitted model can report beyond hard labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// `predict_proba` is available
    pub probabilities: bool,
    /// Per-feature importances are available
    pub feature_importances: bool,
}

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Dummy(DummyClassifier),
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    XGBoost(XGBoostClassifier),
    LightGBM(LightGBMClassifier),
    SVM(SVMClassifier),
    KNN(KNNClassifier),
}

impl TrainedModel {
    /// Fit the wrapped model in place
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            TrainedModel::Dummy(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::LogisticRegression(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::RandomForest(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::GradientBoosting(m) => m.fit(x, y),
            TrainedModel::XGBoost(m) => m.fit(x, y),
            TrainedModel::LightGBM(m) => m.fit(x, y),
            TrainedModel::SVM(m) => m.fit(x, y),
            TrainedModel::KNN(m) => m.fit(x, y),
        }
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::Dummy(m) => m.predict(x),
            TrainedModel::LogisticRegression(m) => m.predict(x),
            TrainedModel::DecisionTree(m) => m.predict(x),
            TrainedModel::RandomForest(m) => m.predict(x),
            TrainedModel::GradientBoosting(m) => m.predict(x),
            TrainedModel::XGBoost(m) => m.predict(x),
            TrainedModel::LightGBM(m) => m.predict(x),
            TrainedModel::SVM(m) => m.predict(x),
            TrainedModel::KNN(m) => m.predict(x),
        }
    }

    /// Class probabilities, shape (n_samples, n_classes), columns ordered as [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            TrainedModel::Dummy(m) => m.predict_proba(x),
            TrainedModel::LogisticRegression(m) => m.predict_proba(x),
            TrainedModel::DecisionTree(m) => m.predict_proba(x),
            TrainedModel::RandomForest(m) => m.predict_proba(x),
            TrainedModel::GradientBoosting(m) => m.predict_proba(x),
            TrainedModel::XGBoost(m) => m.predict_proba(x),
            TrainedModel::LightGBM(m) => m.predict_proba(x),
            TrainedModel::SVM(m) => m.predict_proba(x),
            TrainedModel::KNN(m) => m.predict_proba(x),
        }
    }

    /// Sorted class labels seen at fit time
    pub fn classes(&self) -> &[i64] {
        match self {
            TrainedModel::Dummy(m) => m.classes(),
            TrainedModel::LogisticRegression(m) => m.classes(),
            TrainedModel::DecisionTree(m) => m.classes(),
            TrainedModel::RandomForest(m) => m.classes(),
            TrainedModel::GradientBoosting(m) => m.classes(),
            TrainedModel::XGBoost(m) => m.classes(),
            TrainedModel::LightGBM(m) => m.classes(),
            TrainedModel::SVM(m) => m.classes(),
            TrainedModel::KNN(m) => m.classes(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let probabilities = match self {
            TrainedModel::SVM(m) => m.has_probability(),
            _ => true,
        };
        let feature_importances = matches!(
            self,
            TrainedModel::DecisionTree(_)
                | TrainedModel::RandomForest(_)
                | TrainedModel::GradientBoosting(_)
                | TrainedModel::XGBoost(_)
                | TrainedModel::LightGBM(_)
        );
        Capabilities {
            probabilities,
            feature_importances,
        }
    }

    /// Feature importances when the family supports them and the model is fitted
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::DecisionTree(m) => m.feature_importances().cloned(),
            TrainedModel::RandomForest(m) => m.feature_importances().cloned(),
            TrainedModel::GradientBoosting(m) => {
                let imp = m.feature_importances();
                if imp.is_empty() {
                    None
                } else {
                    Some(Array1::from(imp.to_vec()))
                }
            }
            TrainedModel::XGBoost(m) => m.feature_importances(),
            TrainedModel::LightGBM(m) => m.feature_importances(),
            _ => None,
        }
    }

    /// Name of the model family
    pub fn model_type(&self) -> &'static str {
        match self {
            TrainedModel::Dummy(_) => "DummyClassifier",
            TrainedModel::LogisticRegression(_) => "LogisticRegression",
            TrainedModel::DecisionTree(_) => "DecisionTree",
            TrainedModel::RandomForest(_) => "RandomForest",
            TrainedModel::GradientBoosting(_) => "GradientBoosting",
            TrainedModel::XGBoost(_) => "XGBoost",
            TrainedModel::LightGBM(_) => "LightGBM",
            TrainedModel::SVM(_) => "SVM",
            TrainedModel::KNN(_) => "KNN",
        }
    }

    /// Accuracy of `predict` against `y`
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(accuracy(y, &y_pred))
    }
}

/// Fraction of exactly matching labels; 0 for empty input
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Distinct integer labels in ascending order
pub(crate) fn sorted_classes(y: &Array1<f64>) -> Vec<i64> {
    let mut classes: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Map each label to its position in `classes`
pub(crate) fn encode_labels(y: &Array1<f64>, classes: &[i64]) -> Result<Vec<usize>> {
    y.iter()
        .map(|&v| {
            let label = v.round() as i64;
            classes
                .binary_search(&label)
                .map_err(|_| VintnerError::InvalidInput(format!("unknown class label {}", label)))
        })
        .collect()
}

/// Row-wise argmax mapped back to labels; the first (lowest) class wins ties
pub(crate) fn argmax_labels(proba: &Array2<f64>, classes: &[i64]) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (k, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = k;
                }
            }
            classes.get(best).copied().unwrap_or_default() as f64
        })
        .collect()
}

pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(VintnerError::DataError("cannot fit on an empty dataset".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(VintnerError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    Ok(())
}

pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(VintnerError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}
