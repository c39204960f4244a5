//! Prediction service contract
//!
//! Loads one artifact bundle, validates request objects by feature name and
//! re-applies the fitted scaler before predicting.

mod predictor;

pub use predictor::{feature_vector, BatchItem, BatchResponse, Prediction, Predictor};
