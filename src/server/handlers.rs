//! HTTP request handlers

use std::sync::Arc;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::data::{FEATURE_DESCRIPTIONS, FEATURE_NAMES};
use crate::inference::{BatchResponse, Prediction};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Liveness plus model status; always 200
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let healthy = state.is_healthy();
    let mut body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "model_loaded": healthy,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let Some(reason) = state.load_error() {
        body["reason"] = Value::String(reason.to_string());
    }
    Json(body)
}

/// Predict a single sample given as a name → value object
pub async fn predict(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Result<Json<Prediction>> {
    let predictor = state.predictor()?;
    let sample = body
        .as_object()
        .filter(|obj| !obj.is_empty())
        .ok_or_else(|| ServerError::BadRequest("request body must be a non-empty JSON object".to_string()))?;

    let prediction = predictor.predict_one(sample)?;
    info!(prediction = prediction.prediction, confidence = prediction.confidence, "Prediction served");
    Ok(Json(prediction))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    samples: Option<Value>,
}

/// Predict many samples; invalid samples become per-item errors
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>> {
    let predictor = state.predictor()?;
    let samples = match request.samples {
        Some(Value::Array(samples)) => samples,
        Some(_) => return Err(ServerError::BadRequest("samples must be a list".to_string())),
        None => return Err(ServerError::BadRequest("no samples in request".to_string())),
    };

    let response = predictor.predict_batch(&samples);
    let failed = response.results.iter().filter(|r| r.is_error()).count();
    info!(total = response.results.len(), failed, "Batch prediction served");
    Ok(Json(response))
}

/// Canonical feature names with descriptions
pub async fn get_features() -> Json<Value> {
    let descriptions: serde_json::Map<String, Value> = FEATURE_NAMES
        .iter()
        .zip(FEATURE_DESCRIPTIONS.iter())
        .map(|(name, desc)| (name.to_string(), Value::String(desc.to_string())))
        .collect();
    Json(json!({
        "features": FEATURE_NAMES,
        "feature_descriptions": descriptions,
    }))
}

/// Metadata of the loaded model
pub async fn get_model_info(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let predictor = state.predictor()?;
    Ok(Json(serde_json::to_value(predictor.metadata())?))
}
