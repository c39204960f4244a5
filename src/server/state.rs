//! Application state management

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::export::ArtifactStore;
use crate::inference::Predictor;

use super::error::ServerError;
use super::ServerConfig;

/// Application state shared across handlers.
///
/// The predictor is loaded once; when loading fails the service keeps
/// running in an unhealthy state and reports the reason.
pub struct AppState {
    pub config: ServerConfig,
    predictor: Option<Arc<Predictor>>,
    load_error: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Load the artifact bundle from the configured models directory
    pub fn load(config: ServerConfig) -> Self {
        let store = ArtifactStore::new(&config.models_dir);
        match Predictor::load(&store) {
            Ok(predictor) => {
                info!(
                    models_dir = %config.models_dir.display(),
                    model_type = %predictor.metadata().model_type,
                    "Model and scaler loaded"
                );
                Self::with_predictor(config, predictor)
            }
            Err(e) => {
                warn!(models_dir = %config.models_dir.display(), error = %e, "Model failed to load, starting unhealthy");
                Self::unhealthy(config, e.to_string())
            }
        }
    }

    pub fn with_predictor(config: ServerConfig, predictor: Predictor) -> Self {
        Self {
            config,
            predictor: Some(Arc::new(predictor)),
            load_error: None,
            started_at: Utc::now(),
        }
    }

    pub fn unhealthy(config: ServerConfig, reason: impl Into<String>) -> Self {
        Self {
            config,
            predictor: None,
            load_error: Some(reason.into()),
            started_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// The loaded predictor, or 503 when the service is unhealthy
    pub fn predictor(&self) -> Result<Arc<Predictor>, ServerError> {
        self.predictor.clone().ok_or_else(|| {
            ServerError::Unavailable(format!(
                "model is not loaded: {}",
                self.load_error.as_deref().unwrap_or("unknown reason")
            ))
        })
    }
}
