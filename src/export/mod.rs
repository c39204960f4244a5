//! Artifact persistence
//!
//! A bundle is three files sharing one format version:
//! - `best_wine_model.bin`: the tuned model (bincode)
//! - `scaler.bin`: the fitted scaler (bincode)
//! - `model_metadata.json`: normalized metadata

mod artifact;
mod metadata;

pub use artifact::{
    ArtifactPaths, ArtifactStore, ModelArtifact, ARTIFACT_FORMAT_VERSION, METADATA_FILE, MODEL_FILE, SCALER_FILE,
};
pub use metadata::{normalize, ModelMetadata, NumericValue};
