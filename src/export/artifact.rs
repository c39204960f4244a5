//! On-disk model bundle: model blob, scaler blob and metadata document

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

use super::metadata::{normalize, ModelMetadata, NumericValue};
use crate::error::{Result, VintnerError};
use crate::preprocessing::Scaler;
use crate::training::TrainedModel;

pub const MODEL_FILE: &str = "best_wine_model.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const METADATA_FILE: &str = "model_metadata.json";

/// Format version shared by the three files of one bundle
pub const ARTIFACT_FORMAT_VERSION: &str = "1.0.0";

const MAGIC: [u8; 4] = *b"VNTR";

/// Binary wrapper around each blob
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    magic: [u8; 4],
    version: String,
    kind: String,
    payload: T,
}

/// A loaded, validated bundle
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub model: TrainedModel,
    pub scaler: Scaler,
    pub metadata: ModelMetadata,
}

/// Paths written by [`ArtifactStore::save`]
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub metadata: PathBuf,
}

/// Reads and writes bundles in one models directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Whether all three files are present
    pub fn exists(&self) -> bool {
        self.model_path().is_file() && self.scaler_path().is_file() && self.metadata_path().is_file()
    }

    /// Write the bundle. The metadata tree is normalized to JSON first and
    /// stamped with the format version.
    pub fn save(&self, model: &TrainedModel, scaler: &Scaler, metadata: &NumericValue) -> Result<ArtifactPaths> {
        fs::create_dir_all(&self.dir)?;

        let mut document = normalize(metadata);
        match document.as_object_mut() {
            Some(map) => {
                map.insert("version".to_string(), ARTIFACT_FORMAT_VERSION.into());
            }
            None => {
                return Err(VintnerError::SerializationError(
                    "metadata must be a mapping".to_string(),
                ))
            }
        }
        // Fail before touching disk if the document is not a valid bundle record
        ModelMetadata::from_json(document.clone())?;

        let paths = ArtifactPaths {
            model: self.model_path(),
            scaler: self.scaler_path(),
            metadata: self.metadata_path(),
        };

        write_blob(&paths.model, "model", model)?;
        write_blob(&paths.scaler, "scaler", scaler)?;

        let file = File::create(&paths.metadata)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &document)?;

        info!(
            model = %paths.model.display(),
            scaler = %paths.scaler.display(),
            metadata = %paths.metadata.display(),
            "Artifacts saved"
        );
        Ok(paths)
    }

    /// Load and validate all three files
    pub fn load(&self) -> Result<ModelArtifact> {
        let model: TrainedModel = read_blob(&self.model_path(), "model")?;
        let scaler: Scaler = read_blob(&self.scaler_path(), "scaler")?;
        let metadata = self.load_metadata()?;

        let metadata_path = self.metadata_path();
        if metadata.feature_names.len() != scaler.n_features() {
            return Err(load_error(
                &metadata_path,
                format!(
                    "metadata lists {} features but the scaler was fitted on {}",
                    metadata.feature_names.len(),
                    scaler.n_features()
                ),
            ));
        }
        if metadata.classes.is_empty() {
            return Err(load_error(&metadata_path, "metadata lists no classes"));
        }

        Ok(ModelArtifact { model, scaler, metadata })
    }

    pub fn load_metadata(&self) -> Result<ModelMetadata> {
        let path = self.metadata_path();
        let file = File::open(&path).map_err(|e| load_error(&path, e))?;
        let document: serde_json::Value =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| load_error(&path, e))?;
        let metadata = ModelMetadata::from_json(document).map_err(|e| load_error(&path, e))?;
        match metadata.version.as_deref() {
            Some(ARTIFACT_FORMAT_VERSION) | None => Ok(metadata),
            Some(other) => Err(load_error(
                &path,
                format!("format version {} is not supported (expected {})", other, ARTIFACT_FORMAT_VERSION),
            )),
        }
    }
}

fn write_blob<T: Serialize>(path: &Path, kind: &str, payload: &T) -> Result<()> {
    let envelope = Envelope {
        magic: MAGIC,
        version: ARTIFACT_FORMAT_VERSION.to_string(),
        kind: kind.to_string(),
        payload,
    };
    let file = File::create(path)?;
    bincode::serialize_into(BufWriter::new(file), &envelope)?;
    Ok(())
}

fn read_blob<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| load_error(path, e))?;
    let envelope: Envelope<T> = bincode::deserialize(&bytes).map_err(|e| load_error(path, e))?;

    if envelope.magic != MAGIC {
        return Err(load_error(path, "not a vintner artifact"));
    }
    if envelope.version != ARTIFACT_FORMAT_VERSION {
        return Err(load_error(
            path,
            format!(
                "format version {} is not supported (expected {})",
                envelope.version, ARTIFACT_FORMAT_VERSION
            ),
        ));
    }
    if envelope.kind != kind {
        return Err(load_error(path, format!("expected a {} blob, found {}", kind, envelope.kind)));
    }
    Ok(envelope.payload)
}

fn load_error(path: &Path, reason: impl ToString) -> VintnerError {
    VintnerError::ArtifactLoad {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
