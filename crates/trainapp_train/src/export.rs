//! Model export and import utilities.
//!
//! A trained model is written as a bundle directory:
//! - `model.mpk` - model weights (named MessagePack, full precision)
//! - `metadata.json` - [`ExportMetadata`]
//! - `history.json` - the [`TrainingState`] of the run
//!
//! # Example
//!
//! ```rust,ignore
//! use trainapp_train::export::{save_bundle, ExportMetadata, ModelExport};
//!
//! let metadata = ExportMetadata::new("IrisApp").with_training_stats(learner.state());
//! save_bundle::<B, _>(learner.model(), "./outputs", Some(learner.state()), &metadata)?;
//!
//! let export = ModelExport::load("./outputs")?;
//! let model = load_model::<B, _>(model, export.model_path(), &device)?;
//! ```

use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TrainError};
use crate::learner::{TrainingHistory, TrainingState};
use trainapp_core::HookArgs;

/// Model weights file name.
pub const MODEL_WEIGHTS_FILE: &str = "model.mpk";
/// Training state file name.
pub const HISTORY_FILE: &str = "history.json";
/// Export metadata file name.
pub const METADATA_FILE: &str = "metadata.json";

/// Metadata about an exported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Export format version.
    pub version: String,
    /// Name of the application that produced the model.
    pub app: String,
    /// Export timestamp (seconds since the Unix epoch).
    pub timestamp: String,
    /// Total epochs trained.
    pub epochs_trained: usize,
    /// Monitored value, if any.
    pub monitor: Option<String>,
    /// Best monitored value achieved.
    pub best_value: Option<f32>,
    /// Hook arguments the model was built and trained with.
    #[serde(default)]
    pub args: HookArgs,
}

impl ExportMetadata {
    /// Create new export metadata.
    pub fn new(app: impl Into<String>) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|_| "0".to_string());

        Self {
            version: "1.0".to_string(),
            app: app.into(),
            timestamp,
            epochs_trained: 0,
            monitor: None,
            best_value: None,
            args: HookArgs::new(),
        }
    }

    /// Set training stats.
    #[must_use]
    pub fn with_training_stats(mut self, state: &TrainingState) -> Self {
        self.epochs_trained = state.epoch;
        self.best_value = state.best_value;
        self
    }

    /// Set the monitored value name.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Option<String>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Record the hook arguments.
    #[must_use]
    pub fn with_args(mut self, args: HookArgs) -> Self {
        self.args = args;
        self
    }
}

/// A loaded export bundle.
#[derive(Debug)]
pub struct ModelExport {
    /// Export directory path.
    pub path: PathBuf,
    /// Export metadata.
    pub metadata: ExportMetadata,
    /// Training state, when the bundle has one.
    pub state: Option<TrainingState>,
}

impl ModelExport {
    /// Load an export bundle's metadata and history from a directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let metadata: ExportMetadata = load_json(&path.join(METADATA_FILE))?;

        let history_path = path.join(HISTORY_FILE);
        let state = if history_path.is_file() {
            Some(load_json(&history_path)?)
        } else {
            None
        };

        Ok(Self {
            path,
            metadata,
            state,
        })
    }

    /// Get the model weights path.
    pub fn model_path(&self) -> PathBuf {
        self.path.join(MODEL_WEIGHTS_FILE)
    }

    /// Get training history.
    pub fn history(&self) -> Option<&TrainingHistory> {
        self.state.as_ref().map(|s| &s.history)
    }
}

/// Save a model and its metadata to a bundle directory.
pub fn save_bundle<B, M>(
    model: &M,
    path: impl AsRef<Path>,
    state: Option<&TrainingState>,
    metadata: &ExportMetadata,
) -> Result<PathBuf>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();

    std::fs::create_dir_all(path)
        .map_err(|e| TrainError::CheckpointError(format!("Failed to create directory: {}", e)))?;

    save_model::<B, M>(model, path.join(MODEL_WEIGHTS_FILE))?;
    if let Some(state) = state {
        save_json(state, &path.join(HISTORY_FILE))?;
    }
    save_json(metadata, &path.join(METADATA_FILE))?;

    info!(path = %path.display(), "saved model bundle");
    Ok(path.to_path_buf())
}

/// Save just the model weights.
///
/// The recorder writes `path` with an `.mpk` extension.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path.as_ref().to_path_buf(), &recorder)
        .map_err(|e| TrainError::CheckpointError(format!("Failed to save model: {}", e)))
}

/// Load weights from `path` into `model`.
pub fn load_model<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .load_file(path.as_ref().to_path_buf(), &recorder, device)
        .map_err(|e| TrainError::CheckpointError(format!("Failed to load model: {}", e)))
}

/// Write `data` as pretty-printed JSON.
pub fn save_json<T: Serialize>(data: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| TrainError::SerializationError(format!("Failed to serialize: {}", e)))?;
    std::fs::write(path, json)
        .map_err(|e| TrainError::CheckpointError(format!("Failed to write file: {}", e)))
}

/// Read JSON from `path`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| TrainError::CheckpointError(format!("Failed to read file: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| TrainError::SerializationError(format!("Failed to deserialize: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_metadata() {
        let mut state = TrainingState::default();
        state.epoch = 4;
        state.best_value = Some(0.9);

        let meta = ExportMetadata::new("IrisApp")
            .with_training_stats(&state)
            .with_monitor(Some("accuracy".to_string()))
            .with_args(HookArgs::new().set("hidden_size", 8));

        assert_eq!(meta.app, "IrisApp");
        assert_eq!(meta.epochs_trained, 4);
        assert_eq!(meta.best_value, Some(0.9));
        assert_eq!(meta.args.get::<usize>("hidden_size").unwrap(), 8);
    }

    #[test]
    fn test_metadata_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);
        let meta = ExportMetadata::new("IrisApp").with_args(HookArgs::new().set("lr", 0.5));

        save_json(&meta, &path).unwrap();
        let loaded: ExportMetadata = load_json(&path).unwrap();
        assert_eq!(loaded, meta);
    }

    #[test]
    fn test_load_missing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ModelExport::load(dir.path()),
            Err(TrainError::CheckpointError(_))
        ));
    }
}
