use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{
    dataset::TARGET_CLASSES,
    models::{argmax, Classifier, ModelKind, TrainedModel},
    scaler::{ScalerError, StandardScaler},
};

pub const MODEL_FILE: &str = "risk_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed artifact {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("feature '{0}' is missing from the input")]
    MissingFeature(String),

    #[error("artifact set is inconsistent: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Scaler(#[from] ScalerError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: ModelKind,
    pub accuracy: f64,
    pub features: Vec<String>,
    pub target_classes: Vec<String>,
    pub training_samples: usize,
}

impl ModelMetadata {
    pub fn new(model_type: ModelKind, accuracy: f64, features: Vec<String>, training_samples: usize) -> Self {
        Self {
            model_type,
            accuracy,
            features,
            target_classes: TARGET_CLASSES.iter().map(|c| c.to_string()).collect(),
            training_samples,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPrediction {
    pub class_index: usize,
    pub label: String,
    pub probabilities: Vec<f64>,
}

/// Everything needed to score a raw feature row: model, scaler, feature
/// order and the metadata describing them.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub model: TrainedModel,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
    pub metadata: ModelMetadata,
}

fn write_json<T: Serialize>(dir: &Path, file_name: &str, value: &T) -> Result<(), ArtifactError> {
    let path = dir.join(file_name);
    let io_error = |source: std::io::Error| ArtifactError::Io {
        path: path.clone(),
        source,
    };

    let mut writer = BufWriter::new(File::create(&path).map_err(io_error)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ArtifactError::Json {
        path: path.clone(),
        source,
    })?;
    writer.flush().map_err(io_error)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(dir: &Path, file_name: &str) -> Result<T, ArtifactError> {
    let path = dir.join(file_name);
    let file = File::open(&path).map_err(|source| ArtifactError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::Json { path, source })
}

impl ArtifactBundle {
    /// Writes the four artifact files, creating `dir` when needed.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        write_json(dir, MODEL_FILE, &self.model)?;
        write_json(dir, SCALER_FILE, &self.scaler)?;
        write_json(dir, FEATURE_NAMES_FILE, &self.feature_names)?;
        write_json(dir, METADATA_FILE, &self.metadata)?;

        tracing::info!(dir = %dir.display(), model = %self.metadata.model_type, "Saved model artifacts");
        Ok(())
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();
        let bundle = Self {
            model: read_json(dir, MODEL_FILE)?,
            scaler: read_json(dir, SCALER_FILE)?,
            feature_names: read_json(dir, FEATURE_NAMES_FILE)?,
            metadata: read_json(dir, METADATA_FILE)?,
        };

        if bundle.scaler.n_features() != bundle.feature_names.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "scaler expects {} features, feature list has {}",
                bundle.scaler.n_features(),
                bundle.feature_names.len()
            )));
        }
        if bundle.metadata.features != bundle.feature_names {
            return Err(ArtifactError::Inconsistent(format!(
                "metadata lists features {:?}, feature list has {:?}",
                bundle.metadata.features, bundle.feature_names
            )));
        }
        if let Some(index) = bundle
            .model
            .max_feature_index()
            .filter(|&index| index >= bundle.feature_names.len())
        {
            return Err(ArtifactError::Inconsistent(format!(
                "model splits on feature {index}, feature list has {}",
                bundle.feature_names.len()
            )));
        }
        if bundle.model.kind() != bundle.metadata.model_type {
            return Err(ArtifactError::Inconsistent(format!(
                "model file holds {}, metadata says {}",
                bundle.model.kind(),
                bundle.metadata.model_type
            )));
        }

        tracing::debug!(dir = %dir.display(), model = %bundle.metadata.model_type, "Loaded model artifacts");
        Ok(bundle)
    }

    /// Orders `values` by the persisted feature list, scales them and predicts.
    pub fn predict_named(&self, values: &HashMap<String, f64>) -> Result<ClassPrediction, ArtifactError> {
        let row = self
            .feature_names
            .iter()
            .map(|name| {
                values
                    .get(name)
                    .copied()
                    .ok_or_else(|| ArtifactError::MissingFeature(name.clone()))
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let scaled = self.scaler.transform_row(&row)?;
        let probabilities = self.model.predict_proba(&scaled);
        let class_index = argmax(&probabilities);
        let label = self
            .metadata
            .target_classes
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| class_index.to_string());

        Ok(ClassPrediction {
            class_index,
            label,
            probabilities,
        })
    }
}
