pub mod gradient_boosting;
pub mod random_forest;
pub mod tree;

pub use gradient_boosting::GradientBoosting;
pub use random_forest::RandomForest;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::dataset::Dataset;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("cannot train on an empty dataset")]
    EmptyTrainingSet,

    #[error("label {label} is outside the {n_classes} known classes")]
    UnknownClass { label: usize, n_classes: usize },

    #[error("feature rows must all have {expected} values, found one with {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting {
        name: &'static str,
        reason: &'static str,
    },
}

pub(crate) fn validate_training_set(dataset: &Dataset, n_classes: usize) -> Result<(), ModelError> {
    if dataset.n_samples() == 0 || dataset.features.len() != dataset.n_samples() {
        return Err(ModelError::EmptyTrainingSet);
    }
    let expected = dataset.n_features();
    if let Some(row) = dataset.features.iter().find(|row| row.len() != expected) {
        return Err(ModelError::DimensionMismatch {
            expected,
            actual: row.len(),
        });
    }
    if let Some(&label) = dataset.labels.iter().find(|&&label| label >= n_classes) {
        return Err(ModelError::UnknownClass { label, n_classes });
    }
    Ok(())
}

/// Index of the largest probability; ties go to the lowest class index.
pub fn argmax(probabilities: &[f64]) -> usize {
    probabilities
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (class, &p)| if p > best.1 { (class, p) } else { best })
        .0
}

/// A fitted multi-class model over scaled feature rows.
pub trait Classifier {
    fn n_classes(&self) -> usize;

    fn predict_proba(&self, row: &[f64]) -> Vec<f64>;

    fn predict(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    fn predict_all(&self, rows: &[Vec<f64>]) -> Vec<usize> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum TrainedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    /// Highest feature index read by any tree; rows must be longer than this.
    pub fn max_feature_index(&self) -> Option<usize> {
        match self {
            TrainedModel::RandomForest(model) => model.trees.iter().filter_map(|tree| tree.root.max_feature()).max(),
            TrainedModel::GradientBoosting(model) => model
                .stages
                .iter()
                .flatten()
                .filter_map(|tree| tree.root.max_feature())
                .max(),
        }
    }
}

impl Classifier for TrainedModel {
    fn n_classes(&self) -> usize {
        match self {
            TrainedModel::RandomForest(model) => model.n_classes(),
            TrainedModel::GradientBoosting(model) => model.n_classes(),
        }
    }

    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        match self {
            TrainedModel::RandomForest(model) => model.predict_proba(row),
            TrainedModel::GradientBoosting(model) => model.predict_proba(row),
        }
    }
}
