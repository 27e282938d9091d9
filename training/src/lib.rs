//! Offline training of the accident risk classifier: CSV preparation,
//! model fitting and selection, and the JSON artifacts the result is
//! shipped as.

pub mod artifacts;
pub mod dataset;
pub mod executable_utils;
pub mod metrics;
pub mod models;
pub mod scaler;
pub mod trainer;

pub use artifacts::{ArtifactBundle, ArtifactError, ModelMetadata};
pub use dataset::{Dataset, DatasetError};
pub use models::{Classifier, ModelKind, TrainedModel};
pub use trainer::{Trainer, TrainingError, TrainingOutcome};
