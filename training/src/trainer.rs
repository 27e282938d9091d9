use common::config::TrainerConfig;
use thiserror::Error;

use crate::{
    artifacts::{ArtifactBundle, ArtifactError, ModelMetadata},
    dataset::{load_dataset, Dataset, DatasetError, N_CLASSES, TARGET_CLASSES},
    metrics::{accuracy, ClassificationReport},
    models::{Classifier, GradientBoosting, ModelError, ModelKind, RandomForest, TrainedModel},
    scaler::{ScalerError, StandardScaler},
};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Scaler(#[from] ScalerError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Gradient boosting must beat the forest outright; a tie keeps the forest.
pub fn select_model(random_forest_accuracy: f64, gradient_boosting_accuracy: f64) -> ModelKind {
    if gradient_boosting_accuracy > random_forest_accuracy {
        ModelKind::GradientBoosting
    } else {
        ModelKind::RandomForest
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub selected: ModelKind,
    pub random_forest_accuracy: f64,
    pub gradient_boosting_accuracy: f64,
    pub report: ClassificationReport,
    pub bundle: ArtifactBundle,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Loads the dataset, trains both models and writes the winner's artifacts.
    pub fn run(&self) -> Result<TrainingOutcome, TrainingError> {
        let dataset = load_dataset(&self.config.dataset_path, &self.config.preprocessing)?;
        let outcome = self.train(&dataset)?;
        outcome.bundle.write(&self.config.output_dir)?;
        Ok(outcome)
    }

    /// Split, scale, fit both models and pick one. Touches no files.
    pub fn train(&self, dataset: &Dataset) -> Result<TrainingOutcome, TrainingError> {
        let (train, test) = dataset.stratified_split(self.config.test_ratio, self.config.seed)?;
        tracing::info!(train = train.n_samples(), test = test.n_samples(), "Split dataset");

        let scaler = StandardScaler::fit(&train.features)?;
        let train = Dataset {
            features: scaler.transform(&train.features)?,
            ..train
        };
        let test = Dataset {
            features: scaler.transform(&test.features)?,
            ..test
        };

        let random_forest = RandomForest::fit(&train, N_CLASSES, &self.config.random_forest, self.config.seed)?;
        let gradient_boosting =
            GradientBoosting::fit(&train, N_CLASSES, &self.config.gradient_boosting, self.config.seed)?;

        let random_forest_predictions = random_forest.predict_all(&test.features);
        let gradient_boosting_predictions = gradient_boosting.predict_all(&test.features);
        let random_forest_accuracy = accuracy(&test.labels, &random_forest_predictions);
        let gradient_boosting_accuracy = accuracy(&test.labels, &gradient_boosting_predictions);
        tracing::info!("Random Forest accuracy: {random_forest_accuracy:.3}");
        tracing::info!("Gradient Boosting accuracy: {gradient_boosting_accuracy:.3}");

        let selected = select_model(random_forest_accuracy, gradient_boosting_accuracy);
        let (model, predictions, selected_accuracy) = match selected {
            ModelKind::RandomForest => (
                TrainedModel::RandomForest(random_forest),
                random_forest_predictions,
                random_forest_accuracy,
            ),
            ModelKind::GradientBoosting => (
                TrainedModel::GradientBoosting(gradient_boosting),
                gradient_boosting_predictions,
                gradient_boosting_accuracy,
            ),
        };

        let report = ClassificationReport::new(&test.labels, &predictions, &TARGET_CLASSES);
        tracing::info!(model = %selected, "Selected model");
        tracing::info!("Classification report:\n{report}");

        let metadata = ModelMetadata::new(
            selected,
            selected_accuracy,
            train.feature_names.clone(),
            train.n_samples(),
        );
        let bundle = ArtifactBundle {
            model,
            scaler,
            feature_names: train.feature_names,
            metadata,
        };

        Ok(TrainingOutcome {
            selected,
            random_forest_accuracy,
            gradient_boosting_accuracy,
            report,
            bundle,
        })
    }
}
