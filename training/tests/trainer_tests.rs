mod fixtures;

use std::collections::HashMap;
use tempfile::TempDir;
use training::{
    artifacts::{ArtifactBundle, ArtifactError, FEATURE_NAMES_FILE, METADATA_FILE, MODEL_FILE, SCALER_FILE},
    dataset::FEATURE_NAMES,
    models::{
        tree::{DecisionTree, Node},
        RandomForest,
    },
    scaler::StandardScaler,
    trainer::{select_model, Trainer},
    ModelKind, ModelMetadata, TrainedModel,
};

fn write_dataset(dir: &TempDir, rows_per_class: usize) -> String {
    let path = dir.path().join("accidents.csv");
    std::fs::write(&path, fixtures::synthetic_csv(rows_per_class)).unwrap();
    path.to_string_lossy().into_owned()
}

fn named_row(distance: f64) -> HashMap<String, f64> {
    let values = [distance, 55.0, 6.0, 8.0, 13.0, 2.0, 6.0, 1.0];
    FEATURE_NAMES
        .iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[test]
fn test_ties_keep_the_random_forest() {
    assert_eq!(select_model(0.8, 0.8), ModelKind::RandomForest);
    assert_eq!(select_model(0.8, 0.7), ModelKind::RandomForest);
    assert_eq!(select_model(0.8, 0.81), ModelKind::GradientBoosting);
}

#[test]
fn test_train_selects_and_reports() {
    let dataset = fixtures::synthetic_dataset(30);
    let trainer = Trainer::new(fixtures::quick_config("unused.csv", "unused"));

    let outcome = trainer.train(&dataset).unwrap();

    let expected = select_model(outcome.random_forest_accuracy, outcome.gradient_boosting_accuracy);
    assert_eq!(outcome.selected, expected);
    assert_eq!(outcome.bundle.model.kind(), expected);
    assert_eq!(outcome.bundle.metadata.model_type, expected);
    assert_eq!(outcome.bundle.metadata.training_samples, 72);
    assert_eq!(outcome.report.support, 18);
    assert_eq!(outcome.report.classes.len(), 3);
    assert_eq!(outcome.report.accuracy, outcome.bundle.metadata.accuracy);
    assert!(outcome.bundle.metadata.accuracy >= 0.9);
}

#[test]
fn test_run_writes_loadable_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let dataset_path = write_dataset(&dir, 30);
    let output_dir = dir.path().join("nested").join("ml_models");
    let config = fixtures::quick_config(&dataset_path, &output_dir.to_string_lossy());

    let outcome = Trainer::new(config).run().unwrap();

    for file in [MODEL_FILE, SCALER_FILE, FEATURE_NAMES_FILE, METADATA_FILE] {
        assert!(output_dir.join(file).is_file(), "{file} was not written");
    }

    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.join(METADATA_FILE)).unwrap()).unwrap();
    assert_eq!(metadata["model_type"], serde_json::json!(outcome.selected.to_string()));
    assert_eq!(
        metadata["target_classes"],
        serde_json::json!(["Low Risk", "Medium Risk", "High Risk"])
    );
    assert_eq!(metadata["features"], serde_json::json!(FEATURE_NAMES));
    assert_eq!(metadata["training_samples"], serde_json::json!(72));

    let bundle = ArtifactBundle::load(&output_dir).unwrap();
    assert_eq!(bundle.feature_names, outcome.bundle.feature_names);
    assert_eq!(bundle.metadata.model_type, outcome.selected);
    assert_eq!(bundle.model.kind(), outcome.selected);

    let low = bundle.predict_named(&named_row(0.3)).unwrap();
    let high = bundle.predict_named(&named_row(25.0)).unwrap();
    assert_eq!(low.class_index, 0);
    assert_eq!(low.label, "Low Risk");
    assert_eq!(high.class_index, 2);
    assert_eq!(high.label, "High Risk");
    assert_eq!(
        low.class_index,
        outcome.bundle.predict_named(&named_row(0.3)).unwrap().class_index
    );
}

#[test]
fn test_predict_named_requires_every_feature() {
    let dataset = fixtures::synthetic_dataset(10);
    let outcome = Trainer::new(fixtures::quick_config("unused.csv", "unused"))
        .train(&dataset)
        .unwrap();
    let mut row = named_row(1.0);
    row.remove("month");

    let error = outcome.bundle.predict_named(&row).unwrap_err();

    assert!(matches!(error, ArtifactError::MissingFeature(name) if name == "month"));
}

#[test]
fn test_load_from_empty_directory_fails() {
    let dir = tempfile::tempdir().unwrap();

    let error = ArtifactBundle::load(dir.path()).unwrap_err();

    assert!(matches!(error, ArtifactError::Io { .. }));
}

#[test]
fn test_run_fails_on_missing_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixtures::quick_config(
        &dir.path().join("absent.csv").to_string_lossy(),
        &dir.path().join("out").to_string_lossy(),
    );

    assert!(Trainer::new(config).run().is_err());
    assert!(!dir.path().join("out").exists());
}

fn two_feature_bundle(split_feature: usize) -> ArtifactBundle {
    let feature_names = vec!["speed".to_string(), "distance".to_string()];
    let leaf = |p: f64| Box::new(Node::Leaf { value: vec![p, 1.0 - p] });
    let tree = DecisionTree {
        root: Node::Split {
            feature: split_feature,
            threshold: 0.0,
            left: leaf(1.0),
            right: leaf(0.0),
        },
    };

    ArtifactBundle {
        model: TrainedModel::RandomForest(RandomForest {
            n_classes: 2,
            trees: vec![tree],
        }),
        scaler: StandardScaler::fit(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(),
        metadata: ModelMetadata::new(ModelKind::RandomForest, 1.0, feature_names.clone(), 2),
        feature_names,
    }
}

#[test]
fn test_load_accepts_splits_within_feature_list() {
    let dir = tempfile::tempdir().unwrap();
    two_feature_bundle(1).write(dir.path()).unwrap();

    let bundle = ArtifactBundle::load(dir.path()).unwrap();

    let row = HashMap::from([("speed".to_string(), 2.0), ("distance".to_string(), 1.0)]);
    assert_eq!(bundle.predict_named(&row).unwrap().class_index, 0);
}

#[test]
fn test_load_rejects_model_splitting_past_feature_list() {
    let dir = tempfile::tempdir().unwrap();
    two_feature_bundle(5).write(dir.path()).unwrap();

    let error = ArtifactBundle::load(dir.path()).unwrap_err();

    assert!(matches!(error, ArtifactError::Inconsistent(message) if message.contains("feature 5")));
}

#[test]
fn test_load_rejects_metadata_with_other_features() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = two_feature_bundle(0);
    bundle.metadata.features = vec!["distance".to_string(), "speed".to_string()];
    bundle.write(dir.path()).unwrap();

    let error = ArtifactBundle::load(dir.path()).unwrap_err();

    assert!(matches!(error, ArtifactError::Inconsistent(message) if message.contains("metadata")));
}
