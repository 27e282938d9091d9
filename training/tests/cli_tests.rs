use clap::Parser;
use training::executable_utils::Args;

#[test]
fn test_default_config_path() {
    let args = Args::try_parse_from(["train"]).unwrap();

    assert_eq!(args.config, "training/config/dev.yaml");
    assert!(args.dataset.is_none());
}

#[test]
fn test_shipped_config_with_overrides() {
    let args = Args::try_parse_from([
        "train",
        "--config",
        "config/dev.yaml",
        "--dataset",
        "/data/accidents.csv",
        "--output-dir",
        "/tmp/models",
    ])
    .unwrap();

    let config = args.load_config().unwrap();

    assert_eq!(config.trainer.dataset_path, "/data/accidents.csv");
    assert_eq!(config.trainer.output_dir, "/tmp/models");
    assert_eq!(config.trainer.random_forest.n_estimators, 100);
    assert_eq!(config.trainer.gradient_boosting.max_depth, 6);
    assert_eq!(config.trainer.preprocessing.default_weather_risk, 2.0);
    assert_eq!(config.common.log_level, "info");
}

#[test]
fn test_unreadable_config_is_an_error() {
    let args = Args::try_parse_from(["train", "-c", "config/missing.yaml"]).unwrap();

    let error = args.load_config().unwrap_err();

    assert!(error.to_string().contains("config/missing.yaml"));
}
