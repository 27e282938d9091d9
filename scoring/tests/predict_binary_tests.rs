use serde_json::{json, Value};
use std::process::{Command, Output};

fn run_predict(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_predict"))
        .args(args)
        .env_remove("RISK_SCORER_LOG_FILE")
        .output()
        .expect("failed to spawn predict")
}

fn single_json_line(output: &Output) -> Value {
    assert!(output.status.success(), "exit status: {:?}", output.status);
    assert!(output.stderr.is_empty(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "stdout: {stdout}");
    serde_json::from_str(lines[0]).unwrap()
}

fn assert_degraded(value: &Value) {
    assert_eq!(value["confidence"], json!(0));
    assert_eq!(value["risk_score"], json!(50));
    assert!(value["error"].is_string());
}

#[test]
fn test_scores_valid_features() {
    let output = run_predict(&[r#"{"avg_speed":55,"max_speed":85,"harsh_braking_rate":0.03,"phone_usage_rate":0.02,"night_driving_rate":0.2,"data_points":250,"total_trips":25}"#]);

    let value = single_json_line(&output);

    assert_eq!(value["risk_score"], json!(58.31));
    assert_eq!(value["confidence"], json!(0.8));
    assert_eq!(value["risk_level"], json!(2));
    assert_eq!(value["model_version"], json!("v1.2"));
    assert_eq!(value["features_analyzed"], json!(7));
    assert_eq!(value["data_quality_score"], json!(0.5));
    assert_eq!(value["feature_importance"]["speed_factors"], json!(7.5));
}

#[test]
fn test_empty_object_scores_defaults() {
    let value = single_json_line(&run_predict(&["{}"]));

    assert_eq!(value["risk_score"], json!(40.36));
    assert_eq!(value["risk_level"], json!(1));
    assert_eq!(value["features_analyzed"], json!(0));
}

#[test]
fn test_clamped_score_is_printed_as_integer() {
    let value = single_json_line(&run_predict(&[r#"{"avg_speed":120,"max_speed":150,"phone_usage_rate":0.2}"#]));

    assert_eq!(value["risk_score"], json!(95));
    assert!(value["risk_score"].is_u64());
    assert_eq!(value["risk_level"], json!(3));
}

#[test]
fn test_missing_argument_degrades() {
    let value = single_json_line(&run_predict(&[]));
    assert_degraded(&value);
}

#[test]
fn test_malformed_json_degrades() {
    let value = single_json_line(&run_predict(&["{not json"]));
    assert_degraded(&value);
}

#[test]
fn test_non_object_json_degrades() {
    for argument in ["[1,2,3]", "42", "\"text\"", "null"] {
        let value = single_json_line(&run_predict(&[argument]));
        assert_degraded(&value);
    }
}

#[test]
fn test_non_numeric_feature_degrades() {
    let value = single_json_line(&run_predict(&[r#"{"avg_speed":"fast"}"#]));
    assert_degraded(&value);
    assert!(value["error"].as_str().unwrap().contains("avg_speed"));
}

#[test]
fn test_extra_arguments_are_ignored() {
    let value = single_json_line(&run_predict(&["{}", "--verbose", "{\"avg_speed\":90}"]));
    assert_eq!(value["risk_score"], json!(40.36));
}

#[test]
fn test_log_file_keeps_stderr_clean() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("predict.log");

    let output = Command::new(env!("CARGO_BIN_EXE_predict"))
        .arg("[]")
        .env("RISK_SCORER_LOG_FILE", &log_path)
        .env("RUST_LOG", "debug")
        .output()
        .unwrap();

    let value = single_json_line(&output);
    assert_degraded(&value);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("Returning degraded prediction"));
}

#[test]
fn test_output_key_order() {
    let output = run_predict(&["{}"]);
    let stdout = String::from_utf8(output.stdout).unwrap();

    let risk_score = stdout.find("\"risk_score\"").unwrap();
    let confidence = stdout.find("\"confidence\"").unwrap();
    let data_quality = stdout.find("\"data_quality_score\"").unwrap();
    assert!(risk_score < confidence && confidence < data_quality);

    let degraded = String::from_utf8(run_predict(&[]).stdout).unwrap();
    let error = degraded.find("\"error\"").unwrap();
    let confidence = degraded.find("\"confidence\"").unwrap();
    let risk_score = degraded.find("\"risk_score\"").unwrap();
    assert!(error < confidence && confidence < risk_score);
}
