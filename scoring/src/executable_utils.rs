use serde_json::Value;
use std::{fs::OpenOptions, panic, sync::Mutex};
use tracing_subscriber::EnvFilter;

use crate::{
    model::{json_kind, Prediction, RiskRecord, ScoreError},
    scorers::{HeuristicScorer, Scorer},
};

/// Names a file that receives the predictor's diagnostics. Standard error
/// is reserved, so without it the predictor logs nothing.
pub const LOG_FILE_ENV: &str = "RISK_SCORER_LOG_FILE";

pub fn initialize_predictor() {
    if let Ok(path) = std::env::var(LOG_FILE_ENV) {
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
    }

    // Panics are converted into degraded output; keep the default hook off stderr.
    panic::set_hook(Box::new(|info| {
        tracing::error!("Predictor panicked: {}", info);
    }));
}

/// Parses the command line argument and scores it.
pub fn predict_from_argument(argument: Option<&str>) -> Result<RiskRecord, ScoreError> {
    let raw = argument.ok_or(ScoreError::MissingArgument)?;
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Object(features) => HeuristicScorer::default().score(&features),
        other => Err(ScoreError::NotAnObject {
            kind: json_kind(&other),
        }),
    }
}

/// Total: every failure, including a panic, becomes a degraded prediction.
pub fn run_prediction(argument: Option<String>) -> Prediction {
    match panic::catch_unwind(|| predict_from_argument(argument.as_deref())) {
        Ok(result) => {
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Returning degraded prediction");
            }
            Prediction::from(result)
        }
        Err(_) => Prediction::from(Err::<RiskRecord, _>(ScoreError::Internal)),
    }
}
