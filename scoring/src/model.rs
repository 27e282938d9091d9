use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Raw scorer input: feature name to JSON value, exactly as supplied by the caller.
pub type FeatureMap = Map<String, Value>;

pub const MODEL_VERSION: &str = "v1.2";

/// Neutral score reported whenever a prediction degrades.
pub const DEGRADED_RISK_SCORE: u8 = 50;
pub const DEGRADED_CONFIDENCE: u8 = 0;

pub const MIN_RISK_SCORE: f64 = 5.0;
pub const MAX_RISK_SCORE: f64 = 95.0;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("missing features argument")]
    MissingArgument,

    #[error("invalid features JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("features must be a JSON object, got {kind}")]
    NotAnObject { kind: &'static str },

    #[error("feature '{name}' must be numeric, got {kind}")]
    NonNumericFeature { name: String, kind: &'static str },

    #[error("internal scorer failure")]
    Internal,
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The ten driving-behaviour aggregates the heuristic scorer reads.
///
/// `Default` holds the values substituted for keys missing from the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrivingFeatures {
    pub avg_speed: f64,
    pub max_speed: f64,
    pub harsh_braking_rate: f64,
    pub harsh_accel_rate: f64,
    pub phone_usage_rate: f64,
    pub night_driving_rate: f64,
    pub speeding_rate: f64,
    pub bad_weather_rate: f64,
    pub total_trips: f64,
    pub data_points: f64,
}

impl Default for DrivingFeatures {
    fn default() -> Self {
        Self {
            avg_speed: 40.0,
            max_speed: 60.0,
            harsh_braking_rate: 0.02,
            harsh_accel_rate: 0.02,
            phone_usage_rate: 0.01,
            night_driving_rate: 0.1,
            speeding_rate: 0.05,
            bad_weather_rate: 0.1,
            total_trips: 10.0,
            data_points: 100.0,
        }
    }
}

impl DrivingFeatures {
    /// Reads each recognised key from `features`, falling back to `defaults`.
    pub fn resolve(features: &FeatureMap, defaults: &DrivingFeatures) -> Result<Self, ScoreError> {
        Ok(Self {
            avg_speed: lookup(features, "avg_speed", defaults.avg_speed)?,
            max_speed: lookup(features, "max_speed", defaults.max_speed)?,
            harsh_braking_rate: lookup(features, "harsh_braking_rate", defaults.harsh_braking_rate)?,
            harsh_accel_rate: lookup(features, "harsh_accel_rate", defaults.harsh_accel_rate)?,
            phone_usage_rate: lookup(features, "phone_usage_rate", defaults.phone_usage_rate)?,
            night_driving_rate: lookup(features, "night_driving_rate", defaults.night_driving_rate)?,
            speeding_rate: lookup(features, "speeding_rate", defaults.speeding_rate)?,
            bad_weather_rate: lookup(features, "bad_weather_rate", defaults.bad_weather_rate)?,
            total_trips: lookup(features, "total_trips", defaults.total_trips)?,
            data_points: lookup(features, "data_points", defaults.data_points)?,
        })
    }
}

fn lookup(features: &FeatureMap, name: &str, default: f64) -> Result<f64, ScoreError> {
    match features.get(name) {
        None => Ok(default),
        Some(Value::Number(number)) => number.as_f64().ok_or_else(|| ScoreError::NonNumericFeature {
            name: name.to_string(),
            kind: "number",
        }),
        Some(Value::Bool(flag)) => Ok(if *flag { 1.0 } else { 0.0 }),
        Some(other) => Err(ScoreError::NonNumericFeature {
            name: name.to_string(),
            kind: json_kind(other),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low = 0,
    Medium = 1,
    High = 2,
    VeryHigh = 3,
}

impl RiskLevel {
    /// Buckets a clamped risk score; each upper boundary belongs to the lower level.
    pub fn from_score(risk_score: f64) -> Self {
        if risk_score <= 30.0 {
            RiskLevel::Low
        } else if risk_score <= 50.0 {
            RiskLevel::Medium
        } else if risk_score <= 70.0 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RiskLevel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RiskLevel::Low),
            1 => Ok(RiskLevel::Medium),
            2 => Ok(RiskLevel::High),
            3 => Ok(RiskLevel::VeryHigh),
            other => Err(other),
        }
    }
}

impl Serialize for RiskLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let value = u8::deserialize(deserializer)?;
        RiskLevel::try_from(value)
            .map_err(|other| D::Error::custom(format!("invalid risk level {other}, expected 0-3")))
    }
}

/// Signed per-factor contributions, recomputed from the raw inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub speed_factors: f64,
    pub harsh_events: f64,
    pub phone_usage: f64,
    pub night_driving: f64,
    pub weather_conditions: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    #[serde(serialize_with = "serialize_risk_score")]
    pub risk_score: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub feature_importance: FeatureImportance,
    pub model_version: String,
    pub features_analyzed: usize,
    pub data_quality_score: f64,
}

/// A score pinned to a clamp bound is written as an integer (`95`, not `95.0`).
fn serialize_risk_score<S>(risk_score: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if *risk_score == MIN_RISK_SCORE || *risk_score == MAX_RISK_SCORE {
        serializer.serialize_i64(*risk_score as i64)
    } else {
        serializer.serialize_f64(*risk_score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedRecord {
    pub error: String,
    pub confidence: u8,
    pub risk_score: u8,
}

impl DegradedRecord {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            confidence: DEGRADED_CONFIDENCE,
            risk_score: DEGRADED_RISK_SCORE,
        }
    }
}

/// Caller-facing outcome of a prediction: both variants share one JSON line format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Prediction {
    Scored(RiskRecord),
    Degraded(DegradedRecord),
}

const FALLBACK_LINE: &str = r#"{"error":"failed to serialize prediction","confidence":0,"risk_score":50}"#;

impl Prediction {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Prediction::Degraded(_))
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| FALLBACK_LINE.to_string())
    }
}

impl From<Result<RiskRecord, ScoreError>> for Prediction {
    fn from(result: Result<RiskRecord, ScoreError>) -> Self {
        match result {
            Ok(record) => Prediction::Scored(record),
            Err(e) => Prediction::Degraded(DegradedRecord::new(e.to_string())),
        }
    }
}
