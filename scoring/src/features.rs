use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

use crate::model::FeatureMap;

pub const SPEEDING_THRESHOLD: f64 = 70.0;
pub const BAD_WEATHER_ROAD_RISK: f64 = 0.5;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrivingEvents {
    pub harsh_braking: bool,
    pub harsh_acceleration: bool,
    pub harsh_turning: bool,
    pub phone_usage: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeatherSnapshot {
    pub condition: Option<String>,
    pub temperature: Option<f64>,
    pub visibility: Option<f64>,
    pub road_risk: Option<f64>,
}

/// One reading reported by a vehicle's telematics unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub speed: f64,
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    pub events: DrivingEvents,
    #[serde(default)]
    pub weather: Option<WeatherSnapshot>,
}

impl TelemetrySample {
    pub fn new(timestamp: DateTime<Utc>, speed: f64) -> Self {
        Self {
            timestamp,
            speed,
            trip_id: None,
            events: DrivingEvents::default(),
            weather: None,
        }
    }

    pub fn is_speeding(&self) -> bool {
        self.speed > SPEEDING_THRESHOLD
    }

    /// Hours are taken in UTC.
    pub fn is_night(&self) -> bool {
        let hour = self.timestamp.hour();
        hour < 6 || hour > 22
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.timestamp.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn has_harsh_event(&self) -> bool {
        self.events.harsh_braking || self.events.harsh_acceleration || self.events.harsh_turning
    }

    pub fn in_bad_weather(&self) -> bool {
        self.weather
            .as_ref()
            .and_then(|w| w.road_risk)
            .is_some_and(|risk| risk > BAD_WEATHER_ROAD_RISK)
    }
}

/// Share of samples matching `predicate`. Callers guarantee a non-empty slice.
pub(crate) fn share(samples: &[TelemetrySample], predicate: impl Fn(&TelemetrySample) -> bool) -> f64 {
    count(samples, predicate) as f64 / samples.len() as f64
}

pub(crate) fn count(samples: &[TelemetrySample], predicate: impl Fn(&TelemetrySample) -> bool) -> usize {
    samples.iter().filter(|s| predicate(s)).count()
}

pub(crate) fn average_speed(samples: &[TelemetrySample]) -> f64 {
    samples.iter().map(|s| s.speed).sum::<f64>() / samples.len() as f64
}

pub(crate) fn max_speed(samples: &[TelemetrySample]) -> f64 {
    samples.iter().map(|s| s.speed).fold(f64::NEG_INFINITY, f64::max)
}

/// Distinct trip ids; samples without an id together count as one trip.
pub(crate) fn distinct_trips(samples: &[TelemetrySample]) -> usize {
    samples
        .iter()
        .map(|s| s.trip_id.as_deref())
        .collect::<HashSet<_>>()
        .len()
}

/// Whole days (rounded up) between the oldest and newest sample.
pub(crate) fn time_span_days(samples: &[TelemetrySample]) -> i64 {
    let newest = samples.iter().map(|s| s.timestamp).max();
    let oldest = samples.iter().map(|s| s.timestamp).min();
    match (newest, oldest) {
        (Some(newest), Some(oldest)) => {
            ((newest - oldest).num_milliseconds() as f64 / MILLIS_PER_DAY).ceil() as i64
        }
        _ => 0,
    }
}

fn speed_variance(samples: &[TelemetrySample], mean: f64) -> f64 {
    samples.iter().map(|s| (s.speed - mean).powi(2)).sum::<f64>() / samples.len() as f64
}

/// Aggregates raw telemetry into the feature map the scorers consume.
///
/// Returns `None` for an empty slice, where no rate is defined.
pub fn extract_features(samples: &[TelemetrySample]) -> Option<FeatureMap> {
    if samples.is_empty() {
        return None;
    }

    let avg_speed = average_speed(samples);
    let total_trips = distinct_trips(samples);

    let mut features = FeatureMap::new();
    features.insert("avg_speed".into(), json!(avg_speed));
    features.insert("max_speed".into(), json!(max_speed(samples)));
    features.insert("speed_variance".into(), json!(speed_variance(samples, avg_speed)));
    features.insert("speeding_rate".into(), json!(share(samples, TelemetrySample::is_speeding)));

    features.insert(
        "harsh_braking_rate".into(),
        json!(share(samples, |s| s.events.harsh_braking)),
    );
    features.insert(
        "harsh_accel_rate".into(),
        json!(share(samples, |s| s.events.harsh_acceleration)),
    );
    features.insert(
        "harsh_turning_rate".into(),
        json!(share(samples, |s| s.events.harsh_turning)),
    );
    features.insert(
        "phone_usage_rate".into(),
        json!(share(samples, |s| s.events.phone_usage)),
    );

    features.insert("night_driving_rate".into(), json!(share(samples, TelemetrySample::is_night)));
    features.insert(
        "weekend_driving_rate".into(),
        json!(share(samples, TelemetrySample::is_weekend)),
    );

    features.insert("total_trips".into(), json!(total_trips));
    features.insert(
        "avg_trip_length".into(),
        json!(samples.len() as f64 / total_trips as f64),
    );

    features.insert(
        "bad_weather_rate".into(),
        json!(share(samples, TelemetrySample::in_bad_weather)),
    );

    features.insert("data_points".into(), json!(samples.len()));
    features.insert("time_span_days".into(), json!(time_span_days(samples)));

    tracing::debug!(samples = samples.len(), trips = total_trips, "Extracted telemetry features");
    Some(features)
}
