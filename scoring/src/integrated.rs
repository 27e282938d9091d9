use chrono::{DateTime, Utc};
use common::config::BlendSettings;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{
    features::{self, TelemetrySample},
    model::DEGRADED_RISK_SCORE,
    scorers::Scorer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoringMethod {
    InsufficientData,
    MlEnhanced,
    TraditionalFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventStat {
    pub count: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactors {
    pub speed_violations: EventStat,
    pub harsh_events: EventStat,
    pub phone_usage: EventStat,
    pub night_driving: EventStat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySummary {
    pub total_trips: usize,
    pub total_data_points: usize,
    pub avg_speed: i64,
    pub max_speed: i64,
    pub total_harsh_events: usize,
    pub phone_usage_events: usize,
    pub time_span: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub total_data_points: usize,
    pub time_span: u32,
    pub sufficient_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_score: i64,
    pub method: ScoringMethod,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traditional_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factors: Option<RiskFactors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry_summary: Option<TelemetrySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQuality>,
    pub generated_at: DateTime<Utc>,
}

const INSUFFICIENT_DATA_SCORE: i64 = 50;
const INSUFFICIENT_DATA_CONFIDENCE: f64 = 0.5;
const TRADITIONAL_CONFIDENCE: f64 = 0.9;

/// Rule-based score over raw telemetry, bounded to [0, 100].
pub fn traditional_score(samples: &[TelemetrySample]) -> f64 {
    if samples.is_empty() {
        return 50.0;
    }

    let mut risk_score = 30.0;
    risk_score += (features::average_speed(samples) - 45.0) * 0.5;
    risk_score += features::share(samples, TelemetrySample::is_speeding) * 100.0;
    risk_score += features::share(samples, |s| s.events.harsh_braking) * 80.0;
    risk_score += features::share(samples, |s| s.events.harsh_acceleration) * 70.0;
    risk_score += features::share(samples, |s| s.events.harsh_turning) * 60.0;
    risk_score += features::share(samples, |s| s.events.phone_usage) * 120.0;
    risk_score += features::share(samples, TelemetrySample::is_night) * 25.0;
    risk_score += features::share(samples, TelemetrySample::in_bad_weather) * 35.0;

    f64::min(100.0, f64::max(0.0, risk_score))
}

fn event_stat(samples: &[TelemetrySample], predicate: impl Fn(&TelemetrySample) -> bool) -> EventStat {
    let count = features::count(samples, predicate);
    EventStat {
        count,
        rate: count as f64 / samples.len() as f64,
    }
}

pub fn risk_factors(samples: &[TelemetrySample]) -> Option<RiskFactors> {
    if samples.is_empty() {
        return None;
    }

    Some(RiskFactors {
        speed_violations: event_stat(samples, TelemetrySample::is_speeding),
        harsh_events: event_stat(samples, TelemetrySample::has_harsh_event),
        phone_usage: event_stat(samples, |s| s.events.phone_usage),
        night_driving: event_stat(samples, TelemetrySample::is_night),
    })
}

pub fn summarize(samples: &[TelemetrySample]) -> Option<TelemetrySummary> {
    if samples.is_empty() {
        return None;
    }

    Some(TelemetrySummary {
        total_trips: features::distinct_trips(samples),
        total_data_points: samples.len(),
        avg_speed: round_half_up(features::average_speed(samples)),
        max_speed: round_half_up(features::max_speed(samples)),
        total_harsh_events: features::count(samples, TelemetrySample::has_harsh_event),
        phone_usage_events: features::count(samples, |s| s.events.phone_usage),
        time_span: format!("{} days", features::time_span_days(samples)),
    })
}

fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Blends a [`Scorer`] with the traditional score, falling back to the
/// latter whenever the scorer fails or is not confident enough.
pub struct IntegratedScorer<S: Scorer> {
    scorer: S,
    settings: BlendSettings,
}

impl<S: Scorer> IntegratedScorer<S> {
    pub fn new(scorer: S) -> Self {
        Self::with_settings(scorer, BlendSettings::default())
    }

    pub fn with_settings(scorer: S, settings: BlendSettings) -> Self {
        Self { scorer, settings }
    }

    pub fn settings(&self) -> &BlendSettings {
        &self.settings
    }

    pub fn assess(&self, samples: &[TelemetrySample]) -> RiskAssessment {
        if samples.len() < self.settings.min_samples {
            tracing::info!(
                samples = samples.len(),
                required = self.settings.min_samples,
                "Not enough telemetry for a risk assessment"
            );
            return RiskAssessment {
                risk_score: INSUFFICIENT_DATA_SCORE,
                method: ScoringMethod::InsufficientData,
                confidence: INSUFFICIENT_DATA_CONFIDENCE,
                message: Some("Need more driving data for accurate scoring".to_string()),
                ml_score: None,
                traditional_score: None,
                factors: None,
                telemetry_summary: None,
                data_quality: None,
                generated_at: Utc::now(),
            };
        }

        tracing::info!(samples = samples.len(), scorer = self.scorer.name(), "Computing risk assessment");

        let traditional = traditional_score(samples);
        let ml_record = features::extract_features(samples).and_then(|features| {
            match self.scorer.score(&features) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        scorer = self.scorer.name(),
                        "Scorer failed, using traditional score"
                    );
                    None
                }
            }
        });

        let (final_score, method, confidence) = match &ml_record {
            Some(record) if record.confidence >= self.settings.ml_confidence_threshold => {
                let weight = record.confidence.min(self.settings.max_ml_weight);
                (
                    record.risk_score * weight + traditional * (1.0 - weight),
                    ScoringMethod::MlEnhanced,
                    record.confidence,
                )
            }
            _ => (traditional, ScoringMethod::TraditionalFallback, TRADITIONAL_CONFIDENCE),
        };

        tracing::debug!(%method, final_score, traditional, "Risk assessment complete");

        RiskAssessment {
            risk_score: round_half_up(final_score),
            method,
            confidence,
            message: None,
            ml_score: Some(
                ml_record
                    .map(|record| record.risk_score)
                    .unwrap_or(f64::from(DEGRADED_RISK_SCORE)),
            ),
            traditional_score: Some(traditional),
            factors: risk_factors(samples),
            telemetry_summary: summarize(samples),
            data_quality: Some(DataQuality {
                total_data_points: samples.len(),
                time_span: self.settings.window_days,
                sufficient_data: samples.len() >= self.settings.sufficient_data_points,
            }),
            generated_at: Utc::now(),
        }
    }
}
