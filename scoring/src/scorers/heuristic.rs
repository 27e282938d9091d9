use crate::{
    model::{
        DrivingFeatures, FeatureImportance, FeatureMap, MAX_RISK_SCORE, MIN_RISK_SCORE, MODEL_VERSION, RiskLevel,
        RiskRecord, ScoreError,
    },
    scorers::Scorer,
};

const BASE_RISK: f64 = 25.0;
const MIN_CONFIDENCE: f64 = 0.5;
const MAX_CONFIDENCE: f64 = 1.0;

/// Hand-tuned driving risk formula. Stateless apart from the default
/// feature table, so one instance can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    defaults: DrivingFeatures,
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: DrivingFeatures) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &DrivingFeatures {
        &self.defaults
    }

    /// Runs the formula over already-resolved features.
    ///
    /// The sequence of additions is significant: reordering it changes the
    /// floating point result in the last bits.
    pub fn evaluate(&self, f: &DrivingFeatures, features_analyzed: usize) -> RiskRecord {
        let mut risk_score = BASE_RISK;

        // Speed
        if f.avg_speed > 60.0 {
            risk_score += (f.avg_speed - 60.0) * 1.2;
        } else if f.avg_speed > 50.0 {
            risk_score += (f.avg_speed - 50.0) * 0.8;
        }
        if f.max_speed > 80.0 {
            risk_score += (f.max_speed - 80.0) * 0.5;
        }

        // Events
        risk_score += f.harsh_braking_rate * 200.0;
        risk_score += f.harsh_accel_rate * 180.0;
        risk_score += f.phone_usage_rate * 300.0;
        risk_score += f.speeding_rate * 150.0;

        // Time of day and weather
        risk_score += f.night_driving_rate * 40.0;
        risk_score += f.bad_weather_rate * 60.0;

        let data_quality_multiplier = 1.0_f64.min(f.data_points / 500.0);
        let trip_quality_multiplier = 1.0_f64.min(f.total_trips / 50.0);

        let confidence = 0.6 + data_quality_multiplier * 0.2 + trip_quality_multiplier * 0.2;

        risk_score *= 0.7 + 0.3 * data_quality_multiplier;

        // Interaction bonuses are added after the rescale, unscaled.
        if f.harsh_braking_rate > 0.05 && f.avg_speed > 55.0 {
            risk_score += 15.0;
        }
        if f.phone_usage_rate > 0.03 && f.night_driving_rate > 0.15 {
            risk_score += 20.0;
        }

        let risk_score = clamp_between(risk_score, MIN_RISK_SCORE, MAX_RISK_SCORE);
        let confidence = clamp_between(confidence, MIN_CONFIDENCE, MAX_CONFIDENCE);

        RiskRecord {
            risk_score: round_to(risk_score, 2),
            confidence: round_to(confidence, 3),
            risk_level: RiskLevel::from_score(risk_score),
            feature_importance: feature_importance(f),
            model_version: MODEL_VERSION.to_string(),
            features_analyzed,
            data_quality_score: round_to(data_quality_multiplier, 2),
        }
    }
}

impl Scorer for HeuristicScorer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn score(&self, features: &FeatureMap) -> Result<RiskRecord, ScoreError> {
        let resolved = DrivingFeatures::resolve(features, &self.defaults)?;
        let record = self.evaluate(&resolved, features.len());
        tracing::debug!(
            risk_score = record.risk_score,
            confidence = record.confidence,
            features_analyzed = record.features_analyzed,
            "Scored driving features"
        );
        Ok(record)
    }
}

/// Independent explanatory terms over the raw inputs; they are not derived
/// from, and need not sum to, the final score.
pub fn feature_importance(f: &DrivingFeatures) -> FeatureImportance {
    FeatureImportance {
        speed_factors: (f.avg_speed - 40.0) * 0.5,
        harsh_events: (f.harsh_braking_rate + f.harsh_accel_rate) * 100.0,
        phone_usage: f.phone_usage_rate * 150.0,
        night_driving: f.night_driving_rate * 30.0,
        weather_conditions: f.bad_weather_rate * 40.0,
    }
}

/// `max(lo, min(hi, value))` with comparison semantics, so NaN lands on `hi`.
fn clamp_between(value: f64, lo: f64, hi: f64) -> f64 {
    let upper = if value < hi { value } else { hi };
    if upper > lo { upper } else { lo }
}

/// Round-half-even on the exact binary value.
pub(crate) fn round_to(value: f64, digits: usize) -> f64 {
    format!("{value:.digits$}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_between_handles_nan() {
        assert_eq!(clamp_between(f64::NAN, 5.0, 95.0), 95.0);
        assert_eq!(clamp_between(-3.0, 5.0, 95.0), 5.0);
        assert_eq!(clamp_between(120.0, 5.0, 95.0), 95.0);
        assert_eq!(clamp_between(42.0, 5.0, 95.0), 42.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(40.356, 2), 40.36);
        assert_eq!(round_to(0.6800000000000002, 3), 0.68);
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(95.0, 2), 95.0);
    }

    #[test]
    fn test_both_speed_terms_fire() {
        let scorer = HeuristicScorer::new();
        let features = DrivingFeatures {
            avg_speed: 65.0,
            max_speed: 90.0,
            harsh_braking_rate: 0.0,
            harsh_accel_rate: 0.0,
            phone_usage_rate: 0.0,
            night_driving_rate: 0.0,
            speeding_rate: 0.0,
            bad_weather_rate: 0.0,
            total_trips: 50.0,
            data_points: 500.0,
        };

        // 25 + 5*1.2 + 10*0.5 = 36, full data quality leaves it unscaled
        let record = scorer.evaluate(&features, 10);
        assert_eq!(record.risk_score, 36.0);
        assert_eq!(record.confidence, 1.0);
        assert_eq!(record.risk_level, RiskLevel::Medium);
    }
}
