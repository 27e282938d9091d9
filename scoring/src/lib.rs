pub mod executable_utils;
pub mod features;
pub mod integrated;
pub mod model;
pub mod scorers;

pub use model::{FeatureMap, Prediction, RiskLevel, RiskRecord, ScoreError};
pub use scorers::{HeuristicScorer, Scorer};

/// Scores a feature map with the heuristic scorer and its default feature table.
pub fn score(features: &FeatureMap) -> Result<RiskRecord, ScoreError> {
    HeuristicScorer::default().score(features)
}
