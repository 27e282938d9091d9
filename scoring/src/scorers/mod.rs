pub mod heuristic;

pub use heuristic::*;

use crate::model::{FeatureMap, RiskRecord, ScoreError};

#[cfg_attr(test, mockall::automock)]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, features: &FeatureMap) -> Result<RiskRecord, ScoreError>;
}
