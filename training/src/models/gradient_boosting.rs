use common::config::GradientBoostingSettings;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    tree::{RegressionTree, TreeParams},
    validate_training_set, Classifier, ModelError,
};
use crate::dataset::Dataset;

/// Keeps the log of an unseen class's prior finite.
const PRIOR_EPSILON: f64 = f32::EPSILON as f64;
const MIN_DENOMINATOR: f64 = 1e-150;

/// Multi-class gradient boosting on the softmax log-loss: one regression
/// tree per class per stage, leaves set by a single Newton step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_classes: usize,
    pub learning_rate: f64,
    pub initial: Vec<f64>,
    pub stages: Vec<Vec<RegressionTree>>,
}

pub fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = raw.iter().map(|r| (r - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

fn log_priors(labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0.0; n_classes];
    for &label in labels {
        counts[label] += 1.0;
    }
    let n = labels.len() as f64;
    counts
        .iter()
        .map(|count| (count / n).clamp(PRIOR_EPSILON, 1.0 - PRIOR_EPSILON).ln())
        .collect()
}

impl GradientBoosting {
    pub fn fit(
        dataset: &Dataset,
        n_classes: usize,
        settings: &GradientBoostingSettings,
        seed: u64,
    ) -> Result<Self, ModelError> {
        validate_training_set(dataset, n_classes)?;
        if settings.learning_rate.is_nan() || settings.learning_rate <= 0.0 {
            return Err(ModelError::InvalidSetting {
                name: "gradient_boosting.learning_rate",
                reason: "must be positive",
            });
        }

        let n_samples = dataset.n_samples();
        let params = TreeParams {
            max_depth: settings.max_depth,
            min_samples_split: settings.min_samples_split,
            min_samples_leaf: settings.min_samples_leaf,
            max_features: None,
        };
        let newton_scale = (n_classes as f64 - 1.0) / n_classes as f64;

        let initial = log_priors(&dataset.labels, n_classes);
        let mut raw: Vec<Vec<f64>> = vec![initial.clone(); n_samples];
        let mut stages = Vec::with_capacity(settings.n_estimators);

        tracing::info!(
            stages = settings.n_estimators,
            learning_rate = settings.learning_rate,
            max_depth = settings.max_depth,
            samples = n_samples,
            "Training gradient boosting"
        );

        for stage in 0..settings.n_estimators {
            let probabilities: Vec<Vec<f64>> = raw.iter().map(|r| softmax(r)).collect();

            let trees: Vec<RegressionTree> = (0..n_classes)
                .into_par_iter()
                .map(|class| {
                    let residuals: Vec<f64> = dataset
                        .labels
                        .iter()
                        .zip(&probabilities)
                        .map(|(&label, p)| {
                            let target = if label == class { 1.0 } else { 0.0 };
                            target - p[class]
                        })
                        .collect();
                    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add((stage * n_classes + class) as u64));
                    RegressionTree::fit(&dataset.features, &residuals, params, &mut rng, |samples| {
                        let numerator: f64 = samples.iter().map(|&i| residuals[i]).sum();
                        let denominator: f64 = samples
                            .iter()
                            .map(|&i| probabilities[i][class] * (1.0 - probabilities[i][class]))
                            .sum();
                        if denominator.abs() < MIN_DENOMINATOR {
                            0.0
                        } else {
                            newton_scale * numerator / denominator
                        }
                    })
                })
                .collect();

            for (row, scores) in dataset.features.iter().zip(raw.iter_mut()) {
                for (score, tree) in scores.iter_mut().zip(&trees) {
                    *score += settings.learning_rate * tree.predict(row);
                }
            }
            stages.push(trees);

            if (stage + 1) % 25 == 0 {
                tracing::debug!(stage = stage + 1, "Boosting stage complete");
            }
        }

        Ok(Self {
            n_classes,
            learning_rate: settings.learning_rate,
            initial,
            stages,
        })
    }

    pub fn raw_scores(&self, row: &[f64]) -> Vec<f64> {
        let mut scores = self.initial.clone();
        for stage in &self.stages {
            for (score, tree) in scores.iter_mut().zip(stage) {
                *score += self.learning_rate * tree.predict(row);
            }
        }
        scores
    }
}

impl Classifier for GradientBoosting {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        softmax(&self.raw_scores(row))
    }
}
