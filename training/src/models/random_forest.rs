use common::config::RandomForestSettings;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    tree::{DecisionTree, TreeParams},
    validate_training_set, Classifier, ModelError,
};
use crate::dataset::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
}

/// `n / (n_classes * count)` per class, so rare classes weigh as much as
/// common ones in total.
pub fn balanced_class_weights(labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &label in labels {
        counts[label] += 1;
    }
    let n = labels.len() as f64;
    counts
        .iter()
        .map(|&count| {
            if count == 0 {
                0.0
            } else {
                n / (n_classes as f64 * count as f64)
            }
        })
        .collect()
}

impl RandomForest {
    pub fn fit(
        dataset: &Dataset,
        n_classes: usize,
        settings: &RandomForestSettings,
        seed: u64,
    ) -> Result<Self, ModelError> {
        validate_training_set(dataset, n_classes)?;
        if settings.n_estimators == 0 {
            return Err(ModelError::InvalidSetting {
                name: "random_forest.n_estimators",
                reason: "must be at least 1",
            });
        }

        let n_samples = dataset.n_samples();
        let n_features = dataset.n_features();
        let max_features = settings
            .max_features
            .unwrap_or_else(|| ((n_features as f64).sqrt() as usize).max(1));
        let params = TreeParams {
            max_depth: settings.max_depth,
            min_samples_split: settings.min_samples_split,
            min_samples_leaf: settings.min_samples_leaf,
            max_features: Some(max_features),
        };

        let weights = if settings.balanced_class_weight {
            let class_weights = balanced_class_weights(&dataset.labels, n_classes);
            dataset.labels.iter().map(|&label| class_weights[label]).collect()
        } else {
            vec![1.0; n_samples]
        };

        tracing::info!(
            trees = settings.n_estimators,
            max_depth = settings.max_depth,
            max_features,
            samples = n_samples,
            "Training random forest"
        );

        let trees = (0..settings.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                DecisionTree::fit(
                    &dataset.features,
                    &dataset.labels,
                    &weights,
                    bootstrap,
                    n_classes,
                    params,
                    &mut rng,
                )
            })
            .collect();

        Ok(Self { n_classes, trees })
    }
}

impl Classifier for RandomForest {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Mean of the trees' leaf probabilities.
    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut probabilities = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in probabilities.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len().max(1) as f64;
        probabilities.iter_mut().for_each(|p| *p /= n_trees);
        probabilities
    }
}
