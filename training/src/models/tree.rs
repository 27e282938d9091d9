//! CART trees shared by the forest and the boosting ensemble.
//!
//! Splits are found with a sorted sweep: for each candidate feature the node's
//! samples are ordered once and moved from the right child to the left one,
//! keeping running statistics so every threshold is scored in constant time.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const MIN_IMPURITY_DECREASE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node<T> {
    Leaf {
        value: T,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node<T>>,
        right: Box<Node<T>>,
    },
}

impl<T> Node<T> {
    pub fn leaf_for(&self, row: &[f64]) -> &T {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Highest feature index any split reads, `None` for a bare leaf.
    pub fn max_feature(&self) -> Option<usize> {
        match self {
            Node::Leaf { .. } => None,
            Node::Split {
                feature, left, right, ..
            } => [Some(*feature), left.max_feature(), right.max_feature()]
                .into_iter()
                .flatten()
                .max(),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per node; `None` tries every feature.
    pub max_features: Option<usize>,
}

/// Running statistics for one side of a candidate split.
pub(crate) trait Criterion {
    type Stats: Clone;
    type Leaf;

    fn empty(&self) -> Self::Stats;
    fn add(&self, stats: &mut Self::Stats, sample: usize);
    fn remove(&self, stats: &mut Self::Stats, sample: usize);
    /// Total sample weight behind `stats`.
    fn weight(&self, stats: &Self::Stats) -> f64;
    /// Impurity per unit of weight.
    fn impurity(&self, stats: &Self::Stats) -> f64;
    fn leaf(&self, samples: &[usize]) -> Self::Leaf;

    fn stats_of(&self, samples: &[usize]) -> Self::Stats {
        let mut stats = self.empty();
        for &sample in samples {
            self.add(&mut stats, sample);
        }
        stats
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

pub(crate) struct TreeBuilder<'a, C: Criterion> {
    criterion: &'a C,
    features: &'a [Vec<f64>],
    params: TreeParams,
}

impl<'a, C: Criterion> TreeBuilder<'a, C> {
    pub(crate) fn new(criterion: &'a C, features: &'a [Vec<f64>], params: TreeParams) -> Self {
        Self {
            criterion,
            features,
            params,
        }
    }

    /// Grows a tree over `samples`; an index may repeat, as in a bootstrap draw.
    pub(crate) fn grow(&self, samples: Vec<usize>, rng: &mut ChaCha8Rng) -> Node<C::Leaf> {
        self.grow_node(samples, 0, rng)
    }

    fn grow_node(&self, samples: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> Node<C::Leaf> {
        let stats = self.criterion.stats_of(&samples);
        let impurity = self.criterion.impurity(&stats);

        if depth >= self.params.max_depth
            || samples.len() < self.params.min_samples_split
            || samples.len() < 2 * self.params.min_samples_leaf.max(1)
            || impurity <= MIN_IMPURITY_DECREASE
        {
            return self.leaf(&samples);
        }

        let parent_score = self.criterion.weight(&stats) * impurity;
        let best = self
            .best_split(&samples, &stats, rng)
            .filter(|candidate| parent_score - candidate.score > MIN_IMPURITY_DECREASE);

        match best {
            Some(split) => {
                let (left, right): (Vec<usize>, Vec<usize>) = samples
                    .iter()
                    .partition(|&&i| self.features[i][split.feature] <= split.threshold);
                Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(self.grow_node(left, depth + 1, rng)),
                    right: Box::new(self.grow_node(right, depth + 1, rng)),
                }
            }
            None => self.leaf(&samples),
        }
    }

    fn leaf(&self, samples: &[usize]) -> Node<C::Leaf> {
        Node::Leaf {
            value: self.criterion.leaf(samples),
        }
    }

    /// All features in random order plus how many of them a node should try.
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> (Vec<usize>, usize) {
        let n_features = self.features.first().map_or(0, Vec::len);
        let mut candidates: Vec<usize> = (0..n_features).collect();
        match self.params.max_features {
            Some(max_features) if max_features < n_features => {
                candidates.shuffle(rng);
                (candidates, max_features.max(1))
            }
            _ => (candidates, n_features),
        }
    }

    fn best_split(&self, samples: &[usize], total: &C::Stats, rng: &mut ChaCha8Rng) -> Option<SplitCandidate> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;
        let mut ordered = samples.to_vec();

        // Past the budget, keep looking only until some valid split turns up.
        let (candidates, budget) = self.candidate_features(rng);
        for (tried, feature) in candidates.into_iter().enumerate() {
            if tried >= budget && best.is_some() {
                break;
            }
            ordered.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let mut left = self.criterion.empty();
            let mut right = total.clone();
            for position in 0..ordered.len() - 1 {
                let sample = ordered[position];
                self.criterion.add(&mut left, sample);
                self.criterion.remove(&mut right, sample);

                let n_left = position + 1;
                if n_left < min_leaf || ordered.len() - n_left < min_leaf {
                    continue;
                }
                let current = self.features[sample][feature];
                let next = self.features[ordered[position + 1]][feature];
                if current >= next {
                    continue;
                }

                let score = self.criterion.weight(&left) * self.criterion.impurity(&left)
                    + self.criterion.weight(&right) * self.criterion.impurity(&right);
                if best.as_ref().is_none_or(|b| score < b.score) {
                    let mut threshold = current + (next - current) / 2.0;
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        score,
                    });
                }
            }
        }

        best
    }
}

/// Weighted multi-class Gini impurity over integer labels.
pub(crate) struct Gini<'a> {
    pub labels: &'a [usize],
    pub weights: &'a [f64],
    pub n_classes: usize,
}

impl Criterion for Gini<'_> {
    type Stats = Vec<f64>;
    type Leaf = Vec<f64>;

    fn empty(&self) -> Vec<f64> {
        vec![0.0; self.n_classes]
    }

    fn add(&self, stats: &mut Vec<f64>, sample: usize) {
        stats[self.labels[sample]] += self.weights[sample];
    }

    fn remove(&self, stats: &mut Vec<f64>, sample: usize) {
        stats[self.labels[sample]] -= self.weights[sample];
    }

    fn weight(&self, stats: &Vec<f64>) -> f64 {
        stats.iter().sum()
    }

    fn impurity(&self, stats: &Vec<f64>) -> f64 {
        let total = self.weight(stats);
        if total <= 0.0 {
            return 0.0;
        }
        1.0 - stats.iter().map(|w| (w / total).powi(2)).sum::<f64>()
    }

    /// Class probabilities weighted like the impurity.
    fn leaf(&self, samples: &[usize]) -> Vec<f64> {
        let stats = self.stats_of(samples);
        let total = self.weight(&stats);
        if total <= 0.0 {
            return vec![1.0 / self.n_classes as f64; self.n_classes];
        }
        stats.iter().map(|w| w / total).collect()
    }
}

/// Squared error over real targets. Leaf values come from `leaf_value`,
/// which sees the samples that reached the leaf.
pub(crate) struct SquaredError<'a, F> {
    pub targets: &'a [f64],
    pub leaf_value: F,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Moments {
    count: f64,
    sum: f64,
    sum_squares: f64,
}

impl<F> Criterion for SquaredError<'_, F>
where
    F: Fn(&[usize]) -> f64,
{
    type Stats = Moments;
    type Leaf = f64;

    fn empty(&self) -> Moments {
        Moments::default()
    }

    fn add(&self, stats: &mut Moments, sample: usize) {
        let y = self.targets[sample];
        stats.count += 1.0;
        stats.sum += y;
        stats.sum_squares += y * y;
    }

    fn remove(&self, stats: &mut Moments, sample: usize) {
        let y = self.targets[sample];
        stats.count -= 1.0;
        stats.sum -= y;
        stats.sum_squares -= y * y;
    }

    fn weight(&self, stats: &Moments) -> f64 {
        stats.count
    }

    fn impurity(&self, stats: &Moments) -> f64 {
        if stats.count <= 0.0 {
            return 0.0;
        }
        let mean = stats.sum / stats.count;
        (stats.sum_squares / stats.count - mean * mean).max(0.0)
    }

    fn leaf(&self, samples: &[usize]) -> f64 {
        (self.leaf_value)(samples)
    }
}

/// Classification tree storing class probabilities at its leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub root: Node<Vec<f64>>,
}

impl DecisionTree {
    pub fn fit(
        features: &[Vec<f64>],
        labels: &[usize],
        weights: &[f64],
        samples: Vec<usize>,
        n_classes: usize,
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let criterion = Gini {
            labels,
            weights,
            n_classes,
        };
        let root = TreeBuilder::new(&criterion, features, params).grow(samples, rng);
        Self { root }
    }

    pub fn predict_proba(&self, row: &[f64]) -> &[f64] {
        self.root.leaf_for(row)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub root: Node<f64>,
}

impl RegressionTree {
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
        leaf_value: impl Fn(&[usize]) -> f64,
    ) -> Self {
        let criterion = SquaredError { targets, leaf_value };
        let samples = (0..targets.len()).collect();
        let root = TreeBuilder::new(&criterion, features, params).grow(samples, rng);
        Self { root }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        *self.root.leaf_for(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }

    #[test]
    fn test_gini_impurity() {
        let labels = [0, 0, 1, 1];
        let weights = [1.0; 4];
        let gini = Gini {
            labels: &labels,
            weights: &weights,
            n_classes: 2,
        };

        assert_eq!(gini.impurity(&gini.stats_of(&[0, 1, 2, 3])), 0.5);
        assert_eq!(gini.impurity(&gini.stats_of(&[0, 1])), 0.0);
    }

    #[test]
    fn test_tree_separates_on_threshold() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0], vec![10.0], vec![11.0]];
        let labels = [0, 0, 0, 1, 1];
        let weights = [1.0; 5];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = DecisionTree::fit(&features, &labels, &weights, (0..5).collect(), 2, params(3), &mut rng);

        match &tree.root {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 6.5);
            }
            Node::Leaf { .. } => panic!("expected a split"),
        }
        assert_eq!(tree.predict_proba(&[0.0]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[50.0]), &[0.0, 1.0]);
        assert_eq!(tree.root.depth(), 1);
        assert_eq!(tree.root.max_feature(), Some(0));
    }

    #[test]
    fn test_max_depth_zero_is_a_single_leaf() {
        let features = vec![vec![1.0], vec![2.0]];
        let labels = [0, 1];
        let weights = [1.0, 3.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = DecisionTree::fit(&features, &labels, &weights, vec![0, 1], 2, params(0), &mut rng);

        assert_eq!(tree.root.n_leaves(), 1);
        assert_eq!(tree.root.max_feature(), None);
        assert_eq!(tree.predict_proba(&[1.0]), &[0.25, 0.75]);
    }

    #[test]
    fn test_regression_tree_uses_leaf_value() {
        let features = vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0]];
        let targets = [1.0, 1.0, 3.0, 3.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = RegressionTree::fit(&features, &targets, params(2), &mut rng, |samples| {
            samples.iter().map(|&i| targets[i]).sum::<f64>() / samples.len() as f64
        });

        assert_eq!(tree.predict(&[0.5]), 1.0);
        assert_eq!(tree.predict(&[5.5]), 3.0);
    }

    #[test]
    fn test_constant_feature_yields_leaf() {
        let features = vec![vec![1.0], vec![1.0], vec![1.0]];
        let labels = [0, 1, 0];
        let weights = [1.0; 3];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = DecisionTree::fit(&features, &labels, &weights, vec![0, 1, 2], 2, params(5), &mut rng);

        assert_eq!(tree.root.n_leaves(), 1);
    }
}
