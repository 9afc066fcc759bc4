//! Decision tree implementation
//!
//! Leaves store the mean target of their samples. With 0/1 labels that is the
//! fraction of positives, which the forest averages into a probability; with
//! continuous targets it is the usual regression estimate used by boosting.

use crate::error::{Result, SusceptibilityError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample as sample_indices;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (binary labels)
    Gini,
    /// Entropy (binary labels)
    Entropy,
    /// Mean squared error (continuous targets)
    MSE,
}

/// Running sums for one side of a candidate split
#[derive(Debug, Clone, Copy, Default)]
struct SplitStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
}

impl SplitStats {
    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
    }

    fn minus(&self, other: &SplitStats) -> SplitStats {
        SplitStats {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature sub-sampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Tree over 0/1 labels
    pub fn new_classifier() -> Self {
        Self::with_criterion_internal(Criterion::Gini)
    }

    /// Tree over continuous targets
    pub fn new_regressor() -> Self {
        Self::with_criterion_internal(Criterion::MSE)
    }

    fn with_criterion_internal(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set number of features considered per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(SusceptibilityError::InsufficientData(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = n_features;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let mut stats = SplitStats::default();
        for &i in indices {
            stats.push(y[i]);
        }
        let leaf = TreeNode::Leaf {
            value: stats.sum / n_samples as f64,
            n_samples,
        };

        let parent_impurity = self.impurity(&stats);
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_impurity <= 1e-12;
        if should_stop {
            return leaf;
        }

        let candidates = self.candidate_features(rng);
        let Some((feature, threshold, gain)) = self.find_best_split(x, y, indices, &candidates, &stats)
        else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] <= threshold);
        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return leaf;
        }

        importances[feature] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    /// Random subset of feature indices, sorted, or all of them
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut chosen = sample_indices(rng, self.n_features, k.max(1)).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        total: &SplitStats,
    ) -> Option<(usize, f64, f64)> {
        let parent_impurity = self.impurity(total);
        let n = indices.len() as f64;

        // Each feature independently sweeps its sorted values
        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                let mut left = SplitStats::default();
                let mut best_gain = 0.0f64;
                let mut best_threshold = 0.0f64;

                for k in 0..order.len() - 1 {
                    left.push(order[k].1);
                    if order[k].0 == order[k + 1].0 {
                        continue;
                    }
                    let right = total.minus(&left);
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * self.impurity(&left)
                        + right.count as f64 * self.impurity(&right))
                        / n;
                    let gain = parent_impurity - weighted;
                    if gain > best_gain + 1e-12 {
                        best_gain = gain;
                        best_threshold = (order[k].0 + order[k + 1].0) / 2.0;
                    }
                }

                if best_gain > 0.0 {
                    Some((feature_idx, best_threshold, best_gain))
                } else {
                    None
                }
            })
            .collect();

        // Lowest feature index wins ties so results do not depend on thread timing
        feature_results.into_iter().flatten().fold(None, |best, cand| match best {
            Some(b) if b.2 >= cand.2 => Some(b),
            _ => Some(cand),
        })
    }

    /// Impurity from pre-computed statistics
    fn impurity(&self, stats: &SplitStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        let n = stats.count as f64;
        match self.criterion {
            Criterion::Gini => {
                let p = stats.sum / n;
                2.0 * p * (1.0 - p)
            }
            Criterion::Entropy => {
                let p = stats.sum / n;
                [p, 1.0 - p]
                    .iter()
                    .filter(|&&q| q > 0.0)
                    .map(|&q| -q * q.ln())
                    .sum()
            }
            // Var = E[X²] - E[X]²
            Criterion::MSE => (stats.sq_sum / n - (stats.sum / n).powi(2)).max(0.0),
        }
    }

    /// Leaf value for every row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(SusceptibilityError::ModelNotFitted)?;
        Ok(x.rows().into_iter().map(|row| Self::predict_node(root, &row)).collect())
    }

    /// Leaf value for a single row
    pub fn predict_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(SusceptibilityError::ModelNotFitted)?;
        Ok(Self::predict_node(root, row))
    }

    fn predict_node(node: &TreeNode, sample: &ArrayView1<f64>) -> f64 {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left.as_ref() } else { right.as_ref() };
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, Self::node_depth)
    }

    fn node_depth(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => {
                1 + Self::node_depth(left).max(Self::node_depth(right))
            }
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, Self::count_leaves)
    }

    fn count_leaves(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => Self::count_leaves(left) + Self::count_leaves(right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_threshold() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_leaf_holds_positive_fraction() {
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = array![1.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_n_leaves(), 1);
        assert!((tree.predict_row(&x.row(0)).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 1.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_feature_subsampling_is_seeded() {
        let x = Array2::from_shape_fn((30, 6), |(i, j)| ((i * 7 + j * 13) % 11) as f64);
        let y = Array1::from_iter((0..30).map(|i| (i % 3 == 0) as u8 as f64));

        let mut a = DecisionTree::new_classifier().with_max_features(2).with_random_state(3);
        let mut b = DecisionTree::new_classifier().with_max_features(2).with_random_state(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_unfitted_predict() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(SusceptibilityError::ModelNotFitted)));
    }
}
