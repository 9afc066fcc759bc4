//! Random forest classifier

use super::decision_tree::{Criterion, DecisionTree};
use super::models::{check_training_data, Classifier};
use crate::error::{Result, SusceptibilityError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged Gini trees, each split drawing from `floor(sqrt(n_features))` factors
///
/// Probabilities are the mean positive fraction of the leaves reached in
/// each tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    pub random_state: Option<u64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_training_data(x, y)?;
        if self.n_estimators == 0 {
            return Err(SusceptibilityError::invalid_parameter(
                "n_estimators",
                0,
                "must be at least 1",
            ));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;
        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);
        let base_seed = self.random_state.unwrap_or(42);

        // Each tree owns an RNG derived from its index, so the result does not
        // depend on how rayon schedules the work
        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() % n_samples as u64) as usize)
                    .collect();
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new_classifier()
                    .with_criterion(Criterion::Gini)
                    .with_max_features(max_features)
                    .with_random_state(rng.next_u64());
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = Array1::<f64>::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total_importances += imp;
            }
        }

        let total = total_importances.sum();
        if total > 0.0 {
            total_importances /= total;
        }
        self.feature_importances = Some(total_importances);
    }

    /// Probability of the positive class for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(SusceptibilityError::ModelNotFitted);
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for preds in &per_tree {
            sum += preds;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Probability of the positive class for one row
    pub fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(SusceptibilityError::ModelNotFitted);
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict_row(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Mean impurity decrease per factor, normalized to sum to one
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict_proba(self, x)
    }

    fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        RandomForest::predict_proba_row(self, row)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}
