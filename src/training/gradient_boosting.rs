//! Gradient Boosting implementation
//!
//! Binary log-loss boosting: each round fits a regression tree to the
//! residuals `y - p` and adds it, shrunk by the learning rate, to the log-odds.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{check_training_data, sigmoid, Classifier};
use crate::error::{Result, SusceptibilityError};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: None,
        }
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            feature_importances: Vec::new(),
        }
    }

    /// Fit binary classification
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(SusceptibilityError::invalid_parameter(
                "subsample",
                self.config.subsample,
                "must lie in (0, 1]",
            ));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();

        // Prior log odds, clipped so a single-class set stays finite
        let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            // Negative gradient of log loss
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, &lo)| yi - sigmoid(lo))
                .collect();

            let sample_indices = Self::sample_fraction(n_samples, self.config.subsample, &mut rng);
            let col_indices = Self::sample_fraction(n_features, self.config.colsample_bytree, &mut rng);

            let x_cols = x.select(Axis(1), &col_indices);
            let x_sub = x_cols.select(Axis(0), &sample_indices);
            let y_sub = residuals.select(Axis(0), &sample_indices);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(rng.next_u64());
            tree.fit(&x_sub, &y_sub)?;

            // Every row moves, including the ones left out of this round's sample
            let tree_pred = tree.predict(&x_cols)?;
            log_odds.scaled_add(self.config.learning_rate, &tree_pred);

            if let Some(tree_importance) = tree.feature_importances() {
                for (j, &col_idx) in col_indices.iter().enumerate() {
                    self.feature_importances[col_idx] += tree_importance[j];
                }
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() && self.config.n_estimators > 0 {
            return Err(SusceptibilityError::ModelNotFitted);
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, col_indices) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let x_sub = x.select(Axis(1), col_indices);
            let tree_pred = tree.predict(&x_sub)?;
            log_odds.scaled_add(self.config.learning_rate, &tree_pred);
        }

        Ok(log_odds.mapv(sigmoid))
    }

    /// Probability for a single row
    pub fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() && self.config.n_estimators > 0 {
            return Err(SusceptibilityError::ModelNotFitted);
        }

        let mut log_odds = self.initial_log_odds;
        for (tree, col_indices) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let sub = row.select(Axis(0), col_indices);
            log_odds += self.config.learning_rate * tree.predict_row(&sub.view())?;
        }
        Ok(sigmoid(log_odds))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Sorted random subset holding `ceil(n * fraction)` indices
    fn sample_fraction(n: usize, fraction: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if fraction >= 1.0 {
            return indices;
        }
        let sample_size = ((n as f64) * fraction).ceil().max(1.0) as usize;
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict_proba(self, x)
    }

    fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        GradientBoostingClassifier::predict_proba_row(self, row)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        Some(Array1::from_vec(self.feature_importances.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| if row[0] + row[1] > 10.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 50,
            max_depth: 3,
            random_state: Some(42),
            ..Default::default()
        };

        let mut model = GradientBoostingClassifier::new(config);
        model.fit(&x, &y).unwrap();

        let predictions = Classifier::predict(&model, &x).unwrap();
        assert_eq!(predictions.len(), 100);

        let correct = y
            .iter()
            .zip(predictions.iter())
            .filter(|(&yi, &pi)| (yi - pi).abs() < 0.5)
            .count();
        let accuracy = correct as f64 / y.len() as f64;
        assert!(accuracy > 0.9, "Accuracy ({}) should be above 90%", accuracy);
    }

    #[test]
    fn test_row_matches_batch_with_subsampling() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 15,
            max_depth: 2,
            subsample: 0.7,
            colsample_bytree: 0.5,
            random_state: Some(9),
            ..Default::default()
        };
        let mut model = GradientBoostingClassifier::new(config);
        model.fit(&x, &y).unwrap();

        let batch = model.predict_proba(&x).unwrap();
        for (i, row) in x.rows().into_iter().enumerate().step_by(7) {
            assert!((model.predict_proba_row(&row).unwrap() - batch[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_feature_importances() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 10,
            random_state: Some(1),
            ..Default::default()
        };

        let mut model = GradientBoostingClassifier::new(config);
        model.fit(&x, &y).unwrap();

        let importances = model.feature_importances();
        assert_eq!(importances.len(), 2);
        let sum: f64 = importances.iter().sum();
        assert!((sum - 1.0).abs() < 0.01, "Sum of importances ({}) should be ~1", sum);
    }
}
