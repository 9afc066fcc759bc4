//! Cross-validation splitters

use crate::error::{Result, SusceptibilityError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Generate the folds. Stratified strategies need the labels.
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                Self::check_splits(*n_splits, n_samples)?;
                let mut indices: Vec<usize> = (0..n_samples).collect();
                if *shuffle {
                    indices.shuffle(&mut self.rng());
                }
                Ok(Self::assemble(Self::deal(&[indices], *n_splits)))
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    SusceptibilityError::invalid_parameter(
                        "y",
                        "None",
                        "stratified k-fold needs labels",
                    )
                })?;
                if y.len() != n_samples {
                    return Err(SusceptibilityError::ShapeError {
                        expected: format!("{} labels", n_samples),
                        actual: format!("{} labels", y.len()),
                    });
                }
                Self::check_splits(*n_splits, n_samples)?;
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn check_splits(n_splits: usize, n_samples: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(SusceptibilityError::invalid_parameter(
                "n_splits",
                n_splits,
                "must be at least 2",
            ));
        }
        if n_splits > n_samples {
            return Err(SusceptibilityError::InsufficientData(format!(
                "{} folds requested for {} samples",
                n_splits, n_samples
            )));
        }
        Ok(())
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn stratified_k_fold_split(
        &self,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        // Group samples by class, in label order
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if shuffle {
            let mut rng = self.rng();
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        let groups: Vec<Vec<usize>> = class_indices.into_values().collect();
        Ok(Self::assemble(Self::deal(&groups, n_splits)))
    }

    /// Round-robin each group over the folds; the fold cursor carries over
    /// between groups so fold sizes differ by at most one.
    fn deal(groups: &[Vec<usize>], n_splits: usize) -> Vec<Vec<usize>> {
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut cursor = 0;
        for group in groups {
            for &idx in group {
                folds[cursor % n_splits].push(idx);
                cursor += 1;
            }
        }
        folds
    }

    fn assemble(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect()
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: 0.0,
                std_score: 0.0,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance =
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}
