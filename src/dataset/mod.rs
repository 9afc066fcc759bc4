//! Labelled datasets built from extracted samples
//!
//! Positives are labelled 1, negatives 0. Any row with a missing factor value
//! is dropped; every retained row holds one finite value per factor.

mod split;

pub use split::{stratified_split, TrainTestSplit};

use crate::error::{Result, SusceptibilityError};
use crate::sampling::{ClassLabel, FeatureVector};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Complete feature rows with binary labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
}

impl Dataset {
    pub fn new(features: Array2<f64>, labels: Array1<f64>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{} labels", features.nrows()),
                actual: format!("{} labels", labels.len()),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn n_positive(&self) -> usize {
        self.labels.iter().filter(|&&l| l >= 0.5).count()
    }

    pub fn n_negative(&self) -> usize {
        self.len() - self.n_positive()
    }

    /// Fraction of rows labelled positive
    pub fn positive_ratio(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.n_positive() as f64 / self.len() as f64
        }
    }

    /// Split into stratified train/test partitions
    pub fn split(&self, test_ratio: f64, seed: u64) -> Result<TrainTestSplit> {
        stratified_split(self, test_ratio, seed)
    }
}

/// Merges positive and negative feature vectors into a [`Dataset`]
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    rows: Vec<Vec<f64>>,
    labels: Vec<f64>,
    dropped: usize,
    n_features: Option<usize>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add vectors for one class, dropping incomplete ones
    pub fn add(mut self, vectors: &[FeatureVector], label: ClassLabel) -> Result<Self> {
        for vector in vectors {
            let width = vector.values.len();
            match self.n_features {
                Some(n) if n != width => {
                    return Err(SusceptibilityError::ShapeError {
                        expected: format!("{} factor values", n),
                        actual: format!("{} factor values", width),
                    });
                }
                _ => self.n_features = Some(width),
            }

            match vector.complete_values() {
                Some(values) => {
                    self.rows.push(values);
                    self.labels.push(label.as_f64());
                }
                None => self.dropped += 1,
            }
        }
        Ok(self)
    }

    /// Finish the dataset; returns it with the number of dropped rows
    pub fn finish(self) -> Result<(Dataset, usize)> {
        let n_pos = self.labels.iter().filter(|&&l| l >= 0.5).count();
        let n_neg = self.labels.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(SusceptibilityError::InsufficientData(format!(
                "need complete samples of both classes, got {} positive and {} negative ({} dropped)",
                n_pos, n_neg, self.dropped
            )));
        }

        let n_cols = self.n_features.unwrap_or(0);
        let flat: Vec<f64> = self.rows.into_iter().flatten().collect();
        let features = Array2::from_shape_vec((self.labels.len(), n_cols), flat)?;
        let dataset = Dataset::new(features, Array1::from_vec(self.labels))?;

        if self.dropped > 0 {
            warn!(dropped = self.dropped, "Dropped samples with missing factor values");
        }
        info!(
            samples = dataset.len(),
            positive = n_pos,
            negative = n_neg,
            factors = n_cols,
            "Built dataset"
        );
        Ok((dataset, self.dropped))
    }

    /// Build from positive and negative vectors in one call
    pub fn build(positive: &[FeatureVector], negative: &[FeatureVector]) -> Result<(Dataset, usize)> {
        Self::new()
            .add(positive, ClassLabel::Positive)?
            .add(negative, ClassLabel::Negative)?
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(values: &[Option<f64>]) -> FeatureVector {
        FeatureVector { values: values.to_vec() }
    }

    #[test]
    fn test_build_drops_incomplete_rows() {
        let positive = vec![fv(&[Some(1.0), Some(2.0)]), fv(&[None, Some(2.0)])];
        let negative = vec![fv(&[Some(0.0), Some(0.5)]), fv(&[Some(0.1), None]), fv(&[Some(0.2), Some(0.3)])];

        let (dataset, dropped) = DatasetBuilder::build(&positive, &negative).unwrap();
        assert_eq!(dataset.len() + dropped, positive.len() + negative.len());
        assert_eq!(dropped, 2);
        assert_eq!(dataset.n_positive(), 1);
        assert_eq!(dataset.n_negative(), 2);
        assert_eq!(dataset.labels.to_vec(), vec![1.0, 0.0, 0.0]);
        assert!(dataset.features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_build_requires_both_classes() {
        let positive = vec![fv(&[None])];
        let negative = vec![fv(&[Some(1.0)])];
        assert!(matches!(
            DatasetBuilder::build(&positive, &negative),
            Err(SusceptibilityError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_build_rejects_ragged_vectors() {
        let positive = vec![fv(&[Some(1.0), Some(2.0)])];
        let negative = vec![fv(&[Some(1.0)])];
        assert!(matches!(
            DatasetBuilder::build(&positive, &negative),
            Err(SusceptibilityError::ShapeError { .. })
        ));
    }
}
