//! Binary classification metrics

use crate::error::{Result, SusceptibilityError};
use crate::training::DECISION_THRESHOLD;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 2×2 confusion matrix laid out as `[[TN, FP], [FN, TP]]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    /// Count outcomes of 0/1 predictions against 0/1 truth
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[[{}, {}],", self.tn, self.fp)?;
        write!(f, " [{}, {}]]", self.fn_, self.tp)
    }
}

/// Metrics of one partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl ClassificationMetrics {
    /// Compute every metric from 0/1 truth and positive-class probabilities.
    ///
    /// Labels come from thresholding `y_prob` at 0.5; AUC uses the raw
    /// probabilities.
    pub fn compute(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_prob.len() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{} probabilities", y_true.len()),
                actual: format!("{} probabilities", y_prob.len()),
            });
        }
        if y_true.is_empty() {
            return Err(SusceptibilityError::InsufficientData(
                "cannot evaluate an empty partition".to_string(),
            ));
        }

        let y_pred = y_prob.mapv(|p| if p >= DECISION_THRESHOLD { 1.0 } else { 0.0 });
        let cm = ConfusionMatrix::from_labels(y_true, &y_pred);
        let (tp, fp, fn_) = (cm.tp as f64, cm.fp as f64, cm.fn_ as f64);

        let accuracy = (cm.tp + cm.tn) as f64 / cm.total() as f64;
        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1,
            auc: roc_auc(y_true, y_prob),
            confusion_matrix: cm,
        })
    }
}

/// Area under the ROC curve via the Mann–Whitney U statistic.
///
/// Tied scores receive their average rank. Returns 0.5 when only one class
/// is present.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> f64 {
    let n_pos = y_true.iter().filter(|&&y| y > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&y, _)| y > 0.5)
        .map(|(_, &r)| r)
        .sum();
    let n_pos = n_pos as f64;
    let u = rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    u / (n_pos * n_neg as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_predictor() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.1, 0.2, 0.8, 0.9];
        let m = ClassificationMetrics::compute(&y, &p).unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.auc, 1.0);
        assert_eq!(m.confusion_matrix.as_array(), [[2, 0], [0, 2]]);
    }

    #[test]
    fn test_mixed_predictions() {
        let y = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let p = array![0.9, 0.2, 0.7, 0.3, 0.1, 0.6, 0.8, 0.4];
        let m = ClassificationMetrics::compute(&y, &p).unwrap();

        // TP=3, FP=1, TN=3, FN=1
        assert_eq!(m.confusion_matrix.as_array(), [[3, 1], [1, 3]]);
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        assert!((m.precision - 0.75).abs() < 1e-12);
        assert!((m.recall - 0.75).abs() < 1e-12);
        assert!((m.f1 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions() {
        let y = array![1.0, 0.0];
        let p = array![0.1, 0.2];
        let m = ClassificationMetrics::compute(&y, &p).unwrap();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_auc_ties_and_single_class() {
        // every score tied: chance level
        assert_eq!(roc_auc(&array![0.0, 1.0, 0.0, 1.0], &array![0.5, 0.5, 0.5, 0.5]), 0.5);
        assert_eq!(roc_auc(&array![1.0, 1.0], &array![0.2, 0.9]), 0.5);
        // one inverted pair out of four
        let auc = roc_auc(&array![0.0, 0.0, 1.0, 1.0], &array![0.1, 0.6, 0.4, 0.9]);
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ClassificationMetrics::compute(&array![1.0], &array![0.5, 0.5]).is_err());
    }

    #[test]
    fn test_confusion_display() {
        let cm = ConfusionMatrix { tn: 3, fp: 1, fn_: 0, tp: 2 };
        assert_eq!(cm.to_string(), "[[3, 1],\n [0, 2]]");
    }
}
