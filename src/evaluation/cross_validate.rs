//! Stratified k-fold cross-validation of a classifier configuration

use super::metrics::ClassificationMetrics;
use crate::error::{Result, SusceptibilityError};
use crate::training::{fit_rows, CVResults, CVStrategy, CrossValidator, TrainingConfig};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-fold test metrics and their summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: Vec<ClassificationMetrics>,
    pub accuracy: CVResults,
    pub f1: CVResults,
    pub auc: CVResults,
}

impl CrossValidationReport {
    fn from_folds(folds: Vec<ClassificationMetrics>) -> Self {
        let collect = |f: fn(&ClassificationMetrics) -> f64| {
            CVResults::from_scores(folds.iter().map(f).collect())
        };
        Self {
            accuracy: collect(|m| m.accuracy),
            f1: collect(|m| m.f1),
            auc: collect(|m| m.auc),
            folds,
        }
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }
}

/// Stratified k-fold over `x`/`y` with `config.random_state` as the fold seed.
///
/// Each fold fits a fresh scaler and classifier on its training rows only.
pub fn cross_validate(
    x: &Array2<f64>,
    y: &Array1<f64>,
    config: &TrainingConfig,
    k: usize,
) -> Result<CrossValidationReport> {
    if x.nrows() != y.len() {
        return Err(SusceptibilityError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }

    let splits = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: k, shuffle: true })
        .with_random_state(config.random_state)
        .split(x.nrows(), Some(y))?;

    let mut folds = Vec::with_capacity(splits.len());
    for split in &splits {
        let model = fit_rows(config, x, y, &split.train_indices)?;
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);
        let metrics = ClassificationMetrics::compute(&y_test, &model.predict_proba(&x_test)?)?;
        debug!(fold = split.fold_idx, accuracy = metrics.accuracy, auc = metrics.auc, "Fold scored");
        folds.push(metrics);
    }

    let report = CrossValidationReport::from_folds(folds);
    info!(
        model = config.kind.as_str(),
        k,
        mean_auc = report.auc.mean_score,
        std_auc = report.auc.std_score,
        "Cross-validation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ClassifierKind;

    fn two_clusters(n_per_class: usize) -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let jitter = i as f64 * 0.05;
            rows.extend([jitter, 1.0 - jitter]);
            labels.push(0.0);
            rows.extend([4.0 + jitter, 5.0 - jitter]);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((2 * n_per_class, 2), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_cross_validate_separable() {
        let (x, y) = two_clusters(10);
        let config = TrainingConfig::new(ClassifierKind::LogisticRegression);
        let report = cross_validate(&x, &y, &config, 5).unwrap();

        assert_eq!(report.n_folds(), 5);
        assert_eq!(report.accuracy.scores.len(), 5);
        assert!((report.auc.mean_score - 1.0).abs() < 1e-12);
        let tested: usize = report.folds.iter().map(|m| m.confusion_matrix.total()).sum();
        assert_eq!(tested, 20);
    }

    #[test]
    fn test_too_few_samples_for_k() {
        let (x, y) = two_clusters(2);
        let config = TrainingConfig::new(ClassifierKind::LogisticRegression);
        assert!(matches!(
            cross_validate(&x, &y, &config, 5),
            Err(SusceptibilityError::InsufficientData(_))
        ));
    }
}
