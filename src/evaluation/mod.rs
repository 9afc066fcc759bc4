//! Model evaluation
//!
//! Metrics are computed on both partitions; cross-validation refits the
//! scaler and classifier inside every fold.

mod cross_validate;
mod metrics;

pub use cross_validate::{cross_validate, CrossValidationReport};
pub use metrics::{roc_auc, ClassificationMetrics, ConfusionMatrix};

use crate::dataset::TrainTestSplit;
use crate::error::Result;
use crate::training::FittedModel;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Train accuracy this far above test accuracy is flagged as overfitting
const OVERFITTING_WARN_GAP: f64 = 0.1;

/// Score `model` on raw features `x` against labels `y`
pub fn evaluate(model: &FittedModel, x: &Array2<f64>, y: &Array1<f64>) -> Result<ClassificationMetrics> {
    let proba = model.predict_proba(x)?;
    ClassificationMetrics::compute(y, &proba)
}

/// Metrics on both partitions of a split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub train: ClassificationMetrics,
    pub test: ClassificationMetrics,
}

impl EvaluationReport {
    /// Evaluate on the train and test partitions and log the overfitting gap
    pub fn from_split(model: &FittedModel, split: &TrainTestSplit) -> Result<Self> {
        let report = Self {
            train: evaluate(model, &split.x_train, &split.y_train)?,
            test: evaluate(model, &split.x_test, &split.y_test)?,
        };

        let gap = report.overfitting_gap();
        info!(
            train_accuracy = report.train.accuracy,
            test_accuracy = report.test.accuracy,
            test_auc = report.test.auc,
            gap,
            "Evaluated model"
        );
        if gap > OVERFITTING_WARN_GAP {
            warn!(gap, "Train accuracy well above test accuracy, model may be overfitting");
        }

        Ok(report)
    }

    /// Train accuracy minus test accuracy
    pub fn overfitting_gap(&self) -> f64 {
        self.train.accuracy - self.test.accuracy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::training::{ClassifierKind, TrainEngine, TrainingConfig};
    use ndarray::array;

    #[test]
    fn test_report_on_separable_split() {
        let features = array![
            [0.0, 1.0],
            [0.2, 1.1],
            [0.1, 0.9],
            [0.3, 1.2],
            [0.4, 1.0],
            [5.0, 9.0],
            [5.2, 9.1],
            [5.1, 8.9],
            [5.3, 9.2],
            [5.4, 9.0]
        ];
        let labels = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let split = Dataset::new(features, labels).unwrap().split(0.3, 42).unwrap();

        let model = TrainEngine::new(TrainingConfig::new(ClassifierKind::LogisticRegression))
            .train(&split)
            .unwrap();
        let report = EvaluationReport::from_split(&model, &split).unwrap();

        assert_eq!(report.train.confusion_matrix.total(), 7);
        assert_eq!(report.test.confusion_matrix.total(), 3);
        assert_eq!(report.test.accuracy, 1.0);
        assert!(report.overfitting_gap().abs() < 1e-12);
    }
}
