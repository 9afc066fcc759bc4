//! Plain-text evaluation report

use crate::evaluation::EvaluationReport;
use crate::training::ClassifierKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the text report describes about a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContext {
    pub factor_names: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub model: ClassifierKind,
    pub evaluation: EvaluationReport,
    /// Samples dropped for missing factor values
    pub dropped_samples: usize,
    pub generated_at: DateTime<Utc>,
}

impl ReportContext {
    pub fn new(
        factor_names: Vec<String>,
        n_train: usize,
        n_test: usize,
        model: ClassifierKind,
        evaluation: EvaluationReport,
    ) -> Self {
        Self {
            factor_names,
            n_train,
            n_test,
            model,
            evaluation,
            dropped_samples: 0,
            generated_at: Utc::now(),
        }
    }

    pub fn with_dropped_samples(mut self, dropped: usize) -> Self {
        self.dropped_samples = dropped;
        self
    }

    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = at;
        self
    }

    /// Render the report body
    pub fn render(&self) -> String {
        let test = &self.evaluation.test;
        let mut out = String::new();

        out.push_str("Landslide Susceptibility Evaluation Report\n");
        out.push_str(&format!("{}\n\n", "=".repeat(50)));
        out.push_str(&format!("Generated: {}\n", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")));
        out.push_str(&format!("Model: {} ({})\n", self.model.display_name(), self.model.as_str()));
        out.push_str(&format!("Factors: {}\n", self.factor_names.join(", ")));
        out.push_str(&format!("Training samples: {}\n", self.n_train));
        out.push_str(&format!("Test samples: {}\n", self.n_test));
        if self.dropped_samples > 0 {
            out.push_str(&format!("Dropped samples (missing factor values): {}\n", self.dropped_samples));
        }
        out.push('\n');

        out.push_str("Model performance (test partition):\n");
        out.push_str(&format!("Accuracy: {:.4}\n", test.accuracy));
        out.push_str(&format!("Precision: {:.4}\n", test.precision));
        out.push_str(&format!("Recall: {:.4}\n", test.recall));
        out.push_str(&format!("F1 score: {:.4}\n", test.f1));
        out.push_str(&format!("AUC: {:.4}\n\n", test.auc));

        out.push_str("Confusion matrix [[TN, FP], [FN, TP]]:\n");
        out.push_str(&format!("{}\n\n", test.confusion_matrix));

        out.push_str(&format!("Training accuracy: {:.4}\n", self.evaluation.train.accuracy));
        out.push_str(&format!(
            "Overfitting gap (train - test accuracy): {:.4}\n",
            self.evaluation.overfitting_gap()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ClassificationMetrics;
    use chrono::TimeZone;
    use ndarray::array;

    #[test]
    fn test_render() {
        let train = ClassificationMetrics::compute(&array![0.0, 1.0, 1.0], &array![0.2, 0.9, 0.7]).unwrap();
        let test = ClassificationMetrics::compute(&array![0.0, 1.0], &array![0.6, 0.8]).unwrap();
        let ctx = ReportContext::new(
            vec!["slope".to_string(), "aspect".to_string()],
            3,
            2,
            ClassifierKind::LogisticRegression,
            EvaluationReport { train, test },
        )
        .with_generated_at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let text = ctx.render();
        assert!(text.contains("Generated: 2024-05-01 12:00:00 UTC"));
        assert!(text.contains("Model: Logistic Regression (logistic_regression)"));
        assert!(text.contains("Factors: slope, aspect"));
        assert!(text.contains("Training samples: 3"));
        assert!(text.contains("Test samples: 2"));
        assert!(text.contains("Accuracy: 0.5000"));
        assert!(text.contains("Precision: 0.5000"));
        assert!(text.contains("Recall: 1.0000"));
        assert!(text.contains("F1 score: 0.6667"));
        assert!(text.contains("AUC: 1.0000"));
        assert!(text.contains("[[0, 1],\n [0, 1]]"));
        assert!(!text.contains("Dropped samples"));
        assert!(text.starts_with("Landslide Susceptibility Evaluation Report\n====="));
        assert!(text.ends_with("Overfitting gap (train - test accuracy): 0.5000\n"));
    }
}
