//! Training configuration

use crate::error::{Result, SusceptibilityError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classifier variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Random Forest
    RandomForest,
    /// Gradient Boosted Trees
    GradientBoosting,
    /// Support Vector Machine
    Svm,
    /// Logistic Regression
    LogisticRegression,
    /// Neural Network (MLP)
    NeuralNetwork,
}

impl ClassifierKind {
    /// Every variant, in reporting order
    pub const ALL: [ClassifierKind; 5] = [
        ClassifierKind::RandomForest,
        ClassifierKind::GradientBoosting,
        ClassifierKind::Svm,
        ClassifierKind::LogisticRegression,
        ClassifierKind::NeuralNetwork,
    ];

    /// Canonical configuration tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::RandomForest => "random_forest",
            ClassifierKind::GradientBoosting => "gradient_boosting",
            ClassifierKind::Svm => "svm",
            ClassifierKind::LogisticRegression => "logistic_regression",
            ClassifierKind::NeuralNetwork => "neural_network",
        }
    }

    /// Human-readable name for reports
    pub fn display_name(&self) -> &'static str {
        match self {
            ClassifierKind::RandomForest => "Random Forest",
            ClassifierKind::GradientBoosting => "Gradient Boosting",
            ClassifierKind::Svm => "Support Vector Machine",
            ClassifierKind::LogisticRegression => "Logistic Regression",
            ClassifierKind::NeuralNetwork => "Neural Network",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = SusceptibilityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "random_forest" | "rf" => Ok(ClassifierKind::RandomForest),
            "gradient_boosting" | "gradient_boost" | "gbt" => Ok(ClassifierKind::GradientBoosting),
            "svm" | "svc" => Ok(ClassifierKind::Svm),
            "logistic_regression" | "logistic" => Ok(ClassifierKind::LogisticRegression),
            "neural_network" | "mlp" => Ok(ClassifierKind::NeuralNetwork),
            _ => Err(SusceptibilityError::UnknownVariant(s.to_string())),
        }
    }
}

/// Optional hyperparameter overrides; unset fields take the variant default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Trees for random forest / boosting stages
    pub n_estimators: Option<usize>,
    pub max_depth: Option<usize>,
    pub learning_rate: Option<f64>,
    /// Inverse regularization strength (SVM, logistic regression)
    pub c: Option<f64>,
    /// SVM kernel: rbf, linear, poly or sigmoid
    pub kernel: Option<String>,
    pub hidden_layer_sizes: Option<Vec<usize>>,
}

impl Hyperparameters {
    pub fn n_estimators(&self) -> usize {
        self.n_estimators.unwrap_or(100)
    }

    pub fn max_depth(&self, kind: ClassifierKind) -> usize {
        self.max_depth.unwrap_or(match kind {
            ClassifierKind::GradientBoosting => 5,
            _ => 20,
        })
    }

    pub fn learning_rate(&self, kind: ClassifierKind) -> f64 {
        self.learning_rate.unwrap_or(match kind {
            ClassifierKind::NeuralNetwork => 0.01,
            _ => 0.1,
        })
    }

    pub fn c(&self) -> f64 {
        self.c.unwrap_or(1.0)
    }

    pub fn kernel(&self) -> &str {
        self.kernel.as_deref().unwrap_or("rbf")
    }

    pub fn hidden_layer_sizes(&self) -> Vec<usize> {
        self.hidden_layer_sizes.clone().unwrap_or_else(|| vec![100, 50])
    }

    /// Reject values no variant can train with
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.n_estimators {
            if n == 0 {
                return Err(SusceptibilityError::invalid_parameter("n_estimators", n, "must be at least 1"));
            }
        }
        if let Some(d) = self.max_depth {
            if d == 0 {
                return Err(SusceptibilityError::invalid_parameter("max_depth", d, "must be at least 1"));
            }
        }
        if let Some(lr) = self.learning_rate {
            if !(lr > 0.0 && lr.is_finite()) {
                return Err(SusceptibilityError::invalid_parameter("learning_rate", lr, "must be positive"));
            }
        }
        if let Some(c) = self.c {
            if !(c > 0.0 && c.is_finite()) {
                return Err(SusceptibilityError::invalid_parameter("c", c, "must be positive"));
            }
        }
        if let Some(sizes) = &self.hidden_layer_sizes {
            if sizes.is_empty() || sizes.contains(&0) {
                return Err(SusceptibilityError::invalid_parameter(
                    "hidden_layer_sizes",
                    format!("{:?}", sizes),
                    "layers must be non-empty and non-zero",
                ));
            }
        }
        Ok(())
    }
}

/// Configuration for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub kind: ClassifierKind,
    pub hyperparameters: Hyperparameters,
    /// Seed shared by every stochastic step of the fit
    pub random_state: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::RandomForest,
            hyperparameters: Hyperparameters::default(),
            random_state: 42,
        }
    }
}

impl TrainingConfig {
    pub fn new(kind: ClassifierKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.hyperparameters = hyperparameters;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.hyperparameters.n_estimators = Some(n);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.hyperparameters.max_depth = Some(depth);
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.hyperparameters.learning_rate = Some(lr);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}
