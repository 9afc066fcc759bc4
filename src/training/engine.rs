//! Training engine implementation

use super::config::{ClassifierKind, Hyperparameters, TrainingConfig};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::models::{Classifier, DECISION_THRESHOLD};
use super::neural_network::{MLPClassifier, MLPConfig};
use super::random_forest::RandomForest;
use super::svm::{KernelType, SVMClassifier, SVMConfig};
use crate::dataset::TrainTestSplit;
use crate::error::{Result, SusceptibilityError};
use crate::preprocessing::{NormalizationParams, StandardScaler};
use crate::sampling::ClassLabel;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", content = "state", rename_all = "snake_case")]
pub enum TrainedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    Svm(SVMClassifier),
    LogisticRegression(LogisticRegression),
    NeuralNetwork(MLPClassifier),
}

impl TrainedModel {
    /// Unfitted classifier for `kind`, configured from the overrides and seed
    pub fn build(kind: ClassifierKind, hp: &Hyperparameters, seed: u64) -> Result<Self> {
        hp.validate()?;
        let model = match kind {
            ClassifierKind::RandomForest => TrainedModel::RandomForest(
                RandomForest::new(hp.n_estimators())
                    .with_max_depth(hp.max_depth(kind))
                    .with_random_state(seed),
            ),
            ClassifierKind::GradientBoosting => {
                TrainedModel::GradientBoosting(GradientBoostingClassifier::new(
                    GradientBoostingConfig {
                        n_estimators: hp.n_estimators(),
                        learning_rate: hp.learning_rate(kind),
                        max_depth: hp.max_depth(kind),
                        random_state: Some(seed),
                        ..Default::default()
                    },
                ))
            }
            ClassifierKind::Svm => TrainedModel::Svm(SVMClassifier::new(SVMConfig {
                c: hp.c(),
                kernel: hp.kernel().parse::<KernelType>()?,
                random_state: Some(seed),
                ..Default::default()
            })),
            ClassifierKind::LogisticRegression => {
                TrainedModel::LogisticRegression(LogisticRegression::new().with_c(hp.c()))
            }
            ClassifierKind::NeuralNetwork => TrainedModel::NeuralNetwork(MLPClassifier::new(
                MLPConfig {
                    hidden_layers: hp.hidden_layer_sizes(),
                    learning_rate: hp.learning_rate(kind),
                    random_state: Some(seed),
                    ..Default::default()
                },
            )),
        };
        Ok(model)
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            TrainedModel::RandomForest(_) => ClassifierKind::RandomForest,
            TrainedModel::GradientBoosting(_) => ClassifierKind::GradientBoosting,
            TrainedModel::Svm(_) => ClassifierKind::Svm,
            TrainedModel::LogisticRegression(_) => ClassifierKind::LogisticRegression,
            TrainedModel::NeuralNetwork(_) => ClassifierKind::NeuralNetwork,
        }
    }

    pub fn as_classifier(&self) -> &dyn Classifier {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::Svm(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::NeuralNetwork(m) => m,
        }
    }

    fn as_classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::Svm(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::NeuralNetwork(m) => m,
        }
    }
}

/// A fitted classifier together with the normalization it was trained under.
///
/// Every prediction method takes raw factor values; standardization happens here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    normalization: NormalizationParams,
    model: TrainedModel,
}

impl FittedModel {
    pub fn new(normalization: NormalizationParams, model: TrainedModel) -> Self {
        Self { normalization, model }
    }

    pub fn kind(&self) -> ClassifierKind {
        self.model.kind()
    }

    pub fn normalization(&self) -> &NormalizationParams {
        &self.normalization
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn n_features(&self) -> usize {
        self.normalization.n_features()
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{} features", self.n_features()),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }

    /// P(class 1) for one raw feature vector
    pub fn predict_probability(&self, vector: &[f64]) -> Result<f64> {
        self.check_width(vector.len())?;
        let row = self.normalization.apply(ArrayView1::from(vector));
        self.model.as_classifier().predict_proba_row(&row.view())
    }

    /// Same as [`predict_probability`](Self::predict_probability) but writes the
    /// standardized values into `scratch`, avoiding an allocation per call
    pub(crate) fn predict_probability_with(&self, scratch: &mut [f64]) -> Result<f64> {
        self.check_width(scratch.len())?;
        self.normalization.apply_in_place(scratch);
        let row = ArrayView1::from(&*scratch);
        self.model.as_classifier().predict_proba_row(&row)
    }

    pub fn predict_label(&self, vector: &[f64]) -> Result<ClassLabel> {
        let p = self.predict_probability(vector)?;
        Ok(if p >= DECISION_THRESHOLD {
            ClassLabel::Positive
        } else {
            ClassLabel::Negative
        })
    }

    /// P(class 1) for every row of a raw feature matrix
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x.ncols())?;
        let scaled = (x - &self.normalization.mean) / &self.normalization.scale;
        self.model.as_classifier().predict_proba(&scaled)
    }

    /// 0/1 labels for every row of a raw feature matrix
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= DECISION_THRESHOLD { 1.0 } else { 0.0 }))
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.model.as_classifier().feature_importances()
    }
}

/// Main training engine
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit scaler and classifier on the training partition of `split`
    pub fn train(&self, split: &TrainTestSplit) -> Result<FittedModel> {
        self.fit(&split.x_train, &split.y_train)
    }

    /// Fit the scaler on `x`, then the configured classifier on the scaled rows
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel> {
        let start = Instant::now();
        let kind = self.config.kind;

        let mut model = TrainedModel::build(kind, &self.config.hyperparameters, self.config.random_state)?;

        let mut scaler = StandardScaler::new();
        let x_scaled = scaler.fit_transform(x)?;
        debug!(rows = x.nrows(), features = x.ncols(), "Fitted standard scaler");

        model.as_classifier_mut().fit(&x_scaled, y)?;

        info!(
            model = kind.as_str(),
            samples = x.nrows(),
            features = x.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Trained classifier"
        );

        Ok(FittedModel::new(scaler.params()?.clone(), model))
    }
}

/// Train `config.kind` on one fold's rows of `x`/`y`
pub(crate) fn fit_rows(
    config: &TrainingConfig,
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
) -> Result<FittedModel> {
    TrainEngine::new(config.clone()).fit(&x.select(Axis(0), rows), &y.select(Axis(0), rows))
}
