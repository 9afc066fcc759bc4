//! Pipeline configuration

use crate::error::{Result, SusceptibilityError};
use crate::training::{ClassifierKind, Hyperparameters, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Inputs, outputs and model settings for one pipeline run.
///
/// Loaded from JSON; every field except the input paths has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Factor GeoTIFFs; the first is the reference grid
    pub factors: Vec<PathBuf>,
    /// CSV of landslide (positive) locations
    pub positive_points: PathBuf,
    /// CSV of non-landslide (negative) locations
    pub negative_points: PathBuf,
    pub output_dir: PathBuf,
    /// Classifier tag or alias, resolved by [`classifier_kind`](Self::classifier_kind)
    pub model: String,
    pub hyperparameters: Hyperparameters,
    pub test_ratio: f64,
    pub seed: u64,
    /// Fail on misaligned factor grids instead of warning
    pub strict_alignment: bool,
    /// Also write the fitted model as JSON here
    pub save_model: Option<PathBuf>,
    /// Prediction worker threads; `None` uses every core
    pub n_workers: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            factors: Vec::new(),
            positive_points: PathBuf::new(),
            negative_points: PathBuf::new(),
            output_dir: PathBuf::from("output"),
            model: ClassifierKind::RandomForest.as_str().to_string(),
            hyperparameters: Hyperparameters::default(),
            test_ratio: 0.3,
            seed: 42,
            strict_alignment: false,
            save_model: None,
            n_workers: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(
        factors: Vec<PathBuf>,
        positive_points: impl Into<PathBuf>,
        negative_points: impl Into<PathBuf>,
    ) -> Self {
        Self {
            factors,
            positive_points: positive_points.into(),
            negative_points: negative_points.into(),
            ..Default::default()
        }
    }

    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Write this configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.hyperparameters = hyperparameters;
        self
    }

    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_strict_alignment(mut self, strict: bool) -> Self {
        self.strict_alignment = strict;
        self
    }

    pub fn with_save_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_model = Some(path.into());
        self
    }

    pub fn with_n_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = Some(n_workers);
        self
    }

    /// Resolve the `model` tag; unknown tags are `UnknownVariant`
    pub fn classifier_kind(&self) -> Result<ClassifierKind> {
        self.model.parse()
    }

    pub fn training_config(&self) -> Result<TrainingConfig> {
        Ok(TrainingConfig::new(self.classifier_kind()?)
            .with_hyperparameters(self.hyperparameters.clone())
            .with_random_state(self.seed))
    }

    /// Check everything that can be checked before touching the filesystem
    pub fn validate(&self) -> Result<()> {
        if self.factors.is_empty() {
            return Err(SusceptibilityError::Format(
                "at least one factor raster is required".to_string(),
            ));
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(SusceptibilityError::invalid_parameter(
                "test_ratio",
                self.test_ratio,
                "must lie in (0, 1)",
            ));
        }
        if self.n_workers == Some(0) {
            return Err(SusceptibilityError::invalid_parameter("n_workers", 0, "must be at least 1"));
        }
        self.classifier_kind()?;
        self.hyperparameters.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_from_sparse_json() {
        let json = r#"{
            "factors": ["slope.tif", "rain.tif"],
            "positive_points": "landslides.csv",
            "negative_points": "stable.csv",
            "model": "gbt",
            "hyperparameters": { "n_estimators": 50 }
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.factors.len(), 2);
        assert_eq!(config.test_ratio, 0.3);
        assert_eq!(config.seed, 42);
        assert!(!config.strict_alignment);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.classifier_kind().unwrap(), ClassifierKind::GradientBoosting);
        assert_eq!(config.hyperparameters.n_estimators(), 50);
        assert_eq!(config.hyperparameters.max_depth(ClassifierKind::GradientBoosting), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_model_tag() {
        let config = PipelineConfig::new(vec!["a.tif".into()], "p.csv", "n.csv").with_model("xgboost");
        assert!(matches!(config.validate(), Err(SusceptibilityError::UnknownVariant(_))));
        assert!(matches!(config.training_config(), Err(SusceptibilityError::UnknownVariant(_))));
    }

    #[test]
    fn test_invalid_ratio_and_empty_factors() {
        let config = PipelineConfig::new(vec!["a.tif".into()], "p.csv", "n.csv").with_test_ratio(1.0);
        assert!(matches!(config.validate(), Err(SusceptibilityError::InvalidParameter { .. })));

        let config = PipelineConfig::new(Vec::new(), "p.csv", "n.csv");
        assert!(matches!(config.validate(), Err(SusceptibilityError::Format(_))));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PipelineConfig::new(vec!["a.tif".into()], "p.csv", "n.csv")
            .with_model("svm")
            .with_seed(7)
            .with_save_model("model.json");
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap(), config);
    }
}
