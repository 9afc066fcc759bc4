//! Persisted models

use crate::error::{Result, SusceptibilityError};
use crate::prediction::{PredictionConfig, SusceptibilityPredictor, SusceptibilityRaster};
use crate::raster::FactorStore;
use crate::training::{ClassifierKind, FittedModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

const FORMAT_VERSION: u32 = 1;

/// A fitted model with the factor order it expects, stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModel {
    pub format_version: u32,
    pub crate_version: String,
    pub factor_names: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub model: FittedModel,
}

impl SavedModel {
    pub fn new(factor_names: Vec<String>, model: FittedModel) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            factor_names,
            created_at: Utc::now(),
            model,
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        self.model.kind()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), model = self.kind().as_str(), "Saved model");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let saved: Self = serde_json::from_str(&json)?;
        if saved.format_version != FORMAT_VERSION {
            return Err(SusceptibilityError::Serialization(format!(
                "unsupported model format version {} (expected {})",
                saved.format_version, FORMAT_VERSION
            )));
        }
        if saved.factor_names.len() != saved.model.n_features() {
            return Err(SusceptibilityError::Serialization(format!(
                "model lists {} factors but was trained on {}",
                saved.factor_names.len(),
                saved.model.n_features()
            )));
        }
        Ok(saved)
    }

    /// Score new factor rasters, given in the training factor order
    pub fn predict(&self, factors: &FactorStore, config: PredictionConfig) -> Result<SusceptibilityRaster> {
        let names = factors.names();
        if names.len() != self.factor_names.len() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{} factors ({})", self.factor_names.len(), self.factor_names.join(", ")),
                actual: format!("{} factors ({})", names.len(), names.join(", ")),
            });
        }
        for (expected, actual) in self.factor_names.iter().zip(&names) {
            if expected != actual {
                warn!(expected = %expected, actual = %actual, "Factor name differs from training");
            }
        }

        SusceptibilityPredictor::new(&self.model)
            .with_config(config)
            .predict(factors.factors())
    }
}
