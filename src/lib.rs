//! Landslide susceptibility mapping
//!
//! Turns a stack of conditioning-factor rasters (slope, lithology, rainfall, ...)
//! and a landslide inventory into a per-cell probability of landslide occurrence.
//!
//! # Modules
//!
//! ## Data
//! - [`raster`] - GeoTIFF factor grids, geotransforms and alignment checks
//! - [`sampling`] - Inventory points and factor value extraction
//! - [`dataset`] - Complete-case feature matrix and stratified split
//! - [`preprocessing`] - Feature standardization
//!
//! ## Modelling
//! - [`training`] - Classifier variants, cross-validation and the training engine
//! - [`calibration`] - Platt scaling for margin-based classifiers
//! - [`evaluation`] - Classification metrics and cross-validated reports
//! - [`prediction`] - Full-grid susceptibility scoring
//!
//! ## Output
//! - [`export`] - Susceptibility GeoTIFF, cell table and text report
//! - [`pipeline`] - Staged pipeline, configuration and saved models
//! - [`cli`] - Command-line interface

pub mod error;

pub mod raster;
pub mod sampling;
pub mod dataset;
pub mod preprocessing;

pub mod training;
pub mod calibration;
pub mod evaluation;
pub mod prediction;

pub mod export;
pub mod pipeline;
pub mod cli;

pub use error::{Result, SusceptibilityError};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{Result, SusceptibilityError};
    pub use crate::raster::{FactorGrid, FactorStore, GeoTransform, SpatialReference};
    pub use crate::sampling::{ClassLabel, SamplePoint};
    pub use crate::dataset::{Dataset, TrainTestSplit};
    pub use crate::training::{ClassifierKind, FittedModel, Hyperparameters, TrainEngine, TrainingConfig};
    pub use crate::evaluation::{ClassificationMetrics, EvaluationReport};
    pub use crate::prediction::{PredictionConfig, SusceptibilityRaster};
    pub use crate::pipeline::{PipelineConfig, SavedModel};
}
