//! End-to-end susceptibility pipeline
//!
//! Each stage consumes the previous stage's context and returns a new one:
//!
//! ```text
//! LoadedFactors -> SampledData -> PreparedData -> TrainedPipeline
//! ```
//!
//! [`run`] drives every stage from a [`PipelineConfig`] and exports the results.

mod config;
mod saved;

pub use config::PipelineConfig;
pub use saved::SavedModel;

use crate::dataset::{Dataset, DatasetBuilder, TrainTestSplit};
use crate::error::{Result, SusceptibilityError};
use crate::evaluation::{cross_validate, ClassificationMetrics, CrossValidationReport, EvaluationReport};
use crate::export::{self, ExportPaths, ReportContext};
use crate::prediction::{PredictionConfig, SusceptibilityPredictor, SusceptibilityRaster};
use crate::raster::{check_alignment, AlignmentReport, FactorGrid, FactorStore};
use crate::sampling::{load_points_csv, ClassLabel, FeatureVector, SampleExtractor, SamplePoint};
use crate::training::{ClassifierKind, FittedModel, TrainEngine, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Folds used when comparing classifiers
pub const DEFAULT_CV_FOLDS: usize = 5;

/// Factor grids plus their alignment check
#[derive(Debug, Clone)]
pub struct LoadedFactors {
    store: FactorStore,
    alignment: AlignmentReport,
}

impl LoadedFactors {
    /// Load every factor path; misalignment warns, or fails when `strict`
    pub fn load<P: AsRef<Path>>(paths: &[P], strict: bool) -> Result<Self> {
        Self::from_store(FactorStore::load(paths)?, strict)
    }

    pub fn from_store(store: FactorStore, strict: bool) -> Result<Self> {
        let alignment = check_alignment(store.factors());
        if !alignment.is_aligned() {
            if strict {
                return Err(SusceptibilityError::MisalignedFactors(alignment.summary()));
            }
            debug!(
                mismatched = alignment.mismatches.len(),
                "Factor grids are not aligned with the reference; cells outside a factor will be missing"
            );
        }
        Ok(Self { store, alignment })
    }

    pub fn store(&self) -> &FactorStore {
        &self.store
    }

    pub fn factors(&self) -> &[FactorGrid] {
        self.store.factors()
    }

    pub fn alignment(&self) -> &AlignmentReport {
        &self.alignment
    }

    /// Sample every factor at the positive and negative points
    pub fn sample(self, positive: &[SamplePoint], negative: &[SamplePoint]) -> SampledData {
        let extractor = SampleExtractor::new(self.store.factors());
        let positive = extractor.extract(positive);
        let negative = extractor.extract(negative);
        SampledData {
            factors: self,
            positive,
            negative,
        }
    }

    /// Read both point files and sample them
    pub fn sample_csv(self, positive: &Path, negative: &Path) -> Result<SampledData> {
        let positive = load_points_csv(positive, ClassLabel::Positive)?;
        let negative = load_points_csv(negative, ClassLabel::Negative)?;
        Ok(self.sample(&positive, &negative))
    }
}

/// Raw feature vectors for both classes, missing values included
#[derive(Debug, Clone)]
pub struct SampledData {
    factors: LoadedFactors,
    positive: Vec<FeatureVector>,
    negative: Vec<FeatureVector>,
}

impl SampledData {
    pub fn factors(&self) -> &LoadedFactors {
        &self.factors
    }

    pub fn positive(&self) -> &[FeatureVector] {
        &self.positive
    }

    pub fn negative(&self) -> &[FeatureVector] {
        &self.negative
    }

    /// Drop incomplete rows, then split stratified by class
    pub fn prepare(self, test_ratio: f64, seed: u64) -> Result<PreparedData> {
        let (dataset, dropped) = DatasetBuilder::build(&self.positive, &self.negative)?;
        let split = dataset.split(test_ratio, seed)?;
        info!(
            train = split.n_train(),
            test = split.n_test(),
            dropped,
            "Prepared dataset"
        );
        Ok(PreparedData {
            factors: self.factors,
            dataset,
            split,
            dropped,
        })
    }
}

/// Clean dataset and its train/test split
#[derive(Debug, Clone)]
pub struct PreparedData {
    factors: LoadedFactors,
    dataset: Dataset,
    split: TrainTestSplit,
    dropped: usize,
}

impl PreparedData {
    pub fn factors(&self) -> &LoadedFactors {
        &self.factors
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn split(&self) -> &TrainTestSplit {
        &self.split
    }

    /// Samples dropped for missing factor values
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Fit and evaluate one classifier without consuming the prepared data
    pub fn fit(&self, config: &TrainingConfig) -> Result<(FittedModel, EvaluationReport)> {
        let model = TrainEngine::new(config.clone()).train(&self.split)?;
        let evaluation = EvaluationReport::from_split(&model, &self.split)?;
        Ok((model, evaluation))
    }

    pub fn train(self, config: &TrainingConfig) -> Result<TrainedPipeline> {
        let (model, evaluation) = self.fit(config)?;
        Ok(TrainedPipeline {
            prepared: self,
            model,
            evaluation,
        })
    }

    /// Test metrics and cross-validated scores for every classifier variant.
    ///
    /// Cross-validation runs on the training partition; `k` shrinks to the
    /// smaller class count when needed and CV is skipped below two folds.
    pub fn compare(&self, base: &TrainingConfig, k: usize) -> Result<Vec<ModelComparison>> {
        let min_class = {
            let n_pos = self.split.y_train.iter().filter(|&&y| y >= 0.5).count();
            n_pos.min(self.split.n_train() - n_pos)
        };
        let k = k.min(min_class);

        ClassifierKind::ALL
            .iter()
            .map(|&kind| -> Result<ModelComparison> {
                let config = TrainingConfig { kind, ..base.clone() };
                let start = Instant::now();
                let (_, evaluation) = self.fit(&config)?;
                let training_time_secs = start.elapsed().as_secs_f64();
                let cv = if k >= 2 {
                    Some(cross_validate(&self.split.x_train, &self.split.y_train, &config, k)?)
                } else {
                    warn!(model = kind.as_str(), "Too few training samples per class for cross-validation");
                    None
                };
                Ok(ModelComparison {
                    kind,
                    test: evaluation.test,
                    cross_validation: cv,
                    training_time_secs,
                })
            })
            .collect()
    }
}

/// One row of a classifier comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub kind: ClassifierKind,
    pub test: ClassificationMetrics,
    pub cross_validation: Option<CrossValidationReport>,
    pub training_time_secs: f64,
}

/// A fitted model together with everything it was trained from
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    prepared: PreparedData,
    model: FittedModel,
    evaluation: EvaluationReport,
}

impl TrainedPipeline {
    pub fn prepared(&self) -> &PreparedData {
        &self.prepared
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    pub fn evaluation(&self) -> &EvaluationReport {
        &self.evaluation
    }

    pub fn factor_names(&self) -> Vec<String> {
        self.prepared.factors.store.names()
    }

    /// Score every cell of the reference grid
    pub fn predict(&self, config: PredictionConfig) -> Result<SusceptibilityRaster> {
        SusceptibilityPredictor::new(&self.model)
            .with_config(config)
            .predict(self.prepared.factors.factors())
    }

    pub fn report_context(&self) -> ReportContext {
        ReportContext::new(
            self.factor_names(),
            self.prepared.split.n_train(),
            self.prepared.split.n_test(),
            self.model.kind(),
            self.evaluation.clone(),
        )
        .with_dropped_samples(self.prepared.dropped)
    }

    pub fn export(&self, raster: &SusceptibilityRaster, dir: &Path) -> Result<ExportPaths> {
        export::export(raster, &self.report_context(), dir)
    }

    pub fn saved_model(&self) -> SavedModel {
        SavedModel::new(self.factor_names(), self.model.clone())
    }

    pub fn save_model(&self, path: &Path) -> Result<()> {
        self.saved_model().save(path)
    }
}

/// Result of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub paths: ExportPaths,
    pub evaluation: EvaluationReport,
    pub model: ClassifierKind,
    pub n_train: usize,
    pub n_test: usize,
    pub dropped: usize,
    pub raster_shape: (usize, usize),
    pub valid_cells: usize,
    pub saved_model: Option<PathBuf>,
}

/// Load, sample, prepare, train, evaluate, predict and export
pub fn run(config: &PipelineConfig) -> Result<PipelineOutcome> {
    config.validate()?;
    let training = config.training_config()?;
    let start = Instant::now();

    let trained = LoadedFactors::load(&config.factors, config.strict_alignment)?
        .sample_csv(&config.positive_points, &config.negative_points)?
        .prepare(config.test_ratio, config.seed)?
        .train(&training)?;

    let prediction = PredictionConfig { n_workers: config.n_workers };
    let raster = trained.predict(prediction)?;
    let paths = trained.export(&raster, &config.output_dir)?;

    if let Some(path) = &config.save_model {
        trained.save_model(path)?;
    }

    info!(
        model = training.kind.as_str(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Pipeline finished"
    );

    Ok(PipelineOutcome {
        paths,
        evaluation: trained.evaluation().clone(),
        model: training.kind,
        n_train: trained.prepared().split().n_train(),
        n_test: trained.prepared().split().n_test(),
        dropped: trained.prepared().dropped(),
        raster_shape: raster.shape(),
        valid_cells: raster.n_valid(),
        saved_model: config.save_model.clone(),
    })
}

/// Compare all classifier variants on the configured data
pub fn compare(config: &PipelineConfig, k: usize) -> Result<Vec<ModelComparison>> {
    config.validate()?;
    let training = config.training_config()?;
    LoadedFactors::load(&config.factors, config.strict_alignment)?
        .sample_csv(&config.positive_points, &config.negative_points)?
        .prepare(config.test_ratio, config.seed)?
        .compare(&training, k)
}

/// Paths written by [`predict_with_saved`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionPaths {
    pub raster: PathBuf,
    pub table: PathBuf,
}

/// Apply a saved model to new factor rasters and write the map and table
pub fn predict_with_saved<P: AsRef<Path>>(
    model_path: &Path,
    factors: &[P],
    output_dir: &Path,
    config: PredictionConfig,
) -> Result<PredictionPaths> {
    let saved = SavedModel::load(model_path)?;
    let store = FactorStore::load(factors)?;
    let raster = saved.predict(&store, config)?;

    std::fs::create_dir_all(output_dir)?;
    let paths = ExportPaths::in_dir(output_dir);
    export::write_raster(&raster, &paths.raster)?;
    export::write_table(&raster, &paths.table)?;

    Ok(PredictionPaths {
        raster: paths.raster,
        table: paths.table,
    })
}
