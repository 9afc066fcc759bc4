//! Full-grid susceptibility prediction
//!
//! Every cell of the reference (first) factor is scored with the fitted
//! model. Rows are spread over rayon workers; the model and its
//! normalization are shared read-only, so the output does not depend on
//! the number of threads.

use crate::error::{Result, SusceptibilityError};
use crate::raster::{FactorGrid, SpatialReference};
use crate::training::FittedModel;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Prediction settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Number of parallel workers; `None` uses the global rayon pool
    pub n_workers: Option<usize>,
}

impl PredictionConfig {
    pub fn with_n_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = Some(n_workers);
        self
    }
}

/// P(class 1) per cell on the reference grid; NaN marks a missing cell
#[derive(Debug, Clone)]
pub struct SusceptibilityRaster {
    data: Array2<f64>,
    reference: SpatialReference,
}

/// One scored cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCell {
    pub row: usize,
    pub col: usize,
    /// Cell-center map coordinates
    pub x: f64,
    pub y: f64,
    pub susceptibility: f64,
}

impl SusceptibilityRaster {
    pub fn new(data: Array2<f64>, reference: SpatialReference) -> Result<Self> {
        if data.dim() != reference.shape() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{:?}", reference.shape()),
                actual: format!("{:?}", data.dim()),
            });
        }
        Ok(Self { data, reference })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn reference(&self) -> &SpatialReference {
        &self.reference
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Probability at a cell, `None` when missing or out of range
    pub fn value_at(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get((row, col)).copied().filter(|v| !v.is_nan())
    }

    pub fn is_missing(&self, row: usize, col: usize) -> bool {
        self.value_at(row, col).is_none()
    }

    pub fn n_valid(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn n_missing(&self) -> usize {
        self.data.len() - self.n_valid()
    }

    /// Non-missing cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = ScoredCell> + '_ {
        self.data
            .indexed_iter()
            .filter(|(_, v)| !v.is_nan())
            .map(move |((row, col), &susceptibility)| {
                let (x, y) = self.reference.transform.cell_center(row, col);
                ScoredCell { row, col, x, y, susceptibility }
            })
    }

    /// (min, mean, max) over valid cells
    pub fn summary(&self) -> Option<(f64, f64, f64)> {
        let mut n = 0usize;
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for &v in self.data.iter().filter(|v| !v.is_nan()) {
            n += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        (n > 0).then(|| (min, sum / n as f64, max))
    }
}

/// Scores every reference cell with a fitted model
pub struct SusceptibilityPredictor<'a> {
    model: &'a FittedModel,
    config: PredictionConfig,
}

impl<'a> SusceptibilityPredictor<'a> {
    pub fn new(model: &'a FittedModel) -> Self {
        Self {
            model,
            config: PredictionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PredictionConfig) -> Self {
        self.config = config;
        self
    }

    /// Score the grid. Factor order must match the order the model was trained on.
    pub fn predict(&self, factors: &[FactorGrid]) -> Result<SusceptibilityRaster> {
        let reference = factors.first().ok_or_else(|| {
            SusceptibilityError::InsufficientData("no factor grids to predict on".to_string())
        })?;
        if factors.len() != self.model.n_features() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{} factors", self.model.n_features()),
                actual: format!("{} factors", factors.len()),
            });
        }

        let start = Instant::now();
        let (rows, cols) = reference.shape();

        let pool = match self.config.n_workers {
            Some(n_workers) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n_workers)
                    .build()
                    .map_err(|e| SusceptibilityError::Computation(format!("Thread pool error: {}", e)))?,
            ),
            None => None,
        };

        let score_rows = || -> Result<Vec<Vec<f64>>> {
            (0..rows)
                .into_par_iter()
                .map(|row| self.score_row(factors, row, cols))
                .collect()
        };
        let scored = match &pool {
            Some(pool) => pool.install(score_rows)?,
            None => score_rows()?,
        };

        let data = Array2::from_shape_vec((rows, cols), scored.concat())?;
        let raster = SusceptibilityRaster::new(data, reference.spatial_reference())?;

        info!(
            rows,
            cols,
            valid_cells = raster.n_valid(),
            missing_cells = raster.n_missing(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Predicted susceptibility grid"
        );
        Ok(raster)
    }

    fn score_row(&self, factors: &[FactorGrid], row: usize, cols: usize) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(cols);
        let mut scratch = vec![0.0; factors.len()];
        let mut missing = 0usize;

        'cells: for col in 0..cols {
            for (slot, factor) in scratch.iter_mut().zip(factors) {
                match factor.value_at(row, col) {
                    Some(v) => *slot = v,
                    None => {
                        missing += 1;
                        out.push(f64::NAN);
                        continue 'cells;
                    }
                }
            }
            out.push(self.model.predict_probability_with(&mut scratch)?);
        }

        if missing > 0 {
            debug!(row, missing, "Row has missing cells");
        }
        Ok(out)
    }
}

/// Score every cell of `factors` with `model` on the global rayon pool
pub fn predict(model: &FittedModel, factors: &[FactorGrid]) -> Result<SusceptibilityRaster> {
    SusceptibilityPredictor::new(model).predict(factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Crs, GeoTransform};
    use crate::training::{ClassifierKind, TrainEngine, TrainingConfig};
    use ndarray::{array, Array2};

    fn grid(name: &str, data: Array2<f64>, nodata: Option<f64>) -> FactorGrid {
        FactorGrid::new(
            name,
            data,
            GeoTransform::north_up(0.0, 4.0, 1.0, -1.0),
            Some(Crs::projected(32633)),
            nodata,
        )
    }

    fn model() -> FittedModel {
        let x = array![[0.0, 0.0], [0.5, 1.0], [3.0, 3.0], [3.5, 2.5]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        TrainEngine::new(TrainingConfig::new(ClassifierKind::LogisticRegression))
            .fit(&x, &y)
            .unwrap()
    }

    fn factors() -> Vec<FactorGrid> {
        let a = Array2::from_shape_fn((4, 4), |(r, c)| (r + c) as f64 * 0.5);
        let mut b = Array2::from_shape_fn((4, 4), |(r, c)| r as f64 - c as f64 * 0.1);
        b[[0, 0]] = -9999.0;
        b[[2, 3]] = f64::NAN;
        vec![grid("slope", a, None), grid("rain", b, Some(-9999.0))]
    }

    #[test]
    fn test_missing_cells_propagate() {
        let model = model();
        let raster = predict(&model, &factors()).unwrap();

        assert_eq!(raster.shape(), (4, 4));
        assert!(raster.is_missing(0, 0));
        assert!(raster.is_missing(2, 3));
        assert_eq!(raster.n_missing(), 2);
        assert!(raster.data().iter().filter(|v| !v.is_nan()).all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_cell_matches_single_prediction() {
        let model = model();
        let factors = factors();
        let raster = predict(&model, &factors).unwrap();

        let expected = model
            .predict_probability(&[factors[0].data()[[3, 1]], factors[1].data()[[3, 1]]])
            .unwrap();
        assert!((raster.value_at(3, 1).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let model = model();
        let factors = factors();
        let a = predict(&model, &factors).unwrap();
        let b = SusceptibilityPredictor::new(&model)
            .with_config(PredictionConfig::default().with_n_workers(1))
            .predict(&factors)
            .unwrap();
        for (x, y) in a.data().iter().zip(b.data().iter()) {
            assert!(x == y || (x.is_nan() && y.is_nan()));
        }
    }

    #[test]
    fn test_smaller_factor_leaves_cells_missing() {
        let model = model();
        let mut factors = factors();
        factors[1] = grid("rain", Array2::from_elem((2, 4), 1.0), None);
        let raster = predict(&model, &factors).unwrap();
        assert!(!raster.is_missing(1, 2));
        assert!((2..4).all(|r| (0..4).all(|c| raster.is_missing(r, c))));
    }

    #[test]
    fn test_factor_count_must_match_model() {
        let model = model();
        let factors = factors();
        assert!(matches!(
            predict(&model, &factors[..1]),
            Err(SusceptibilityError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_cells_are_cell_centers() {
        let model = model();
        let raster = predict(&model, &factors()).unwrap();
        let first = raster.cells().next().unwrap();
        assert_eq!((first.row, first.col), (0, 1));
        assert_eq!((first.x, first.y), (1.5, 3.5));
        assert_eq!(raster.cells().count(), 14);
    }
}
