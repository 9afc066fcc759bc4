//! Sample points and feature extraction
//!
//! Maps landslide / non-landslide point locations onto the factor grids.
//! Each point yields one value per factor, or `None` when the point falls
//! outside that factor's grid or hits a no-data cell. No interpolation.

mod points;

pub use points::load_points_csv;

use crate::raster::FactorGrid;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Binary class of a sample point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLabel {
    /// Non-landslide (0)
    Negative,
    /// Landslide (1)
    Positive,
}

impl ClassLabel {
    pub fn as_f64(self) -> f64 {
        match self {
            ClassLabel::Negative => 0.0,
            ClassLabel::Positive => 1.0,
        }
    }

    pub fn from_f64(value: f64) -> Self {
        if value >= 0.5 {
            ClassLabel::Positive
        } else {
            ClassLabel::Negative
        }
    }
}

/// Geographic location with a class label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub label: ClassLabel,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, label: ClassLabel) -> Self {
        Self { x, y, label }
    }

    pub fn positive(x: f64, y: f64) -> Self {
        Self::new(x, y, ClassLabel::Positive)
    }

    pub fn negative(x: f64, y: f64) -> Self {
        Self::new(x, y, ClassLabel::Negative)
    }
}

/// Per-factor values at one point, in factor order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<Option<f64>>,
}

impl FeatureVector {
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    /// All values, or `None` if any factor is missing
    pub fn complete_values(&self) -> Option<Vec<f64>> {
        self.values.iter().copied().collect()
    }

    pub fn n_missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// Samples factor grids at point locations
pub struct SampleExtractor<'a> {
    factors: &'a [FactorGrid],
}

impl<'a> SampleExtractor<'a> {
    pub fn new(factors: &'a [FactorGrid]) -> Self {
        Self { factors }
    }

    /// Values of every factor at one point
    pub fn sample(&self, point: &SamplePoint) -> FeatureVector {
        FeatureVector {
            values: self.factors.iter().map(|f| f.sample(point.x, point.y)).collect(),
        }
    }

    /// One feature vector per point, in input order
    pub fn extract(&self, points: &[SamplePoint]) -> Vec<FeatureVector> {
        let vectors: Vec<FeatureVector> = points.iter().map(|p| self.sample(p)).collect();
        debug!(
            points = points.len(),
            incomplete = vectors.iter().filter(|v| !v.is_complete()).count(),
            "Extracted feature vectors"
        );
        vectors
    }
}

/// Convenience wrapper over [`SampleExtractor::extract`]
pub fn extract(points: &[SamplePoint], factors: &[FactorGrid]) -> Vec<FeatureVector> {
    SampleExtractor::new(factors).extract(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use ndarray::Array2;

    fn factor(name: &str, nodata: Option<f64>) -> FactorGrid {
        let data = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f64);
        FactorGrid::new(name, data, GeoTransform::north_up(0.0, 40.0, 10.0, 10.0), None, nodata)
    }

    #[test]
    fn test_cell_center_returns_stored_value() {
        let grid = factor("slope", None);
        let t = *grid.transform();
        let factors = vec![grid];
        for row in 0..4 {
            for col in 0..4 {
                let (x, y) = t.cell_center(row, col);
                let v = extract(&[SamplePoint::positive(x, y)], &factors);
                assert_eq!(v[0].values, vec![Some((row * 4 + col) as f64)]);
            }
        }
    }

    #[test]
    fn test_nodata_and_outside_are_missing() {
        let factors = vec![factor("slope", Some(5.0)), factor("aspect", None)];
        let t = *factors[0].transform();
        let (x, y) = t.cell_center(1, 1);
        let points = [SamplePoint::negative(x, y), SamplePoint::negative(-5.0, 45.0)];

        let vectors = extract(&points, &factors);
        assert_eq!(vectors[0].values, vec![None, Some(5.0)]);
        assert_eq!(vectors[1].n_missing(), 2);
        assert!(vectors[0].complete_values().is_none());
    }

    #[test]
    fn test_label_conversion() {
        assert_eq!(ClassLabel::Positive.as_f64(), 1.0);
        assert_eq!(ClassLabel::from_f64(0.0), ClassLabel::Negative);
    }
}
