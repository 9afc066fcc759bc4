//! Feature standardization

use crate::error::{Result, SusceptibilityError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-factor center and scale learned from the training partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub mean: Array1<f64>,
    /// Population standard deviation, 1.0 for constant factors
    pub scale: Array1<f64>,
}

impl NormalizationParams {
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one feature row
    pub fn apply(&self, row: ArrayView1<f64>) -> Array1<f64> {
        (&row - &self.mean) / &self.scale
    }

    /// Standardize a single row in place
    #[inline]
    pub fn apply_in_place(&self, row: &mut [f64]) {
        for ((v, m), s) in row.iter_mut().zip(self.mean.iter()).zip(self.scale.iter()) {
            *v = (*v - m) / s;
        }
    }
}

/// Standard scaler: `(x - mean) / std`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Option<NormalizationParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self { params: None }
    }

    /// Rebuild a fitted scaler from stored parameters
    pub fn from_params(params: NormalizationParams) -> Self {
        Self { params: Some(params) }
    }

    /// Learn mean and population std per column
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(SusceptibilityError::InsufficientData(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            SusceptibilityError::Computation("mean of empty matrix".to_string())
        })?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });

        self.params = Some(NormalizationParams { mean, scale });
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params()?;
        if x.ncols() != params.n_features() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{} columns", params.n_features()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok((x - &params.mean) / &params.scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params()?;
        Ok(x * &params.scale + &params.mean)
    }

    pub fn params(&self) -> Result<&NormalizationParams> {
        self.params.as_ref().ok_or(SusceptibilityError::ModelNotFitted)
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0], [5.0, 10.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        let mean = scaled.column(0).mean().unwrap();
        assert!(mean.abs() < 1e-10);
        // population std of 1..5 is sqrt(2)
        assert!((scaler.params().unwrap().scale[0] - 2.0f64.sqrt()).abs() < 1e-12);
        // constant column keeps scale 1 and maps to zero
        assert_eq!(scaler.params().unwrap().scale[1], 1.0);
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_inverse_transform() {
        let x = array![[1.0, -3.0], [2.0, 0.5], [7.0, 2.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();
        for (a, b) in x.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_apply_matches_transform() {
        let x = array![[1.0, 4.0], [3.0, 8.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        let params = scaler.params().unwrap();

        assert_eq!(params.apply(x.row(1)), scaled.row(1).to_owned());
        let mut row = vec![1.0, 4.0];
        params.apply_in_place(&mut row);
        assert_eq!(row, scaled.row(0).to_vec());
    }

    #[test]
    fn test_unfitted() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(SusceptibilityError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_column_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(SusceptibilityError::ShapeError { .. })
        ));
    }
}
