//! Classifier trait shared by every variant

use crate::error::{Result, SusceptibilityError};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Probability threshold separating the two classes
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Binary classifier over standardized feature rows.
///
/// Labels are `0.0` (negative) and `1.0` (positive); probabilities always
/// refer to the positive class.
pub trait Classifier: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// P(class 1) for every row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// P(class 1) for a single row
    fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        let x = row.to_owned().insert_axis(Axis(0));
        Ok(self.predict_proba(&x)?[0])
    }

    /// Hard labels from [`DECISION_THRESHOLD`]
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= DECISION_THRESHOLD { 1.0 } else { 0.0 }))
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Validate a training matrix against its labels.
///
/// Requires matching lengths, at least one row, finite features and 0/1 labels.
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(SusceptibilityError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(SusceptibilityError::InsufficientData(
            "no training samples".to_string(),
        ));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SusceptibilityError::Computation(
            "training features contain non-finite values".to_string(),
        ));
    }
    if y.iter().any(|&l| l != 0.0 && l != 1.0) {
        return Err(SusceptibilityError::Computation(
            "labels must be 0 or 1".to_string(),
        ));
    }
    Ok(())
}

/// Logistic function, stable for large |z|
#[inline]
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Constant(f64);

    impl Classifier for Constant {
        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
            Ok(())
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(Array1::from_elem(x.nrows(), self.0))
        }
    }

    #[test]
    fn test_default_predict_thresholds_at_half() {
        let x = array![[1.0], [2.0]];
        assert_eq!(Constant(0.5).predict(&x).unwrap(), array![1.0, 1.0]);
        assert_eq!(Constant(0.49).predict(&x).unwrap(), array![0.0, 0.0]);
        assert_eq!(Constant(0.7).predict_proba_row(&x.row(0)).unwrap(), 0.7);
    }

    #[test]
    fn test_check_training_data() {
        assert!(check_training_data(&array![[1.0], [2.0]], &array![0.0, 1.0]).is_ok());
        assert!(check_training_data(&array![[1.0]], &array![0.0, 1.0]).is_err());
        assert!(check_training_data(&array![[f64::NAN]], &array![1.0]).is_err());
        assert!(check_training_data(&array![[1.0]], &array![2.0]).is_err());
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
    }
}
