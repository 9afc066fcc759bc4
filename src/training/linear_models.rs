//! Linear models

use super::models::{check_training_data, sigmoid, Classifier};
use crate::error::{Result, SusceptibilityError};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// L2-regularized logistic regression fitted by full-batch gradient descent
///
/// Minimizes `mean(log_loss) + ||w||² / (2 * C * n)`, the same objective as
/// the usual `C`-parameterized formulation divided by `C * n`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            is_fitted: false,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Fit the model by gradient descent with a backtracking line search.
    ///
    /// `learning_rate` is the initial step of every iteration; it is halved until
    /// the objective decreases enough, so strong regularization cannot diverge.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_training_data(x, y)?;
        if !(self.c > 0.0) {
            return Err(SusceptibilityError::invalid_parameter("c", self.c, "must be positive"));
        }

        let n_samples = x.nrows() as f64;
        let alpha = 1.0 / (self.c * n_samples);

        let objective = |w: &Array1<f64>, b: f64| -> f64 {
            let log_loss: f64 = (x.dot(w) + b)
                .iter()
                .zip(y.iter())
                .map(|(&z, &t)| softplus(z) - t * z)
                .sum();
            log_loss / n_samples + 0.5 * alpha * w.dot(w)
        };

        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;
        let mut current = objective(&weights, bias);

        for _iter in 0..self.max_iter {
            let predictions = (x.dot(&weights) + bias).mapv(sigmoid);

            // Gradients
            let errors = &predictions - y;
            let dw = x.t().dot(&errors) / n_samples + alpha * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let grad_sq = dw.dot(&dw) + db * db;
            if grad_sq.sqrt() < self.tol {
                break;
            }

            // Armijo backtracking
            let mut step = self.learning_rate;
            let mut accepted = false;
            while step >= 1e-12 {
                let candidate_w = &weights - &(step * &dw);
                let candidate_b = bias - step * db;
                let candidate = objective(&candidate_w, candidate_b);
                if candidate <= current - 1e-4 * step * grad_sq {
                    weights = candidate_w;
                    bias = candidate_b;
                    current = candidate;
                    accepted = true;
                    break;
                }
                step /= 2.0;
            }
            if !accepted {
                break;
            }
        }

        if !(bias.is_finite() && weights.iter().all(|w| w.is_finite())) {
            return Err(SusceptibilityError::Computation(
                "Logistic regression weights are not finite".to_string(),
            ));
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.is_fitted = true;

        Ok(self)
    }

    fn params(&self) -> Result<(&Array1<f64>, f64)> {
        match (&self.coefficients, self.intercept) {
            (Some(w), Some(b)) if self.is_fitted => Ok((w, b)),
            _ => Err(SusceptibilityError::ModelNotFitted),
        }
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (w, b) = self.params()?;
        Ok((x.dot(w) + b).mapv(sigmoid))
    }

    /// Probability for one row
    pub fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        let (w, b) = self.params()?;
        Ok(sigmoid(row.dot(w) + b))
    }
}

/// `ln(1 + e^z)` without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict_proba(self, x)
    }

    fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        LogisticRegression::predict_proba_row(self, row)
    }

    /// Absolute coefficients, normalized to sum to one
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let w = self.coefficients.as_ref()?.mapv(f64::abs);
        let total = w.sum();
        Some(if total > 0.0 { w / total } else { w })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression() {
        let x = array![[1.0, 2.0], [2.0, 3.0], [3.0, 4.0], [6.0, 7.0], [7.0, 8.0], [8.0, 9.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let predictions = Classifier::predict(&model, &x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_stronger_regularization_shrinks_weights() {
        let x = array![[-1.0], [-0.5], [0.5], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut loose = LogisticRegression::new().with_c(100.0);
        let mut tight = LogisticRegression::new().with_c(0.01);
        loose.fit(&x, &y).unwrap();
        tight.fit(&x, &y).unwrap();

        let w_loose = loose.coefficients.as_ref().unwrap()[0];
        let w_tight = tight.coefficients.as_ref().unwrap()[0];
        assert!(w_loose > w_tight && w_tight > 0.0);
    }

    #[test]
    fn test_strong_regularization_stays_stable() {
        let x = array![[-1.0], [-0.5], [0.5], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        for c in [0.01, 0.001] {
            let mut model = LogisticRegression::new().with_c(c).with_learning_rate(1.0);
            model.fit(&x, &y).unwrap();

            let w = model.coefficients.as_ref().unwrap()[0];
            assert!(w.is_finite() && w > 0.0 && w < 0.1, "c = {}: w = {}", c, w);

            let proba = model.predict_proba(&x).unwrap();
            assert!(proba.windows(2).into_iter().all(|p| p[0] < p[1]));
            assert_eq!(Classifier::predict(&model, &x).unwrap(), y);
        }
    }

    #[test]
    fn test_row_matches_batch() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 2.0]];
        let y = array![0.0, 1.0, 1.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let batch = model.predict_proba(&x).unwrap();
        for (i, row) in x.rows().into_iter().enumerate() {
            assert!((model.predict_proba_row(&row).unwrap() - batch[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        assert!(matches!(model.predict_proba(&array![[1.0]]), Err(SusceptibilityError::ModelNotFitted)));
    }
}
