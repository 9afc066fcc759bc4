//! Platt scaling (sigmoid calibration)

use crate::error::{Result, SusceptibilityError};
use crate::training::sigmoid;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Platt scaling calibrator
///
/// Fits a sigmoid over raw decision values: P(y=1|f) = sigmoid(A*f + B)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Slope parameter A
    a: Option<f64>,
    /// Intercept parameter B
    b: Option<f64>,
    /// Maximum Newton iterations
    max_iter: usize,
    /// Convergence tolerance
    tol: f64,
}

impl PlattScaling {
    /// Create new Platt scaling calibrator
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            max_iter: 100,
            tol: 1e-10,
        }
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Get fitted parameters
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Fit A and B on decision values and 0/1 labels
    pub fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = scores.len();
        if n != labels.len() {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", labels.len()),
            });
        }
        if n == 0 {
            return Err(SusceptibilityError::InsufficientData(
                "Platt scaling needs at least one score".to_string(),
            ));
        }

        // Target values with Platt's adjustment for small datasets
        let n_pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
        let n_neg = n as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = labels
            .iter()
            .map(|&y| if y > 0.5 { target_pos } else { target_neg })
            .collect();

        let loss = |a: f64, b: f64| -> f64 {
            scores
                .iter()
                .zip(&targets)
                .map(|(&f, &t)| {
                    let p = sigmoid(a * f + b).clamp(1e-15, 1.0 - 1e-15);
                    -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
                })
                .sum()
        };

        let mut a = 1.0;
        let mut b = ((n_pos + 1.0) / (n_neg + 1.0)).ln();
        let mut current = loss(a, b);

        for _ in 0..self.max_iter {
            let mut grad_a = 0.0;
            let mut grad_b = 0.0;
            let mut hess_aa = 1e-12;
            let mut hess_ab = 0.0;
            let mut hess_bb = 1e-12;

            for (&f, &t) in scores.iter().zip(&targets) {
                let p = sigmoid(a * f + b);
                let d1 = p - t;
                let d2 = p * (1.0 - p);

                grad_a += f * d1;
                grad_b += d1;
                hess_aa += f * f * d2;
                hess_ab += f * d2;
                hess_bb += d2;
            }

            if grad_a.abs() < 1e-5 && grad_b.abs() < 1e-5 {
                break;
            }

            // Solve 2x2 system using Cramer's rule
            let det = hess_aa * hess_bb - hess_ab * hess_ab;
            if det.abs() < 1e-18 {
                break;
            }
            let delta_a = (hess_bb * grad_a - hess_ab * grad_b) / det;
            let delta_b = (hess_aa * grad_b - hess_ab * grad_a) / det;

            // Backtracking line search
            let descent = grad_a * delta_a + grad_b * delta_b;
            let mut step = 1.0;
            let mut accepted = false;
            while step >= 1e-10 {
                let (na, nb) = (a - step * delta_a, b - step * delta_b);
                let candidate = loss(na, nb);
                if candidate <= current - 1e-4 * step * descent {
                    a = na;
                    b = nb;
                    accepted = current - candidate > self.tol;
                    current = candidate;
                    break;
                }
                step /= 2.0;
            }
            if !accepted {
                break;
            }
        }

        if !(a.is_finite() && b.is_finite()) {
            return Err(SusceptibilityError::Computation(
                "Platt scaling diverged".to_string(),
            ));
        }

        self.a = Some(a);
        self.b = Some(b);
        Ok(())
    }

    /// Calibrated probability of one decision value
    pub fn probability(&self, score: f64) -> Result<f64> {
        let (a, b) = self.parameters().ok_or(SusceptibilityError::ModelNotFitted)?;
        Ok(sigmoid(a * score + b))
    }

    /// Calibrated probabilities of many decision values
    pub fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>> {
        let (a, b) = self.parameters().ok_or(SusceptibilityError::ModelNotFitted)?;
        Ok(scores.mapv(|f| sigmoid(a * f + b)))
    }
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_platt_scaling_monotone() {
        let scores = array![-2.0, -0.4, -0.6, 1.5, 2.2, -1.2, 0.7, 0.3];
        let labels = array![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0];

        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, &labels).unwrap();

        let calibrated = calibrator.calibrate(&scores).unwrap();
        assert!(calibrated.iter().all(|&p| (0.0..=1.0).contains(&p)));

        let (a, _) = calibrator.parameters().unwrap();
        assert!(a > 0.0, "higher decision values should mean higher probability");
        assert!(calibrator.probability(2.0).unwrap() > calibrator.probability(-2.0).unwrap());
    }

    #[test]
    fn test_separable_scores_stay_finite() {
        let scores = array![-3.0, -2.0, -1.0, 1.0, 2.0, 3.0];
        let labels = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, &labels).unwrap();
        let (a, b) = calibrator.parameters().unwrap();
        assert!(a.is_finite() && b.is_finite());
        assert!(calibrator.probability(3.0).unwrap() > 0.5);
    }

    #[test]
    fn test_unfitted() {
        assert!(matches!(
            PlattScaling::new().probability(0.0),
            Err(SusceptibilityError::ModelNotFitted)
        ));
    }
}
