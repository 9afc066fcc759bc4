//! Support Vector Machine classifier
//!
//! Binary soft-margin SVM trained with SMO (Sequential Minimal Optimization).
//! Probabilities come from Platt scaling fitted on the training decision values.

use super::models::{check_training_data, Classifier};
use crate::calibration::PlattScaling;
use crate::error::{Result, SusceptibilityError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type; `gamma` is resolved at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF,
    /// Sigmoid kernel: K(x, y) = tanh(γ * x · y + r)
    Sigmoid { coef0: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF
    }
}

impl FromStr for KernelType {
    type Err = SusceptibilityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rbf" => Ok(KernelType::RBF),
            "linear" => Ok(KernelType::Linear),
            "poly" | "polynomial" => Ok(KernelType::Polynomial { degree: 3, coef0: 0.0 }),
            "sigmoid" => Ok(KernelType::Sigmoid { coef0: 0.0 }),
            _ => Err(SusceptibilityError::invalid_parameter(
                "kernel",
                s,
                "expected rbf, linear, poly or sigmoid",
            )),
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Kernel coefficient; `None` means `1 / (n_features * var(X))`
    pub gamma: Option<f64>,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::RBF,
            gamma: None,
            tol: 1e-3,
            max_iter: 1000,
            random_state: Some(42),
        }
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    /// Support vectors
    support_vectors: Option<Array2<f64>>,
    /// alpha_i * y_i for each support vector
    dual_coef: Option<Array1<f64>>,
    /// Bias term
    bias: f64,
    /// Resolved kernel coefficient
    gamma: f64,
    /// Decision value → probability
    platt: Option<PlattScaling>,
}

impl SVMClassifier {
    /// Create a new SVM classifier
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
            gamma: 1.0,
            platt: None,
        }
    }

    /// Fit the classifier on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        let n_pos = y.iter().filter(|&&v| v == 1.0).count();
        if n_pos == 0 || n_pos == y.len() {
            return Err(SusceptibilityError::InsufficientData(
                "SVM requires samples of both classes".to_string(),
            ));
        }

        self.gamma = match self.config.gamma {
            Some(g) => g,
            None => {
                let var = x.var(0.0);
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        };

        // SMO works with ±1 labels
        let y_signed = y.mapv(|v| if v == 1.0 { 1.0 } else { -1.0 });
        let (alphas, bias) = self.smo_train(x, &y_signed)?;

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (k, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(k).assign(&x.row(idx));
            dual_coef[k] = alphas[idx] * y_signed[idx];
        }

        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.bias = bias;

        let scores = self.decision_function(x)?;
        let mut platt = PlattScaling::new();
        platt.fit(&scores, y)?;
        self.platt = Some(platt);

        Ok(())
    }

    /// SMO training algorithm, returns (alphas, bias)
    fn smo_train(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array1<f64>, f64)> {
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(SusceptibilityError::invalid_parameter(
                "n_samples",
                n,
                format!("SVM kernel matrix is limited to {} samples", MAX_KERNEL_MATRIX_SAMPLES),
            ));
        }

        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;

        let kernel_matrix = self.compute_kernel_matrix(x);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter && n > 1 {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = Self::decision_cached(&kernel_matrix, &alphas, y, bias, i) - y[i];

                // KKT violation
                if (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0) {
                    let j = loop {
                        let j = rng.gen_range(0..n);
                        if j != i {
                            break j;
                        }
                    };

                    let e_j = Self::decision_cached(&kernel_matrix, &alphas, y, bias, j) - y[j];
                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (l, h) = if y[i] != y[j] {
                        ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                    } else {
                        ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                    };
                    if (l - h).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * kernel_matrix[[i, j]] - kernel_matrix[[i, i]] - kernel_matrix[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    alphas[j] = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                    if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }
                    alphas[i] = alpha_i_old + y[i] * y[j] * (alpha_j_old - alphas[j]);

                    let b1 = bias
                        - e_i
                        - y[i] * (alphas[i] - alpha_i_old) * kernel_matrix[[i, i]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel_matrix[[i, j]];
                    let b2 = bias
                        - e_j
                        - y[i] * (alphas[i] - alpha_i_old) * kernel_matrix[[i, j]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel_matrix[[j, j]];

                    bias = if alphas[i] > 0.0 && alphas[i] < c {
                        b1
                    } else if alphas[j] > 0.0 && alphas[j] < c {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };

                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        Ok((alphas, bias))
    }

    /// Compute kernel matrix, rows in parallel
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let a = x.row(i);
                (0..n).map(|j| self.kernel(&a, &x.row(j))).collect()
            })
            .collect();

        Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
    }

    /// Compute kernel between two vectors
    fn kernel(&self, x1: &ArrayView1<f64>, x2: &ArrayView1<f64>) -> f64 {
        match &self.config.kernel {
            KernelType::Linear => x1.dot(x2),
            KernelType::Polynomial { degree, coef0 } => {
                (self.gamma * x1.dot(x2) + coef0).powi(*degree as i32)
            }
            KernelType::RBF => {
                let norm_sq: f64 = x1.iter().zip(x2.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                (-self.gamma * norm_sq).exp()
            }
            KernelType::Sigmoid { coef0 } => (self.gamma * x1.dot(x2) + coef0).tanh(),
        }
    }

    fn decision_cached(k: &Array2<f64>, alphas: &Array1<f64>, y: &Array1<f64>, bias: f64, idx: usize) -> f64 {
        let mut sum = bias;
        for i in 0..alphas.len() {
            if alphas[i] != 0.0 {
                sum += alphas[i] * y[i] * k[[i, idx]];
            }
        }
        sum
    }

    /// Signed distance-like score of one row (positive side = class 1)
    pub fn decision_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(SusceptibilityError::ModelNotFitted),
        };
        let mut sum = self.bias;
        for (k, sv_row) in sv.rows().into_iter().enumerate() {
            sum += coef[k] * self.kernel(row, &sv_row);
        }
        Ok(sum)
    }

    /// Decision values for every row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = x
            .rows()
            .into_iter()
            .map(|row| self.decision_row(&row))
            .collect::<Result<Vec<f64>>>()?;
        Ok(Array1::from_vec(scores))
    }

    /// Number of support vectors
    pub fn n_support(&self) -> usize {
        self.dual_coef.as_ref().map_or(0, |c| c.len())
    }

    fn platt(&self) -> Result<&PlattScaling> {
        self.platt.as_ref().ok_or(SusceptibilityError::ModelNotFitted)
    }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SVMClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        self.platt()?.calibrate(&scores)
    }

    fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        let score = self.decision_row(row)?;
        self.platt()?.probability(score)
    }
}
