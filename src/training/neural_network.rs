//! Neural Network (Multi-Layer Perceptron) implementation
//!
//! A feedforward binary classifier: ReLU hidden layers and a single sigmoid
//! output unit trained on log loss with momentum mini-batch SGD.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::models::{check_training_data, sigmoid, Classifier};
use crate::error::{Result, SusceptibilityError};

/// Hidden layer activation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic
    Sigmoid,
}

impl Activation {
    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Tanh => z.mapv(f64::tanh),
            Activation::Sigmoid => z.mapv(sigmoid),
        }
    }

    fn derivative(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Tanh => z.mapv(|v| 1.0 - v.tanh().powi(2)),
            Activation::Sigmoid => z.mapv(|v| {
                let s = sigmoid(v);
                s * (1.0 - s)
            }),
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of epochs
    pub max_epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// L2 regularization
    pub alpha: f64,
    /// Momentum
    pub momentum: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100, 50],
            activation: Activation::ReLU,
            learning_rate: 0.01,
            max_epochs: 200,
            batch_size: 32,
            alpha: 0.0001,
            momentum: 0.9,
            random_state: Some(42),
        }
    }
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    is_fitted: bool,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.config.hidden_layers.iter().any(|&h| h == 0) {
            return Err(SusceptibilityError::invalid_parameter(
                "hidden_layer_sizes",
                format!("{:?}", self.config.hidden_layers),
                "every layer needs at least one unit",
            ));
        }
        if !(self.config.learning_rate > 0.0) {
            return Err(SusceptibilityError::invalid_parameter(
                "learning_rate",
                self.config.learning_rate,
                "must be positive",
            ));
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        self.initialize_weights(&mut rng)?;

        let y_col = y.clone().insert_axis(Axis(1));
        let batch_size = self.config.batch_size.clamp(1, n_samples);
        let lr = self.config.learning_rate;
        let momentum = self.config.momentum;
        let decay = 1.0 - self.config.alpha * lr;

        let mut velocities_w: Vec<Array2<f64>> =
            self.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let mut velocities_b: Vec<Array1<f64>> =
            self.biases.iter().map(|b| Array1::zeros(b.len())).collect();

        let mut indices: Vec<usize> = (0..n_samples).collect();
        for _epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);

            for batch in indices.chunks(batch_size) {
                let x_batch = x.select(Axis(0), batch);
                let y_batch = y_col.select(Axis(0), batch);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * momentum - &grad_w * lr;
                    velocities_b[i] = &velocities_b[i] * momentum - &grad_b * lr;

                    self.weights[i] += &velocities_w[i];
                    self.biases[i] += &velocities_b[i];
                    self.weights[i] *= decay;
                }
            }
        }

        if self.weights.iter().any(|w| w.iter().any(|v| !v.is_finite())) {
            return Err(SusceptibilityError::Computation(
                "MLP weights diverged during training".to_string(),
            ));
        }

        self.is_fitted = true;
        Ok(())
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(SusceptibilityError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(SusceptibilityError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let (activations, _) = self.forward(x);
        activations
            .last()
            .map(|out| out.column(0).to_owned())
            .ok_or(SusceptibilityError::ModelNotFitted)
    }

    /// Xavier-uniform weights, zero biases
    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) -> Result<()> {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(1);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let scale = (6.0 / (n_in + n_out) as f64).sqrt();

            let weights: Vec<f64> = (0..n_in * n_out)
                .map(|_| rng.gen::<f64>() * 2.0 * scale - scale)
                .collect();

            self.weights.push(Array2::from_shape_vec((n_in, n_out), weights)?);
            self.biases.push(Array1::zeros(n_out));
        }
        Ok(())
    }

    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let n_layers = self.weights.len();
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(n_layers);

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i + 1 < n_layers {
                self.config.activation.apply(&z)
            } else {
                z.mapv(sigmoid)
            };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.nrows() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // Log loss through a sigmoid output
        let mut delta = (&activations[activations.len() - 1] - y) / n;

        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t())
                    * self.config.activation.derivative(&z_values[i - 1]);
            }
        }

        gradients.reverse();
        gradients
    }
}

impl Classifier for MLPClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        MLPClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        MLPClassifier::predict_proba(self, x)
    }

    fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        let x = row.to_owned().insert_axis(Axis(0));
        Ok(MLPClassifier::predict_proba(self, &x)?[0])
    }
}
