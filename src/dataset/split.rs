//! Stratified train/test splitting

use super::Dataset;
use crate::error::{Result, SusceptibilityError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Train and test partitions of a [`Dataset`]
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
    /// Row indices into the source dataset
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl TrainTestSplit {
    pub fn n_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn n_test(&self) -> usize {
        self.y_test.len()
    }
}

/// Seeded stratified split.
///
/// `n_test = ceil(n * test_ratio)`. The training quota is shared between
/// classes by largest remainder of `n_train * n_class / n`, so each class keeps
/// its proportion in the training partition to within one sample.
pub fn stratified_split(dataset: &Dataset, test_ratio: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(SusceptibilityError::invalid_parameter(
            "test_ratio",
            test_ratio,
            "must lie in (0, 1)",
        ));
    }

    let n = dataset.len();
    let n_test = ((n as f64) * test_ratio - 1e-9).ceil().max(0.0) as usize;
    let n_test = n_test.min(n);
    let n_train = n - n_test;
    if n_train == 0 {
        return Err(SusceptibilityError::InsufficientData(format!(
            "{} samples leave an empty training partition at test_ratio {}",
            n, test_ratio
        )));
    }

    let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in dataset.labels.iter().enumerate() {
        class_indices.entry(label.round() as i64).or_default().push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let quotas = apportion(&class_indices, n, n_train, &mut rng);

    let mut train_indices = Vec::with_capacity(n_train);
    let mut test_indices = Vec::with_capacity(n_test);
    for (indices, quota) in class_indices.values().zip(quotas) {
        let mut shuffled = indices.clone();
        shuffled.shuffle(&mut rng);
        train_indices.extend_from_slice(&shuffled[..quota]);
        test_indices.extend_from_slice(&shuffled[quota..]);
    }
    train_indices.shuffle(&mut rng);
    test_indices.shuffle(&mut rng);

    debug!(n_train = train_indices.len(), n_test = test_indices.len(), seed, "Stratified split");

    Ok(TrainTestSplit {
        x_train: dataset.features.select(Axis(0), &train_indices),
        y_train: dataset.labels.select(Axis(0), &train_indices),
        x_test: dataset.features.select(Axis(0), &test_indices),
        y_test: dataset.labels.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}

/// Largest-remainder allocation of `n_train` across classes
fn apportion(
    class_indices: &BTreeMap<i64, Vec<usize>>,
    n: usize,
    n_train: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<usize> {
    let exact: Vec<f64> = class_indices
        .values()
        .map(|idx| n_train as f64 * idx.len() as f64 / n as f64)
        .collect();
    let mut quotas: Vec<usize> = exact.iter().map(|q| q.floor() as usize).collect();
    let mut remaining = n_train - quotas.iter().sum::<usize>();

    // shuffle first so the stable sort breaks equal remainders randomly
    let mut order: Vec<usize> = (0..exact.len()).collect();
    order.shuffle(rng);
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });

    let sizes: Vec<usize> = class_indices.values().map(Vec::len).collect();
    for &c in order.iter().cycle().take(order.len() * 2) {
        if remaining == 0 {
            break;
        }
        if quotas[c] < sizes[c] {
            quotas[c] += 1;
            remaining -= 1;
        }
    }
    quotas
}
