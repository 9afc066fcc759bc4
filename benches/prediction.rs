use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use landslide_susceptibility::prediction::{PredictionConfig, SusceptibilityPredictor};
use landslide_susceptibility::raster::{FactorGrid, GeoTransform};
use landslide_susceptibility::training::{ClassifierKind, FittedModel, TrainEngine, TrainingConfig};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_factors(size: usize, n_factors: usize) -> Vec<FactorGrid> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let transform = GeoTransform::north_up(0.0, size as f64, 1.0, 1.0);

    (0..n_factors)
        .map(|i| {
            let data = Array2::from_shape_fn((size, size), |(r, c)| {
                (r + c * i) as f64 / size as f64 + rng.gen::<f64>() * 0.1
            });
            FactorGrid::new(format!("factor_{}", i), data, transform, None, None)
        })
        .collect()
}

fn train_model(kind: ClassifierKind, n_factors: usize) -> FittedModel {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n = 200;
    let x = Array2::from_shape_fn((n, n_factors), |_| rng.gen::<f64>());
    let y = Array1::from_shape_fn(n, |i| if x.row(i).sum() > n_factors as f64 / 2.0 { 1.0 } else { 0.0 });

    let config = TrainingConfig::new(kind).with_n_estimators(50).with_random_state(42);
    TrainEngine::new(config).fit(&x, &y).unwrap()
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_grid");
    group.sample_size(10);

    let n_factors = 6;
    for kind in [ClassifierKind::LogisticRegression, ClassifierKind::RandomForest] {
        let model = train_model(kind, n_factors);

        for size in [128usize, 512].iter() {
            let factors = create_factors(*size, n_factors);
            group.bench_with_input(
                BenchmarkId::new(kind.as_str(), format!("{}x{}", size, size)),
                &factors,
                |b, factors| {
                    let predictor = SusceptibilityPredictor::new(&model).with_config(PredictionConfig::default());
                    b.iter(|| predictor.predict(black_box(factors)).unwrap())
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_prediction);
criterion_main!(benches);
