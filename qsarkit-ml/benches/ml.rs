use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qsarkit_ml::{
    f_regression, search, Estimator, FeatureMatrix, ForestConfig, ModelKind, RandomForest, SearchConfig, Targets,
    TrainOptions,
};

/// Deterministic synthetic descriptor block: `n` rows, `p` columns.
fn synthetic(n: usize, p: usize) -> (Vec<f64>, Vec<f64>) {
    let mut data = Vec::with_capacity(n * p);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let row: Vec<f64> = (0..p).map(|j| ((i * (j + 7) * 31 + j) % 97) as f64 / 9.7).collect();
        y.push(row[0] * 1.5 - row[1] + 0.3 * row[2 % p]);
        data.extend(row);
    }
    (data, y)
}

fn bench_forest(c: &mut Criterion) {
    let (data, y) = synthetic(300, 20);
    let config = ForestConfig {
        n_estimators: 50,
        ..ForestConfig::default()
    };
    let mut group = c.benchmark_group("forest");
    group.sample_size(10);
    group.bench_function("fit_300x20_50_trees", |b| {
        b.iter(|| RandomForest::fit(black_box(&data), 20, Targets::Continuous(&y), &config))
    });
    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let (data, y) = synthetic(500, 200);
    c.bench_function("f_regression_500x200", |b| b.iter(|| f_regression(black_box(&data), 200, &y)));
}

fn bench_search(c: &mut Criterion) {
    let (data, y) = synthetic(200, 10);
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    group.bench_function("ridge_grid_5fold", |b| {
        b.iter(|| search(ModelKind::Ridge, black_box(&data), 10, Targets::Continuous(&y), 5, None, &SearchConfig::grid()))
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let (data, y) = synthetic(200, 30);
    let names: Vec<String> = (0..30).map(|j| format!("d{j}")).collect();
    let x = FeatureMatrix::new(names, data).unwrap();
    let options = TrainOptions {
        tuning: None,
        ..TrainOptions::default()
    };
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("train_gbdt_200x30", |b| {
        b.iter(|| qsarkit_ml::train_qsar_model(black_box(&x), &y, "gradient_boosting", "regression", &options))
    });
    group.bench_function("fit_mlp_default", |b| {
        let est = Estimator::default_for(ModelKind::MlpRegressor);
        b.iter(|| est.fit(black_box(x.data()), 30, Targets::Continuous(&y)))
    });
    group.finish();
}

criterion_group!(benches, bench_forest, bench_selection, bench_search, bench_pipeline);
criterion_main!(benches);
