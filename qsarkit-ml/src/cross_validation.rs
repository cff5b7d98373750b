//! K-fold and stratified k-fold cross-validation.
//!
//! Fold construction is separate from evaluation: build the folds once,
//! then hand them to [`cross_validate`] with a closure that fits on the
//! training indices and scores on the test indices. Search reuses the same
//! folds for every candidate.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{take_rows, validate_data, Targets};
use crate::estimator::Estimator;
use crate::metrics::{accuracy, mean_squared_error};
use crate::registry::TaskKind;
use crate::rng::LcgRng;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Aggregated cross-validation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    /// Per-fold scores, in fold order.
    pub scores: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation of the fold scores.
    pub std: f64,
}

impl CvResult {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std = (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
        Self { scores, mean, std }
    }
}

/// Test-fold index sets; each fold's training set is the complement.
#[derive(Debug, Clone, PartialEq)]
pub struct Folds {
    n_samples: usize,
    test: Vec<Vec<usize>>,
}

impl Folds {
    pub fn len(&self) -> usize {
        self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test.is_empty()
    }

    /// `(train, test)` for fold `k`; both sorted ascending.
    pub fn split(&self, k: usize) -> (Vec<usize>, Vec<usize>) {
        let mut test = self.test[k].clone();
        test.sort_unstable();
        let mut in_test = vec![false; self.n_samples];
        for &i in &test {
            in_test[i] = true;
        }
        let train = (0..self.n_samples).filter(|&i| !in_test[i]).collect();
        (train, test)
    }
}

fn check_k(k: usize, n_samples: usize) -> Result<()> {
    if k < 2 {
        return Err(QsarError::InvalidInput("k must be at least 2".into()));
    }
    if k > n_samples {
        return Err(QsarError::InvalidInput(format!("k ({k}) > n_samples ({n_samples})")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fold construction
// ---------------------------------------------------------------------------

/// Shuffled k-fold: the first `n % k` folds get one extra sample.
pub fn kfold(n_samples: usize, k: usize, seed: u64) -> Result<Folds> {
    check_k(k, n_samples)?;
    let mut indices: Vec<usize> = (0..n_samples).collect();
    LcgRng::new(seed).shuffle(&mut indices);
    let base = n_samples / k;
    let extra = n_samples % k;
    let mut test = Vec::with_capacity(k);
    let mut start = 0;
    for f in 0..k {
        let size = base + usize::from(f < extra);
        test.push(indices[start..start + size].to_vec());
        start += size;
    }
    Ok(Folds { n_samples, test })
}

/// Stratified k-fold: each class is shuffled and dealt round-robin across
/// folds, continuing where the previous class stopped so fold sizes stay
/// balanced.
pub fn stratified_kfold(labels: &[usize], k: usize, seed: u64) -> Result<Folds> {
    let n_samples = labels.len();
    check_k(k, n_samples)?;
    let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &l) in labels.iter().enumerate() {
        groups[l].push(i);
    }
    if let Some(smallest) = groups.iter().map(Vec::len).filter(|&n| n > 0).min() {
        if smallest < k {
            warn!(smallest, k, "least populated class has fewer members than folds");
        }
    }

    let mut rng = LcgRng::new(seed);
    let mut test: Vec<Vec<usize>> = vec![Vec::new(); k];
    let mut next = 0;
    for group in &mut groups {
        rng.shuffle(group);
        for &idx in group.iter() {
            test[next % k].push(idx);
            next += 1;
        }
    }
    Ok(Folds { n_samples, test })
}

/// Stratified folds for classes, plain shuffled folds otherwise.
pub fn folds_for(targets: Targets<'_>, k: usize, seed: u64) -> Result<Folds> {
    match targets {
        Targets::Continuous(y) => kfold(y.len(), k, seed),
        Targets::Classes { labels, .. } => stratified_kfold(labels, k, seed),
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Run `eval_fn(train, test)` on every fold.
///
/// # Errors
///
/// Propagates the first error returned by the closure.
pub fn cross_validate<F>(folds: &Folds, mut eval_fn: F) -> Result<CvResult>
where
    F: FnMut(&[usize], &[usize]) -> Result<f64>,
{
    let mut scores = Vec::with_capacity(folds.len());
    for k in 0..folds.len() {
        let (train, test) = folds.split(k);
        scores.push(eval_fn(&train, &test)?);
    }
    Ok(CvResult::from_scores(scores))
}

/// Fold score; larger is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    NegMeanSquaredError,
    Accuracy,
}

impl Scoring {
    pub fn for_task(task: TaskKind) -> Self {
        match task {
            TaskKind::Regression => Scoring::NegMeanSquaredError,
            TaskKind::Classification => Scoring::Accuracy,
        }
    }

    /// Score predictions against the held-out targets.
    pub fn score(self, targets: Targets<'_>, predicted: &[f64]) -> Result<f64> {
        match (self, targets) {
            (Scoring::NegMeanSquaredError, Targets::Continuous(y)) => Ok(-mean_squared_error(y, predicted)?),
            (Scoring::Accuracy, Targets::Classes { labels, .. }) => {
                let predicted: Vec<usize> = predicted.iter().map(|&p| p as usize).collect();
                accuracy(labels, &predicted)
            }
            (scoring, _) => Err(QsarError::InvalidInput(format!("{scoring:?} does not apply to these targets"))),
        }
    }
}

/// Fit `estimator` on each training fold and score it on the held-out fold.
///
/// # Errors
///
/// Propagates the first fit or scoring failure.
pub fn cross_val_score(
    estimator: &Estimator,
    data: &[f64],
    n_features: usize,
    targets: Targets<'_>,
    folds: &Folds,
    scoring: Scoring,
) -> Result<CvResult> {
    let n_samples = validate_data(data, n_features)?;
    targets.check(n_samples)?;
    if folds.n_samples != n_samples {
        return Err(QsarError::InvalidInput(format!(
            "folds cover {} samples, data has {n_samples}",
            folds.n_samples
        )));
    }
    cross_validate(folds, |train, test| {
        let train_x = take_rows(data, n_features, train);
        let train_y = targets.subset(train);
        let model = estimator.fit(&train_x, n_features, train_y.view())?;
        let test_x = take_rows(data, n_features, test);
        let predicted = model.predict_batch(&test_x, n_features)?;
        scoring.score(targets.subset(test).view(), &predicted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kfold_partitions_samples() {
        let folds = kfold(10, 3, 42).unwrap();
        let sizes: Vec<usize> = (0..3).map(|k| folds.split(k).1.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        let mut all: Vec<usize> = (0..3).flat_map(|k| folds.split(k).1).collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        let (train, test) = folds.split(0);
        assert_eq!(train.len() + test.len(), 10);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn stratified_balances_classes() {
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let folds = stratified_kfold(&labels, 5, 42).unwrap();
        for k in 0..5 {
            let (_, test) = folds.split(k);
            assert_eq!(test.len(), 4);
            assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 2);
        }
    }

    #[test]
    fn cross_validate_aggregates() {
        let folds = kfold(6, 3, 1).unwrap();
        let mut calls = 0;
        let result = cross_validate(&folds, |train, test| {
            calls += 1;
            assert_eq!(train.len(), 4);
            Ok(test.len() as f64 * calls as f64)
        })
        .unwrap();
        assert_eq!(result.scores, vec![2.0, 4.0, 6.0]);
        assert!((result.mean - 4.0).abs() < 1e-12);
        assert!((result.std - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn invalid_fold_counts() {
        assert!(kfold(5, 1, 0).is_err());
        assert!(kfold(3, 4, 0).is_err());
        assert!(cross_validate(&kfold(4, 2, 0).unwrap(), |_, _| Err(QsarError::Other("x".into()))).is_err());
    }

    #[test]
    fn cross_val_score_on_linear_data() {
        use crate::registry::ModelKind;
        let data: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let y: Vec<f64> = data.iter().map(|x| 2.0 * x - 1.0).collect();
        let folds = kfold(25, 5, 42).unwrap();
        let est = Estimator::default_for(ModelKind::LinearRegression);
        let cv = cross_val_score(&est, &data, 1, Targets::Continuous(&y), &folds, Scoring::NegMeanSquaredError).unwrap();
        assert_eq!(cv.scores.len(), 5);
        assert!(cv.mean > -1e-9 && cv.mean <= 0.0);

        let labels: Vec<usize> = (0..25).map(|i| usize::from(i >= 12)).collect();
        let targets = Targets::Classes { labels: &labels, n_classes: 2 };
        let folds = folds_for(targets, 5, 42).unwrap();
        let est = Estimator::default_for(ModelKind::LogisticRegression);
        let cv = cross_val_score(&est, &data, 1, targets, &folds, Scoring::Accuracy).unwrap();
        assert!(cv.mean > 0.8);
        assert!(Scoring::Accuracy.score(Targets::Continuous(&y), &y).is_err());
    }
}
