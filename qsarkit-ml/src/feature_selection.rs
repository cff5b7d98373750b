//! Univariate (k-best) and recursive feature elimination.

use std::fmt;

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{take_columns, validate_data, Targets};
use crate::estimator::Estimator;

// ---------------------------------------------------------------------------
// Univariate scores
// ---------------------------------------------------------------------------

/// Univariate linear-regression F statistic per feature:
/// `F = r² / (1 − r²) · (n − 2)`. Constant columns score NaN.
pub fn f_regression(data: &[f64], n_features: usize, y: &[f64]) -> Result<Vec<f64>> {
    let n = validate_data(data, n_features)?;
    if y.len() != n {
        return Err(QsarError::InvalidInput(format!("{} targets for {n} samples", y.len())));
    }
    if n < 3 {
        return Err(QsarError::InvalidInput("f_regression needs at least 3 samples".into()));
    }
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let y_ss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let dof = (n - 2) as f64;

    Ok((0..n_features)
        .map(|j| {
            let col = data.chunks_exact(n_features).map(|row| row[j]);
            let x_mean = col.clone().sum::<f64>() / n as f64;
            let (mut sxy, mut sxx) = (0.0, 0.0);
            for (x, yv) in col.zip(y) {
                sxy += (x - x_mean) * (yv - y_mean);
                sxx += (x - x_mean).powi(2);
            }
            let r = sxy / (sxx * y_ss).sqrt();
            let r2 = r * r;
            r2 / (1.0 - r2) * dof
        })
        .collect())
}

/// One-way ANOVA F statistic per feature over the classes present in
/// `labels`. Features constant within every class score NaN or infinity.
pub fn f_classif(data: &[f64], n_features: usize, labels: &[usize], n_classes: usize) -> Result<Vec<f64>> {
    let n = validate_data(data, n_features)?;
    if labels.len() != n {
        return Err(QsarError::InvalidInput(format!("{} labels for {n} samples", labels.len())));
    }
    let mut counts = vec![0usize; n_classes];
    for &l in labels {
        if l >= n_classes {
            return Err(QsarError::InvalidInput(format!("label {l} out of range")));
        }
        counts[l] += 1;
    }
    let k = counts.iter().filter(|&&c| c > 0).count();
    if k < 2 || n <= k {
        return Err(QsarError::InvalidInput("f_classif needs two classes and n > classes".into()));
    }

    let mut scores = Vec::with_capacity(n_features);
    for j in 0..n_features {
        let mut sums = vec![0.0; n_classes];
        let mut total = 0.0;
        for (row, &l) in data.chunks_exact(n_features).zip(labels) {
            sums[l] += row[j];
            total += row[j];
        }
        let grand = total / n as f64;
        let ss_between: f64 = (0..n_classes)
            .filter(|&c| counts[c] > 0)
            .map(|c| {
                let m = sums[c] / counts[c] as f64;
                counts[c] as f64 * (m - grand).powi(2)
            })
            .sum();
        let ss_within: f64 = data
            .chunks_exact(n_features)
            .zip(labels)
            .map(|(row, &l)| (row[j] - sums[l] / counts[l] as f64).powi(2))
            .sum();
        let ms_between = ss_between / (k - 1) as f64;
        let ms_within = ss_within / (n - k) as f64;
        scores.push(ms_between / ms_within);
    }
    Ok(scores)
}

/// Indices of the `k` highest scores, in ascending column order. NaN ranks
/// below every number; ties keep the earlier column.
pub fn select_k_best(scores: &[f64], k: usize) -> Vec<usize> {
    let k = k.min(scores.len());
    let key = |s: f64| if s.is_nan() { f64::NEG_INFINITY } else { s };
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| key(scores[b]).total_cmp(&key(scores[a])));
    let mut kept: Vec<usize> = order.into_iter().take(k).collect();
    kept.sort_unstable();
    kept
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Univariate F-test ranking.
    KBest,
    /// Recursive elimination driven by model importances.
    Rfe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub method: SelectionMethod,
    /// Features to keep; clamped to the column count.
    pub k: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            method: SelectionMethod::KBest,
            k: 100,
        }
    }
}

impl SelectionConfig {
    pub fn kbest(k: usize) -> Self {
        Self {
            method: SelectionMethod::KBest,
            k,
        }
    }

    pub fn rfe(k: usize) -> Self {
        Self {
            method: SelectionMethod::Rfe,
            k,
        }
    }
}

/// A fitted column selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelector {
    method: SelectionMethod,
    n_input: usize,
    /// Kept column indices, ascending.
    support: Vec<usize>,
    /// F scores (k-best, `None` where undefined) or elimination ranks
    /// (RFE, 1 = kept).
    scores: Vec<Option<f64>>,
}

impl FeatureSelector {
    /// Fit a selector. RFE refits `estimator` once per eliminated feature.
    ///
    /// # Errors
    ///
    /// [`QsarError::Unsupported`] when RFE is asked to wrap an estimator
    /// that exposes neither importances nor coefficients.
    pub fn fit(
        config: &SelectionConfig,
        estimator: &Estimator,
        data: &[f64],
        n_features: usize,
        targets: Targets<'_>,
    ) -> Result<Self> {
        validate_data(data, n_features)?;
        if config.k == 0 {
            return Err(QsarError::InvalidInput("k must be > 0".into()));
        }
        let k = config.k.min(n_features);
        match config.method {
            SelectionMethod::KBest => {
                let scores = match targets {
                    Targets::Continuous(y) => f_regression(data, n_features, y)?,
                    Targets::Classes { labels, n_classes } => f_classif(data, n_features, labels, n_classes)?,
                };
                Ok(Self {
                    method: SelectionMethod::KBest,
                    n_input: n_features,
                    support: select_k_best(&scores, k),
                    scores: scores.iter().map(|s| s.is_finite().then_some(*s)).collect(),
                })
            }
            SelectionMethod::Rfe => Self::fit_rfe(estimator, data, n_features, targets, k),
        }
    }

    fn fit_rfe(estimator: &Estimator, data: &[f64], n_features: usize, targets: Targets<'_>, k: usize) -> Result<Self> {
        let mut remaining: Vec<usize> = (0..n_features).collect();
        let mut ranks = vec![1.0; n_features];
        let mut next_rank = (n_features - k + 1) as f64;
        while remaining.len() > k {
            let subset = take_columns(data, n_features, &remaining);
            let model = estimator.fit(&subset, remaining.len(), targets)?;
            let importances = model.importances().ok_or_else(|| {
                QsarError::Unsupported(format!(
                    "{} exposes no importances or coefficients for RFE",
                    estimator.kind()
                ))
            })?;
            let weakest = importances
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map_or(0, |(i, _)| i);
            let dropped = remaining.remove(weakest);
            ranks[dropped] = next_rank;
            next_rank -= 1.0;
            debug!(feature = dropped, remaining = remaining.len(), "rfe eliminated feature");
        }
        Ok(Self {
            method: SelectionMethod::Rfe,
            n_input: n_features,
            support: remaining,
            scores: ranks.into_iter().map(Some).collect(),
        })
    }

    pub fn method(&self) -> SelectionMethod {
        self.method
    }

    pub fn support(&self) -> &[usize] {
        &self.support
    }

    pub fn n_input(&self) -> usize {
        self.n_input
    }

    pub fn scores(&self) -> &[Option<f64>] {
        &self.scores
    }

    /// Keep only the selected columns of `names`.
    pub fn select_names(&self, names: &[String]) -> Vec<String> {
        self.support.iter().filter_map(|&i| names.get(i).cloned()).collect()
    }

    /// Reduce row-major data to the selected columns.
    pub fn transform(&self, data: &[f64]) -> Result<Vec<f64>> {
        validate_data(data, self.n_input)?;
        Ok(take_columns(data, self.n_input, &self.support))
    }
}

impl fmt::Display for FeatureSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method {
            SelectionMethod::KBest => write!(f, "SelectKBest(k={})", self.support.len()),
            SelectionMethod::Rfe => write!(f, "RFE(n_features_to_select={})", self.support.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelKind;

    /// Column 0 drives y, column 1 is noise, column 2 is constant, column 3
    /// is a weaker copy of column 0.
    fn data() -> (Vec<f64>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let a = i as f64;
            let noise = ((i * 7919) % 13) as f64;
            let weak = a + ((i * 31) % 5) as f64 * 3.0;
            x.extend_from_slice(&[a, noise, 1.0, weak]);
            y.push(2.0 * a + 1.0 + ((i * 3) % 4) as f64 * 0.5);
        }
        (x, y)
    }

    #[test]
    fn f_regression_ranks_signal() {
        let (x, y) = data();
        let f = f_regression(&x, 4, &y).unwrap();
        assert!(f[0] > f[3] && f[3] > f[1]);
        assert!(f[0] > 1000.0);
        assert!(f[2].is_nan());
    }

    #[test]
    fn f_classif_separates_groups() {
        let x = [0.0, 5.0, 0.1, 4.0, 0.2, 6.0, 1.0, 5.0, 1.1, 4.0, 1.2, 6.0];
        let labels = [0, 0, 0, 1, 1, 1];
        let f = f_classif(&x, 2, &labels, 2).unwrap();
        assert!(f[0] > 50.0);
        assert!(f[1].abs() < 1e-12);
    }

    #[test]
    fn k_best_keeps_original_order_and_sinks_nan() {
        assert_eq!(select_k_best(&[1.0, f64::NAN, 5.0, 3.0], 2), vec![2, 3]);
        assert_eq!(select_k_best(&[f64::NAN, 0.0], 1), vec![1]);
        assert_eq!(select_k_best(&[1.0, 2.0], 10), vec![0, 1]);
    }

    #[test]
    fn kbest_selector_transforms() {
        let (x, y) = data();
        let est = Estimator::default_for(ModelKind::Ridge);
        let sel = FeatureSelector::fit(&SelectionConfig::kbest(2), &est, &x, 4, Targets::Continuous(&y)).unwrap();
        assert_eq!(sel.support(), &[0, 3]);
        let reduced = sel.transform(&x).unwrap();
        assert_eq!(reduced.len(), 40);
        assert_eq!(&reduced[2..4], &[1.0, x[7]]);
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sel.select_names(&names), vec!["a".to_string(), "d".to_string()]);
        assert_eq!(sel.to_string(), "SelectKBest(k=2)");
    }

    #[test]
    fn rfe_with_linear_coefficients() {
        let (x, y) = data();
        let est = Estimator::default_for(ModelKind::Lasso);
        let sel = FeatureSelector::fit(&SelectionConfig::rfe(1), &est, &x, 4, Targets::Continuous(&y)).unwrap();
        assert_eq!(sel.support(), &[0]);
        assert_eq!(sel.scores()[0], Some(1.0));
        assert_eq!(sel.scores()[1], Some(4.0));
        assert_eq!(sel.to_string(), "RFE(n_features_to_select=1)");
    }

    #[test]
    fn rfe_needs_importances() {
        let (x, y) = data();
        let est = Estimator::default_for(ModelKind::MlpRegressor);
        let err = FeatureSelector::fit(&SelectionConfig::rfe(2), &est, &x, 4, Targets::Continuous(&y)).unwrap_err();
        assert!(matches!(err, QsarError::Unsupported(_)));
    }
}
