//! Gradient boosted regression trees.
//!
//! Squared-error boosting for regression, log-loss for binary
//! classification and softmax cross-entropy (one tree per class per round)
//! for multiclass problems. Classification leaves get a single
//! Newton-Raphson step instead of the raw residual mean.

use std::collections::HashMap;

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};

use crate::data::{validate_data, Targets};
use crate::rng::LcgRng;
use crate::tree::{argmax, DecisionTree, TreeConfig};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for gradient boosting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    /// Number of boosting rounds (default: 100).
    pub n_estimators: usize,
    /// Shrinkage applied to every tree (default: 0.1).
    pub learning_rate: f64,
    /// Maximum depth per tree (default: 3).
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Row fraction drawn without replacement per round (default: 1.0).
    pub subsample: f64,
    /// Features considered per split. `None` = all features.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: None,
            seed: 42,
        }
    }
}

fn validate_config(config: &GbdtConfig) -> Result<()> {
    if config.n_estimators == 0 {
        return Err(QsarError::InvalidInput("n_estimators must be > 0".into()));
    }
    if !(config.learning_rate > 0.0) {
        return Err(QsarError::InvalidInput("learning_rate must be > 0".into()));
    }
    if !(config.subsample > 0.0 && config.subsample <= 1.0) {
        return Err(QsarError::InvalidInput("subsample must be in (0, 1]".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loss helpers
// ---------------------------------------------------------------------------

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = raw.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Mode {
    Regression,
    Binary,
    Multiclass,
}

// ---------------------------------------------------------------------------
// GradientBoosting
// ---------------------------------------------------------------------------

/// A fitted gradient boosting model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    mode: Mode,
    /// Round-major; multiclass rounds hold `n_classes` consecutive trees.
    trees: Vec<DecisionTree>,
    /// Initial raw score, one per output.
    initial: Vec<f64>,
    learning_rate: f64,
    n_features: usize,
    n_classes: usize,
}

struct Round<'a> {
    data: &'a [f64],
    n_features: usize,
    tree_config: TreeConfig,
    subsample: f64,
    rng: LcgRng,
}

impl Round<'_> {
    fn rows(&mut self, n_samples: usize) -> Vec<usize> {
        if self.subsample < 1.0 {
            let count = ((n_samples as f64 * self.subsample).round() as usize).max(1);
            let mut rows = self.rng.sample_without_replacement(n_samples, count);
            rows.sort_unstable();
            rows
        } else {
            (0..n_samples).collect()
        }
    }

    fn fit_residuals(&mut self, residuals: &[f64], rows: &[usize]) -> DecisionTree {
        let seed = self.rng.fork_seed();
        DecisionTree::fit_indices(
            self.data,
            self.n_features,
            Targets::Continuous(residuals),
            rows,
            &self.tree_config,
            seed,
        )
    }

    fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_features..(i + 1) * self.n_features]
    }

    /// Replace every reached leaf with `scale * sum(num) / sum(den)`.
    fn newton_leaves(&self, tree: &mut DecisionTree, rows: &[usize], num: &[f64], den: &[f64], scale: f64) {
        let mut sums: HashMap<usize, (f64, f64)> = HashMap::new();
        for &i in rows {
            let entry = sums.entry(tree.leaf_index(self.row(i))).or_insert((0.0, 0.0));
            entry.0 += num[i];
            entry.1 += den[i];
        }
        for (leaf, (n, d)) in sums {
            tree.set_leaf_value(leaf, scale * n / d.max(1e-8));
        }
    }
}

impl GradientBoosting {
    /// Fit on flat row-major data; the loss follows the target kind.
    pub fn fit(data: &[f64], n_features: usize, targets: Targets<'_>, config: &GbdtConfig) -> Result<Self> {
        validate_config(config)?;
        let n_samples = validate_data(data, n_features)?;
        targets.check(n_samples)?;

        let mut round = Round {
            data,
            n_features,
            tree_config: TreeConfig {
                max_depth: Some(config.max_depth),
                min_samples_split: config.min_samples_split,
                min_samples_leaf: config.min_samples_leaf,
                max_features: config.max_features,
                seed: config.seed,
            },
            subsample: config.subsample,
            rng: LcgRng::new(config.seed),
        };
        let lr = config.learning_rate;

        match targets {
            Targets::Continuous(y) => {
                let f0 = y.iter().sum::<f64>() / n_samples as f64;
                let mut f = vec![f0; n_samples];
                let mut trees = Vec::with_capacity(config.n_estimators);
                for _ in 0..config.n_estimators {
                    let residuals: Vec<f64> = y.iter().zip(&f).map(|(t, p)| t - p).collect();
                    let rows = round.rows(n_samples);
                    let tree = round.fit_residuals(&residuals, &rows);
                    for (i, fi) in f.iter_mut().enumerate() {
                        *fi += lr * tree.predict(round.row(i));
                    }
                    trees.push(tree);
                }
                Ok(Self {
                    mode: Mode::Regression,
                    trees,
                    initial: vec![f0],
                    learning_rate: lr,
                    n_features,
                    n_classes: 0,
                })
            }
            Targets::Classes { labels, n_classes } if n_classes <= 2 => {
                let p0 = labels.iter().filter(|&&l| l == 1).count() as f64 / n_samples as f64;
                let p0 = p0.clamp(1e-8, 1.0 - 1e-8);
                let f0 = (p0 / (1.0 - p0)).ln();
                let mut f = vec![f0; n_samples];
                let mut trees = Vec::with_capacity(config.n_estimators);
                for _ in 0..config.n_estimators {
                    let p: Vec<f64> = f.iter().map(|&v| sigmoid(v)).collect();
                    let residuals: Vec<f64> = labels.iter().zip(&p).map(|(&l, pi)| l as f64 - pi).collect();
                    let hessian: Vec<f64> = p.iter().map(|pi| pi * (1.0 - pi)).collect();
                    let rows = round.rows(n_samples);
                    let mut tree = round.fit_residuals(&residuals, &rows);
                    round.newton_leaves(&mut tree, &rows, &residuals, &hessian, 1.0);
                    for (i, fi) in f.iter_mut().enumerate() {
                        *fi += lr * tree.predict(round.row(i));
                    }
                    trees.push(tree);
                }
                Ok(Self {
                    mode: Mode::Binary,
                    trees,
                    initial: vec![f0],
                    learning_rate: lr,
                    n_features,
                    n_classes: 2,
                })
            }
            Targets::Classes { labels, n_classes } => {
                let mut counts = vec![0usize; n_classes];
                for &l in labels {
                    counts[l] += 1;
                }
                let initial: Vec<f64> = counts
                    .iter()
                    .map(|&c| (c as f64 / n_samples as f64).clamp(1e-8, 1.0).ln())
                    .collect();
                let mut f: Vec<Vec<f64>> = vec![initial.clone(); n_samples];
                let factor = (n_classes as f64 - 1.0) / n_classes as f64;
                let mut trees = Vec::with_capacity(config.n_estimators * n_classes);
                for _ in 0..config.n_estimators {
                    let probs: Vec<Vec<f64>> = f.iter().map(|s| softmax(s)).collect();
                    let rows = round.rows(n_samples);
                    for k in 0..n_classes {
                        let residuals: Vec<f64> = labels
                            .iter()
                            .zip(&probs)
                            .map(|(&l, p)| f64::from(u8::from(l == k)) - p[k])
                            .collect();
                        let hessian: Vec<f64> = residuals.iter().map(|r| r.abs() * (1.0 - r.abs())).collect();
                        let mut tree = round.fit_residuals(&residuals, &rows);
                        round.newton_leaves(&mut tree, &rows, &residuals, &hessian, factor);
                        for (i, fi) in f.iter_mut().enumerate() {
                            fi[k] += lr * tree.predict(round.row(i));
                        }
                        trees.push(tree);
                    }
                }
                Ok(Self {
                    mode: Mode::Multiclass,
                    trees,
                    initial,
                    learning_rate: lr,
                    n_features,
                    n_classes,
                })
            }
        }
    }

    /// Raw additive scores: the prediction, the log-odds, or per-class logits.
    pub fn decision_function(&self, sample: &[f64]) -> Vec<f64> {
        let mut raw = self.initial.clone();
        let width = raw.len();
        for (t, tree) in self.trees.iter().enumerate() {
            raw[t % width] += self.learning_rate * tree.predict(sample);
        }
        raw
    }

    /// Regression value or class index.
    pub fn predict(&self, sample: &[f64]) -> f64 {
        let raw = self.decision_function(sample);
        match self.mode {
            Mode::Regression => raw[0],
            Mode::Binary => {
                if sigmoid(raw[0]) > 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Mode::Multiclass => argmax(&raw) as f64,
        }
    }

    pub fn predict_batch(&self, data: &[f64]) -> Vec<f64> {
        data.chunks_exact(self.n_features).map(|row| self.predict(row)).collect()
    }

    /// Class probabilities. Empty for regression models.
    pub fn predict_proba(&self, sample: &[f64]) -> Vec<f64> {
        let raw = self.decision_function(sample);
        match self.mode {
            Mode::Regression => Vec::new(),
            Mode::Binary => {
                let p = sigmoid(raw[0]);
                vec![1.0 - p, p]
            }
            Mode::Multiclass => softmax(&raw),
        }
    }

    /// Impurity-based importances averaged over trees, normalised.
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (acc, v) in importance.iter_mut().zip(tree.feature_importance()) {
                *acc += v;
            }
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }
        importance
    }

    /// Number of boosting rounds.
    pub fn n_estimators(&self) -> usize {
        self.trees.len() / self.initial.len().max(1)
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}
