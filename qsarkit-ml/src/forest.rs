//! Random forests for regression and classification.
//!
//! A bagged ensemble of [`DecisionTree`]s with per-split feature sampling.
//! Each tree gets its own seed drawn up front, so results are identical with
//! and without the `parallel` feature.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{validate_data, Targets};
use crate::rng::LcgRng;
use crate::tree::{argmax, DecisionTree, TreeConfig};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Random forest hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split. `None` uses every feature for
    /// regression and `sqrt(n_features)` for classification.
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree instead of using every row.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

// ---------------------------------------------------------------------------
// RandomForest
// ---------------------------------------------------------------------------

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    /// 0 for regression forests.
    n_classes: usize,
}

impl RandomForest {
    /// Fit a forest on flat row-major data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty, dimensions are inconsistent,
    /// or `n_estimators` is 0.
    pub fn fit(data: &[f64], n_features: usize, targets: Targets<'_>, config: &ForestConfig) -> Result<Self> {
        let n_samples = validate_data(data, n_features)?;
        targets.check(n_samples)?;
        if config.n_estimators == 0 {
            return Err(QsarError::InvalidInput("n_estimators must be > 0".into()));
        }

        let max_features = config.max_features.unwrap_or_else(|| {
            if targets.is_classification() {
                ((n_features as f64).sqrt() as usize).max(1)
            } else {
                n_features
            }
        });
        let tree_config = TreeConfig {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: Some(max_features),
            seed: config.seed,
        };

        let mut rng = LcgRng::new(config.seed);
        let seeds: Vec<u64> = (0..config.n_estimators).map(|_| rng.fork_seed()).collect();

        let grow = |seed: u64| {
            let mut local = LcgRng::new(seed);
            let indices: Vec<usize> = if config.bootstrap {
                (0..n_samples)
                    .map(|_| local.next_bounded(n_samples as u64) as usize)
                    .collect()
            } else {
                (0..n_samples).collect()
            };
            DecisionTree::fit_indices(data, n_features, targets, &indices, &tree_config, local.fork_seed())
        };

        #[cfg(feature = "parallel")]
        let trees: Vec<DecisionTree> = {
            use rayon::prelude::*;
            seeds.par_iter().map(|&s| grow(s)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let trees: Vec<DecisionTree> = seeds.iter().map(|&s| grow(s)).collect();

        debug!(n_trees = trees.len(), max_features, "random forest fitted");
        Ok(Self {
            trees,
            n_features,
            n_classes: targets.n_classes(),
        })
    }

    /// Mean of tree outputs for regression; majority of averaged class
    /// probabilities for classification.
    pub fn predict(&self, sample: &[f64]) -> f64 {
        if self.n_classes == 0 {
            self.trees.iter().map(|t| t.predict(sample)).sum::<f64>() / self.trees.len() as f64
        } else {
            argmax(&self.predict_proba(sample)) as f64
        }
    }

    pub fn predict_batch(&self, data: &[f64]) -> Vec<f64> {
        data.chunks_exact(self.n_features).map(|row| self.predict(row)).collect()
    }

    /// Averaged per-tree class frequencies. Empty for regression forests.
    pub fn predict_proba(&self, sample: &[f64]) -> Vec<f64> {
        if self.n_classes == 0 {
            return Vec::new();
        }
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.leaf_value(sample)) {
                *p += v;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Mean of per-tree normalised impurity importances, renormalised.
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

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}
