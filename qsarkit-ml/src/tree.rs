//! CART decision trees for regression (MSE) and classification (Gini).
//!
//! Nodes live in a flat arena; children are indices into it. Leaves store a
//! value vector: the mean target for regression, class frequencies for
//! classification. Every split records its weighted impurity decrease so
//! ensembles can report impurity-based feature importances.

use qsarkit_core::Result;
use serde::{Deserialize, Serialize};

use crate::data::{validate_data, Targets};
use crate::rng::LcgRng;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Growth limits for a single tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at each split. `None` considers every feature.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A node in the tree arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// `n * impurity(parent) - n_l * impurity(left) - n_r * impurity(right)`
        impurity_decrease: f64,
        n_samples: usize,
    },
    Leaf {
        value: Vec<f64>,
        n_samples: usize,
    },
}

/// A fitted decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
    /// 0 for regression trees.
    n_classes: usize,
}

impl DecisionTree {
    /// Fit on flat row-major data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty, dimensions are inconsistent, or
    /// the targets do not match the row count.
    pub fn fit(data: &[f64], n_features: usize, targets: Targets<'_>, config: &TreeConfig) -> Result<Self> {
        let n_samples = validate_data(data, n_features)?;
        targets.check(n_samples)?;
        let indices: Vec<usize> = (0..n_samples).collect();
        Ok(Self::fit_indices(data, n_features, targets, &indices, config, config.seed))
    }

    /// Fit on a (possibly repeating) subset of rows. Inputs must already be
    /// validated.
    pub(crate) fn fit_indices(
        data: &[f64],
        n_features: usize,
        targets: Targets<'_>,
        indices: &[usize],
        config: &TreeConfig,
        seed: u64,
    ) -> Self {
        let max_features = config
            .max_features
            .map_or(n_features, |m| m.clamp(1, n_features));
        let mut builder = Builder {
            data,
            n_features,
            targets,
            config,
            max_features,
            rng: LcgRng::new(seed),
            nodes: Vec::new(),
        };
        builder.build(indices, 0);
        Self {
            nodes: builder.nodes,
            n_features,
            n_classes: targets.n_classes(),
        }
    }

    /// Arena index of the leaf a sample lands in.
    pub fn leaf_index(&self, sample: &[f64]) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { .. } => return idx,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[*feature_idx] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Leaf value vector for a sample.
    pub fn leaf_value(&self, sample: &[f64]) -> &[f64] {
        match &self.nodes[self.leaf_index(sample)] {
            TreeNode::Leaf { value, .. } => value,
            TreeNode::Split { .. } => &[],
        }
    }

    /// Regression value, or the most frequent class index for classifiers.
    pub fn predict(&self, sample: &[f64]) -> f64 {
        let value = self.leaf_value(sample);
        if self.n_classes == 0 {
            value.first().copied().unwrap_or(0.0)
        } else {
            argmax(value) as f64
        }
    }

    pub fn predict_batch(&self, data: &[f64]) -> Vec<f64> {
        data.chunks_exact(self.n_features).map(|row| self.predict(row)).collect()
    }

    /// Class frequencies at the sample's leaf. Empty for regression trees.
    pub fn predict_proba(&self, sample: &[f64]) -> Vec<f64> {
        if self.n_classes == 0 {
            return Vec::new();
        }
        self.leaf_value(sample).to_vec()
    }

    pub(crate) fn set_leaf_value(&mut self, idx: usize, new_value: f64) {
        if let Some(TreeNode::Leaf { value, .. }) = self.nodes.get_mut(idx) {
            *value = vec![new_value];
        }
    }

    /// Per-feature impurity decrease, normalised to sum to 1 (all zeros for
    /// a tree without splits).
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut importance = self.raw_importance();
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }
        importance
    }

    pub(crate) fn raw_importance(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.n_features];
        for node in &self.nodes {
            if let TreeNode::Split {
                feature_idx,
                impurity_decrease,
                ..
            } = node
            {
                importance[*feature_idx] += impurity_decrease.max(0.0);
            }
        }
        importance
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, TreeNode::Leaf { .. })).count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct Builder<'a> {
    data: &'a [f64],
    n_features: usize,
    targets: Targets<'a>,
    config: &'a TreeConfig,
    max_features: usize,
    rng: LcgRng,
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl Builder<'_> {
    fn value(&self, i: usize, f: usize) -> f64 {
        self.data[i * self.n_features + f]
    }

    fn leaf_value(&self, indices: &[usize]) -> Vec<f64> {
        let n = indices.len().max(1) as f64;
        match self.targets {
            Targets::Continuous(y) => vec![indices.iter().map(|&i| y[i]).sum::<f64>() / n],
            Targets::Classes { labels, n_classes } => {
                let mut counts = vec![0.0; n_classes];
                for &i in indices {
                    counts[labels[i]] += 1.0;
                }
                counts.iter_mut().for_each(|c| *c /= n);
                counts
            }
        }
    }

    fn impurity(&self, indices: &[usize]) -> f64 {
        let n = indices.len() as f64;
        if indices.is_empty() {
            return 0.0;
        }
        match self.targets {
            Targets::Continuous(y) => {
                let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n;
                indices.iter().map(|&i| (y[i] - mean).powi(2)).sum::<f64>() / n
            }
            Targets::Classes { labels, n_classes } => {
                let mut counts = vec![0usize; n_classes];
                for &i in indices {
                    counts[labels[i]] += 1;
                }
                1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
            }
        }
    }

    fn push_leaf(&mut self, indices: &[usize]) -> usize {
        let idx = self.nodes.len();
        let value = self.leaf_value(indices);
        self.nodes.push(TreeNode::Leaf {
            value,
            n_samples: indices.len(),
        });
        idx
    }

    fn build(&mut self, indices: &[usize], depth: usize) -> usize {
        let n = indices.len();
        let depth_reached = self.config.max_depth.is_some_and(|d| depth >= d);
        let too_small = n < self.config.min_samples_split.max(2)
            || n < 2 * self.config.min_samples_leaf.max(1);
        let parent_impurity = self.impurity(indices);
        if depth_reached || too_small || parent_impurity <= 1e-15 {
            return self.push_leaf(indices);
        }

        let Some(best) = self.find_best_split(indices, parent_impurity) else {
            return self.push_leaf(indices);
        };
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.value(i, best.feature) <= best.threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return self.push_leaf(indices);
        }

        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: Vec::new(),
            n_samples: 0,
        }); // placeholder
        let left = self.build(&left_idx, depth + 1);
        let right = self.build(&right_idx, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature_idx: best.feature,
            threshold: best.threshold,
            left,
            right,
            impurity_decrease: best.decrease,
            n_samples: n,
        };
        node_idx
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        if self.max_features >= self.n_features {
            (0..self.n_features).collect()
        } else {
            self.rng.sample_without_replacement(self.n_features, self.max_features)
        }
    }

    fn find_best_split(&mut self, indices: &[usize], parent_impurity: f64) -> Option<BestSplit> {
        let n = indices.len();
        let parent_total = parent_impurity * n as f64;
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;

        for feat in self.candidate_features() {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| self.value(a, feat).total_cmp(&self.value(b, feat)));

            let mut sweep = Sweep::new(self.targets, &order);
            for pos in 0..n - 1 {
                sweep.move_left(order[pos]);
                let v = self.value(order[pos], feat);
                let next = self.value(order[pos + 1], feat);
                let n_left = pos + 1;
                if next - v <= 1e-12 || n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }
                let decrease = parent_total - sweep.weighted_children();
                if decrease > best.as_ref().map_or(1e-12, |b| b.decrease) {
                    let mut threshold = (v + next) / 2.0;
                    if threshold >= next {
                        threshold = v;
                    }
                    best = Some(BestSplit {
                        feature: feat,
                        threshold,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

/// Running left/right statistics while sweeping sorted samples.
enum Sweep<'a> {
    Regression {
        y: &'a [f64],
        n: usize,
        n_left: usize,
        sum_left: f64,
        sq_left: f64,
        sum_total: f64,
        sq_total: f64,
    },
    Gini {
        labels: &'a [usize],
        n: usize,
        n_left: usize,
        left: Vec<usize>,
        right: Vec<usize>,
        sq_left: f64,
        sq_right: f64,
    },
}

impl<'a> Sweep<'a> {
    fn new(targets: Targets<'a>, order: &[usize]) -> Self {
        match targets {
            Targets::Continuous(y) => Sweep::Regression {
                y,
                n: order.len(),
                n_left: 0,
                sum_left: 0.0,
                sq_left: 0.0,
                sum_total: order.iter().map(|&i| y[i]).sum(),
                sq_total: order.iter().map(|&i| y[i] * y[i]).sum(),
            },
            Targets::Classes { labels, n_classes } => {
                let mut right = vec![0usize; n_classes];
                for &i in order {
                    right[labels[i]] += 1;
                }
                let sq_right = right.iter().map(|&c| (c * c) as f64).sum();
                Sweep::Gini {
                    labels,
                    n: order.len(),
                    n_left: 0,
                    left: vec![0; n_classes],
                    right,
                    sq_left: 0.0,
                    sq_right,
                }
            }
        }
    }

    fn move_left(&mut self, i: usize) {
        match self {
            Sweep::Regression {
                y,
                n_left,
                sum_left,
                sq_left,
                ..
            } => {
                *n_left += 1;
                *sum_left += y[i];
                *sq_left += y[i] * y[i];
            }
            Sweep::Gini {
                labels,
                n_left,
                left,
                right,
                sq_left,
                sq_right,
                ..
            } => {
                let k = labels[i];
                *sq_left += (2 * left[k] + 1) as f64;
                *sq_right -= (2 * right[k] - 1) as f64;
                left[k] += 1;
                right[k] -= 1;
                *n_left += 1;
            }
        }
    }

    /// `n_l * impurity(left) + n_r * impurity(right)`.
    fn weighted_children(&self) -> f64 {
        match self {
            Sweep::Regression {
                n,
                n_left,
                sum_left,
                sq_left,
                sum_total,
                sq_total,
                ..
            } => {
                let nl = *n_left as f64;
                let nr = (*n - *n_left) as f64;
                let sum_right = sum_total - sum_left;
                let sq_right = sq_total - sq_left;
                let left = sq_left - sum_left * sum_left / nl;
                let right = sq_right - sum_right * sum_right / nr;
                left.max(0.0) + right.max(0.0)
            }
            Sweep::Gini {
                n,
                n_left,
                sq_left,
                sq_right,
                ..
            } => {
                let nl = *n_left as f64;
                let nr = (*n - *n_left) as f64;
                (nl - sq_left / nl) + (nr - sq_right / nr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(labels: &[usize], n_classes: usize) -> Targets<'_> {
        Targets::Classes { labels, n_classes }
    }

    #[test]
    fn separable_classification() {
        let data = vec![1.0, 2.0, 1.5, 1.8, 1.2, 2.2, 8.0, 9.0, 8.5, 8.8, 9.0, 8.2];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let tree = DecisionTree::fit(&data, 2, classes(&labels, 2), &TreeConfig::default()).unwrap();
        assert_eq!(tree.predict(&[1.0, 2.0]), 0.0);
        assert_eq!(tree.predict(&[9.0, 9.0]), 1.0);
        assert_eq!(tree.predict_proba(&[9.0, 9.0]), vec![0.0, 1.0]);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn multiclass() {
        let data = vec![0.0, 0.1, 0.2, 5.0, 5.1, 5.2, 10.0, 10.1, 10.2];
        let labels = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let tree = DecisionTree::fit(&data, 1, classes(&labels, 3), &TreeConfig::default()).unwrap();
        let preds = tree.predict_batch(&data);
        assert_eq!(preds, labels.iter().map(|&l| l as f64).collect::<Vec<_>>());
    }

    #[test]
    fn regression_step_function() {
        let data: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let tree = DecisionTree::fit(&data, 1, Targets::Continuous(&y), &TreeConfig::default()).unwrap();
        assert_eq!(tree.predict(&[3.0]), 1.0);
        assert_eq!(tree.predict(&[15.0]), 5.0);
        assert_eq!(tree.depth(), 1);
        let TreeNode::Split { threshold, .. } = &tree.nodes()[0] else {
            panic!("root should split");
        };
        assert_eq!(*threshold, 9.5);
    }

    #[test]
    fn depth_and_leaf_limits() {
        let data: Vec<f64> = (0..32).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let shallow = TreeConfig {
            max_depth: Some(2),
            ..TreeConfig::default()
        };
        let tree = DecisionTree::fit(&data, 1, Targets::Continuous(&y), &shallow).unwrap();
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);

        let leafy = TreeConfig {
            min_samples_leaf: 8,
            ..TreeConfig::default()
        };
        let tree = DecisionTree::fit(&data, 1, Targets::Continuous(&y), &leafy).unwrap();
        for node in tree.nodes() {
            if let TreeNode::Leaf { n_samples, .. } = node {
                assert!(*n_samples >= 8);
            }
        }
    }

    #[test]
    fn importance_tracks_informative_feature() {
        // feature 1 carries the signal, feature 0 is noise
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            data.push(((i * 7) % 13) as f64);
            data.push(i as f64);
            y.push(if i < 20 { 0.0 } else { 10.0 });
        }
        let tree = DecisionTree::fit(&data, 2, Targets::Continuous(&y), &TreeConfig::default()).unwrap();
        let imp = tree.feature_importance();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(imp[1] > 0.99);
    }

    #[test]
    fn constant_targets_give_single_leaf() {
        let data = vec![1.0, 2.0, 3.0];
        let y = vec![4.0, 4.0, 4.0];
        let tree = DecisionTree::fit(&data, 1, Targets::Continuous(&y), &TreeConfig::default()).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.feature_importance(), vec![0.0]);
    }

    #[test]
    fn input_errors() {
        let cfg = TreeConfig::default();
        assert!(DecisionTree::fit(&[], 1, Targets::Continuous(&[]), &cfg).is_err());
        assert!(DecisionTree::fit(&[1.0, 2.0, 3.0], 2, Targets::Continuous(&[1.0]), &cfg).is_err());
        assert!(DecisionTree::fit(&[1.0, 2.0], 1, Targets::Continuous(&[1.0]), &cfg).is_err());
        assert!(DecisionTree::fit(&[1.0, 2.0], 1, classes(&[0, 3], 2), &cfg).is_err());
    }
}
