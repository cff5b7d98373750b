//! Train/test splitting, plain and stratified.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};

use crate::rng::LcgRng;

/// Hold-out split settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows placed in the test split, in `(0, 1)`.
    pub test_size: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
        }
    }
}

fn n_test_rows(n_samples: usize, test_size: f64) -> Result<usize> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(QsarError::InvalidInput(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(QsarError::InvalidInput(format!(
            "cannot split {n_samples} samples with test_size {test_size}"
        )));
    }
    Ok(n_test)
}

/// Shuffle `0..n_samples` and return `(train, test)` index sets.
pub fn train_test_split(n_samples: usize, config: &SplitConfig) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_test = n_test_rows(n_samples, config.test_size)?;
    let mut indices: Vec<usize> = (0..n_samples).collect();
    LcgRng::new(config.seed).shuffle(&mut indices);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Split so each class keeps its proportion in both halves.
///
/// Per-class test counts are allocated by largest remainder so they sum to
/// the same total a plain split would use. Every class needs two members.
pub fn stratified_split(
    labels: &[usize],
    config: &SplitConfig,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_samples = labels.len();
    let n_test = n_test_rows(n_samples, config.test_size)?;
    let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in labels.iter().enumerate() {
        groups[label].push(i);
    }
    if let Some((class, _)) = groups.iter().enumerate().find(|(_, g)| g.len() == 1) {
        return Err(QsarError::InvalidInput(format!(
            "class {class} has a single member; cannot stratify"
        )));
    }
    if n_test < groups.iter().filter(|g| !g.is_empty()).count() {
        return Err(QsarError::InvalidInput(format!(
            "test split of {n_test} rows is smaller than the number of classes"
        )));
    }

    let exact: Vec<f64> = groups
        .iter()
        .map(|g| g.len() as f64 * n_test as f64 / n_samples as f64)
        .collect();
    let mut alloc: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut order: Vec<usize> = (0..n_classes).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    let mut remaining = n_test.saturating_sub(alloc.iter().sum());
    for &c in order.iter().cycle().take(n_classes * 2) {
        if remaining == 0 {
            break;
        }
        if alloc[c] + 1 < groups[c].len() {
            alloc[c] += 1;
            remaining -= 1;
        }
    }

    let mut rng = LcgRng::new(config.seed);
    let mut train = Vec::with_capacity(n_samples - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (group, &k) in groups.iter_mut().zip(&alloc) {
        rng.shuffle(group);
        test.extend_from_slice(&group[..k]);
        train.extend_from_slice(&group[k..]);
    }
    rng.shuffle(&mut train);
    rng.shuffle(&mut test);
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sizes_and_disjointness() {
        let (train, test) = train_test_split(10, &SplitConfig::default()).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_seeded() {
        let cfg = SplitConfig::default();
        assert_eq!(train_test_split(50, &cfg).unwrap(), train_test_split(50, &cfg).unwrap());
        let other = SplitConfig { seed: 7, ..cfg.clone() };
        assert_ne!(train_test_split(50, &cfg).unwrap(), train_test_split(50, &other).unwrap());
    }

    #[test]
    fn stratified_preserves_proportions() {
        let labels: Vec<usize> = (0..100).map(|i| if i < 80 { 0 } else { 1 }).collect();
        let (train, test) = stratified_split(&labels, &SplitConfig::default()).unwrap();
        assert_eq!(test.len(), 20);
        let test_pos = test.iter().filter(|&&i| labels[i] == 1).count();
        let train_pos = train.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 4);
        assert_eq!(train_pos, 16);
    }

    #[test]
    fn invalid_splits() {
        assert!(train_test_split(10, &SplitConfig { test_size: 0.0, seed: 1 }).is_err());
        assert!(train_test_split(10, &SplitConfig { test_size: 1.0, seed: 1 }).is_err());
        assert!(train_test_split(1, &SplitConfig::default()).is_err());
        assert!(stratified_split(&[0, 0, 0, 1], &SplitConfig::default()).is_err());
    }
}
