//! Feature matrices and class-label encoding.
//!
//! Data is flat row-major `Vec<f64>` with an explicit column count, the same
//! layout every estimator in this crate consumes.

use std::collections::HashMap;

use qsarkit_chem::DescriptorTable;
use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Check a flat matrix and return its row count.
pub(crate) fn validate_data(data: &[f64], n_features: usize) -> Result<usize> {
    if data.is_empty() {
        return Err(QsarError::InvalidInput("empty data".into()));
    }
    if n_features == 0 {
        return Err(QsarError::InvalidInput("n_features must be > 0".into()));
    }
    if data.len() % n_features != 0 {
        return Err(QsarError::InvalidInput(format!(
            "data length {} not divisible by n_features {}",
            data.len(),
            n_features
        )));
    }
    Ok(data.len() / n_features)
}

pub(crate) fn validate_targets(len: usize, n_samples: usize) -> Result<()> {
    if len != n_samples {
        return Err(QsarError::InvalidInput(format!(
            "targets length {} != n_samples {}",
            len, n_samples
        )));
    }
    Ok(())
}

/// Copy the given rows out of a flat matrix.
pub(crate) fn take_rows(data: &[f64], n_features: usize, rows: &[usize]) -> Vec<f64> {
    let mut out = Vec::with_capacity(rows.len() * n_features);
    for &r in rows {
        out.extend_from_slice(&data[r * n_features..(r + 1) * n_features]);
    }
    out
}

/// Copy the given columns out of a flat matrix, in the order listed.
pub(crate) fn take_columns(data: &[f64], n_features: usize, cols: &[usize]) -> Vec<f64> {
    let n_rows = data.len() / n_features;
    let mut out = Vec::with_capacity(n_rows * cols.len());
    for r in 0..n_rows {
        let row = &data[r * n_features..(r + 1) * n_features];
        out.extend(cols.iter().map(|&c| row[c]));
    }
    out
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Training targets as estimators see them.
#[derive(Debug, Clone, Copy)]
pub enum Targets<'a> {
    /// Real-valued regression targets.
    Continuous(&'a [f64]),
    /// Encoded class indices in `0..n_classes`.
    Classes { labels: &'a [usize], n_classes: usize },
}

impl<'a> Targets<'a> {
    pub fn len(&self) -> usize {
        match self {
            Targets::Continuous(y) => y.len(),
            Targets::Classes { labels, .. } => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, Targets::Classes { .. })
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Targets::Continuous(_) => 0,
            Targets::Classes { n_classes, .. } => *n_classes,
        }
    }

    pub(crate) fn check(&self, n_samples: usize) -> Result<()> {
        validate_targets(self.len(), n_samples)?;
        match self {
            Targets::Continuous(y) => {
                if y.iter().any(|v| !v.is_finite()) {
                    return Err(QsarError::InvalidInput("non-finite target value".into()));
                }
            }
            Targets::Classes { labels, n_classes } => {
                if let Some(bad) = labels.iter().find(|&&l| l >= *n_classes) {
                    return Err(QsarError::InvalidInput(format!(
                        "label {bad} out of range for {n_classes} classes"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Owned copy of the targets at the given rows.
    pub(crate) fn subset(&self, rows: &[usize]) -> OwnedTargets {
        match self {
            Targets::Continuous(y) => OwnedTargets::Continuous(rows.iter().map(|&r| y[r]).collect()),
            Targets::Classes { labels, n_classes } => OwnedTargets::Classes {
                labels: rows.iter().map(|&r| labels[r]).collect(),
                n_classes: *n_classes,
            },
        }
    }
}

/// Owning counterpart of [`Targets`], for row subsets.
#[derive(Debug, Clone)]
pub(crate) enum OwnedTargets {
    Continuous(Vec<f64>),
    Classes { labels: Vec<usize>, n_classes: usize },
}

impl OwnedTargets {
    pub(crate) fn view(&self) -> Targets<'_> {
        match self {
            OwnedTargets::Continuous(y) => Targets::Continuous(y),
            OwnedTargets::Classes { labels, n_classes } => Targets::Classes {
                labels,
                n_classes: *n_classes,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureMatrix
// ---------------------------------------------------------------------------

/// Named columns over row-major numeric data.
///
/// Non-finite cells are treated as missing and replaced by the mean of the
/// column's finite values (0.0 when a column has none), except in matrices
/// built by the `_unimputed` constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    names: Vec<String>,
    data: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build from column names and flat row-major data, imputing missing cells.
    pub fn new(names: Vec<String>, data: Vec<f64>) -> Result<Self> {
        let mut matrix = Self::new_unimputed(names, data)?;
        matrix.impute_column_means();
        Ok(matrix)
    }

    /// Build without touching non-finite cells.
    ///
    /// Meant for rows scored by a [`TrainedModel`](crate::TrainedModel),
    /// which fills gaps from its training means instead of this batch's.
    pub fn new_unimputed(names: Vec<String>, data: Vec<f64>) -> Result<Self> {
        let n_cols = names.len();
        let n_rows = validate_data(&data, n_cols)?;
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(QsarError::InvalidInput(format!("duplicate column name {dup}")));
        }
        Ok(Self { names, data, n_rows })
    }

    /// Build from per-row vectors.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
            return Err(QsarError::InvalidInput(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                names.len()
            )));
        }
        Self::new(names, rows.concat())
    }

    /// Stack descriptor tables into one matrix.
    ///
    /// Columns follow first appearance across the tables; a key missing from
    /// a table (for example a 3D group that failed to embed) is imputed.
    pub fn from_tables(tables: &[DescriptorTable]) -> Result<Self> {
        let (names, data) = stack_tables(tables)?;
        Self::new(names, data)
    }

    /// Like [`from_tables`](Self::from_tables) but missing keys stay NaN.
    pub fn from_tables_unimputed(tables: &[DescriptorTable]) -> Result<Self> {
        let (names, data) = stack_tables(tables)?;
        Self::new_unimputed(names, data)
    }

    fn impute_column_means(&mut self) {
        let n_cols = self.names.len();
        for c in 0..n_cols {
            let (sum, count) = (0..self.n_rows)
                .map(|r| self.data[r * n_cols + c])
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if count == self.n_rows {
                continue;
            }
            let fill = if count > 0 { sum / count as f64 } else { 0.0 };
            for r in 0..self.n_rows {
                let cell = &mut self.data[r * n_cols + c];
                if !cell.is_finite() {
                    *cell = fill;
                }
            }
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.n_cols();
        &self.data[i * n..(i + 1) * n]
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let c = self.names.iter().position(|n| n == name)?;
        Some((0..self.n_rows).map(|r| self.data[r * self.n_cols() + c]).collect())
    }

    /// Subset of rows, in the order given.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.n_rows) {
            return Err(QsarError::InvalidInput(format!(
                "row {} out of range for {} rows",
                bad, self.n_rows
            )));
        }
        Ok(Self {
            names: self.names.clone(),
            data: take_rows(&self.data, self.n_cols(), rows),
            n_rows: rows.len(),
        })
    }

    /// Reorder (and subset) columns to match `names`.
    ///
    /// Fails if any requested column is absent.
    pub fn align_to(&self, names: &[String]) -> Result<Vec<f64>> {
        if names == self.names.as_slice() {
            return Ok(self.data.clone());
        }
        let index: HashMap<&str, usize> =
            self.names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        let cols = names
            .iter()
            .map(|n| {
                index
                    .get(n.as_str())
                    .copied()
                    .ok_or_else(|| QsarError::InvalidInput(format!("missing feature column {n}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(take_columns(&self.data, self.n_cols(), &cols))
    }

    /// Reorder columns to match `names`, filling absent columns and
    /// non-finite cells of column `c` with `fill[c]`.
    ///
    /// Fails only when none of `names` is present.
    pub fn align_filled(&self, names: &[String], fill: &[f64]) -> Result<Vec<f64>> {
        if names.len() != fill.len() {
            return Err(QsarError::InvalidInput(format!(
                "{} fill values for {} columns",
                fill.len(),
                names.len()
            )));
        }
        let index: HashMap<&str, usize> =
            self.names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        let cols: Vec<Option<usize>> = names.iter().map(|n| index.get(n.as_str()).copied()).collect();
        if !names.is_empty() && cols.iter().all(Option::is_none) {
            return Err(QsarError::InvalidInput("no training feature column present".into()));
        }
        let n_cols = self.n_cols();
        let mut out = Vec::with_capacity(self.n_rows * names.len());
        for r in 0..self.n_rows {
            let row = &self.data[r * n_cols..(r + 1) * n_cols];
            out.extend(cols.iter().zip(fill).map(|(col, &f)| match col {
                Some(c) if row[*c].is_finite() => row[*c],
                _ => f,
            }));
        }
        Ok(out)
    }
}

fn stack_tables(tables: &[DescriptorTable]) -> Result<(Vec<String>, Vec<f64>)> {
    if tables.is_empty() {
        return Err(QsarError::InvalidInput("no descriptor tables".into()));
    }
    let mut names: Vec<String> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for table in tables {
        for name in table.names() {
            if !index.contains_key(name) {
                index.insert(name, names.len());
                names.push(name.to_string());
            }
        }
    }
    let n_cols = names.len();
    let mut data = vec![f64::NAN; tables.len() * n_cols];
    for (r, table) in tables.iter().enumerate() {
        for (name, value) in table.iter() {
            data[r * n_cols + index[name]] = value;
        }
    }
    Ok((names, data))
}

// ---------------------------------------------------------------------------
// LabelEncoder
// ---------------------------------------------------------------------------

/// Maps class label values to contiguous indices `0..n_classes`, sorted
/// ascending by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<f64>,
}

impl LabelEncoder {
    pub fn fit(y: &[f64]) -> Result<Self> {
        if let Some(bad) = y.iter().find(|v| !v.is_finite()) {
            return Err(QsarError::InvalidInput(format!("non-finite class label {bad}")));
        }
        let mut classes = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();
        if classes.len() < 2 {
            return Err(QsarError::InvalidInput(
                "classification needs at least two classes".into(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn index_of(&self, value: f64) -> Option<usize> {
        self.classes.binary_search_by(|c| c.total_cmp(&value)).ok()
    }

    pub fn encode(&self, y: &[f64]) -> Result<Vec<usize>> {
        y.iter()
            .map(|&v| {
                self.index_of(v)
                    .ok_or_else(|| QsarError::InvalidInput(format!("unknown class label {v}")))
            })
            .collect()
    }

    pub fn decode(&self, idx: usize) -> f64 {
        self.classes.get(idx).copied().unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, f64)]) -> DescriptorTable {
        pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn tables_use_first_appearance_order_and_impute() {
        let tables = vec![
            table(&[("MolWt", 10.0), ("PMI1", 2.0)]),
            table(&[("MolWt", 20.0), ("LogP", 1.0)]),
            table(&[("MolWt", 30.0), ("PMI1", 4.0), ("LogP", f64::NAN)]),
        ];
        let m = FeatureMatrix::from_tables(&tables).unwrap();
        assert_eq!(m.names(), ["MolWt", "PMI1", "LogP"]);
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.column("PMI1").unwrap(), vec![2.0, 3.0, 4.0]);
        assert_eq!(m.column("LogP").unwrap(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn all_missing_column_becomes_zero() {
        let m = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![1.0, f64::NAN, 2.0, f64::INFINITY]).unwrap();
        assert_eq!(m.column("b").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn shape_errors() {
        assert!(FeatureMatrix::new(vec!["a".into(), "b".into()], vec![1.0, 2.0, 3.0]).is_err());
        assert!(FeatureMatrix::new(vec!["a".into(), "a".into()], vec![1.0, 2.0]).is_err());
        assert!(FeatureMatrix::from_rows(vec!["a".into()], &[vec![1.0, 2.0]]).is_err());
        assert!(FeatureMatrix::from_tables(&[]).is_err());
    }

    #[test]
    fn align_reorders_and_rejects_missing() {
        let m = FeatureMatrix::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            &[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        )
        .unwrap();
        let aligned = m.align_to(&["c".to_string(), "a".to_string()]).unwrap();
        assert_eq!(aligned, vec![3.0, 1.0, 6.0, 4.0]);
        assert!(m.align_to(&["zzz".to_string()]).is_err());
        let rows = m.select_rows(&[1]).unwrap();
        assert_eq!(rows.row(0), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn unimputed_keeps_gaps_and_fill_uses_given_means() {
        let tables = vec![table(&[("MolWt", 10.0), ("LogP", f64::NAN)]), table(&[("MolWt", 30.0)])];
        let m = FeatureMatrix::from_tables_unimputed(&tables).unwrap();
        assert!(m.column("LogP").unwrap().iter().all(|v| v.is_nan()));

        let names = vec!["LogP".to_string(), "PMI1".to_string(), "MolWt".to_string()];
        let filled = m.align_filled(&names, &[0.5, 7.0, -1.0]).unwrap();
        assert_eq!(filled, vec![0.5, 7.0, 10.0, 0.5, 7.0, 30.0]);

        // A row's fill does not depend on the other rows in the batch.
        let alone = FeatureMatrix::from_tables_unimputed(&tables[1..]).unwrap();
        assert_eq!(alone.align_filled(&names, &[0.5, 7.0, -1.0]).unwrap(), vec![0.5, 7.0, 30.0]);

        assert!(m.align_filled(&["zzz".to_string()], &[0.0]).is_err());
        assert!(m.align_filled(&names, &[0.0]).is_err());
    }

    #[test]
    fn label_encoder_sorts_classes() {
        let enc = LabelEncoder::fit(&[2.0, 0.0, 2.0, 1.0]).unwrap();
        assert_eq!(enc.classes(), &[0.0, 1.0, 2.0]);
        assert_eq!(enc.encode(&[1.0, 2.0]).unwrap(), vec![1, 2]);
        assert!(enc.encode(&[5.0]).is_err());
        assert_eq!(enc.decode(2), 2.0);
        assert!(LabelEncoder::fit(&[1.0, 1.0]).is_err());
    }
}
