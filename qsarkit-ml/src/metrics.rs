//! Regression and classification evaluation metrics.
//!
//! Regression: MSE, RMSE, R², MAE. Classification: confusion matrix,
//! accuracy, per-class precision / recall / F1 with macro and weighted
//! averages, and ROC AUC (binary, or macro one-vs-rest).

use qsarkit_core::{QsarError, Result, Summarizable};
use serde::{Deserialize, Serialize};

fn check_lengths(a: usize, b: usize) -> Result<()> {
    if a == 0 {
        return Err(QsarError::InvalidInput("empty input".into()));
    }
    if a != b {
        return Err(QsarError::InvalidInput(format!("length mismatch: {a} != {b}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual.len(), predicted.len())?;
    Ok(actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum::<f64>() / actual.len() as f64)
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual.len(), predicted.len())?;
    Ok(actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / actual.len() as f64)
}

/// Coefficient of determination. A constant target gives 1.0 for a perfect
/// fit and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual.len(), predicted.len())?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        let mse = mean_squared_error(actual, predicted)?;
        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            r2: r2_score(actual, predicted)?,
            mae: mean_absolute_error(actual, predicted)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Confusion matrix
// ---------------------------------------------------------------------------

/// Row-major confusion matrix: entry `(i, j)` counts samples whose actual
/// class is `i` and predicted class is `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    matrix: Vec<usize>,
    n_classes: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[usize], predicted: &[usize], n_classes: usize) -> Result<Self> {
        check_lengths(actual.len(), predicted.len())?;
        let mut matrix = vec![0usize; n_classes * n_classes];
        for (&a, &p) in actual.iter().zip(predicted) {
            if a >= n_classes || p >= n_classes {
                return Err(QsarError::InvalidInput(format!(
                    "label out of range for {n_classes} classes"
                )));
            }
            matrix[a * n_classes + p] += 1;
        }
        Ok(Self { matrix, n_classes })
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.matrix[actual * self.n_classes + predicted]
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    pub fn true_positives(&self, class: usize) -> usize {
        self.get(class, class)
    }

    /// Samples predicted as `class` (column sum).
    pub fn predicted_count(&self, class: usize) -> usize {
        (0..self.n_classes).map(|a| self.get(a, class)).sum()
    }

    /// Samples whose actual class is `class` (row sum).
    pub fn support(&self, class: usize) -> usize {
        (0..self.n_classes).map(|p| self.get(class, p)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (0..self.n_classes).map(|c| self.get(c, c)).sum::<usize>() as f64 / total as f64
    }

    /// Zero when nothing was predicted as `class`.
    pub fn precision(&self, class: usize) -> f64 {
        let denom = self.predicted_count(class);
        if denom == 0 {
            0.0
        } else {
            self.true_positives(class) as f64 / denom as f64
        }
    }

    /// Zero when `class` never occurs.
    pub fn recall(&self, class: usize) -> f64 {
        let denom = self.support(class);
        if denom == 0 {
            0.0
        } else {
            self.true_positives(class) as f64 / denom as f64
        }
    }

    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

pub fn accuracy(actual: &[usize], predicted: &[usize]) -> Result<f64> {
    check_lengths(actual.len(), predicted.len())?;
    Ok(actual.iter().zip(predicted).filter(|(a, p)| a == p).count() as f64 / actual.len() as f64)
}

// ---------------------------------------------------------------------------
// Classification report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class scores keyed by the original label value, plus averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<(f64, ClassScores)>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    /// `label_values[i]` names class index `i`.
    pub fn from_confusion(cm: &ConfusionMatrix, label_values: &[f64]) -> Self {
        let classes: Vec<(f64, ClassScores)> = (0..cm.n_classes())
            .map(|c| {
                (
                    label_values.get(c).copied().unwrap_or(c as f64),
                    ClassScores {
                        precision: cm.precision(c),
                        recall: cm.recall(c),
                        f1: cm.f1(c),
                        support: cm.support(c),
                    },
                )
            })
            .collect();
        let total = cm.total();
        let k = classes.len().max(1) as f64;
        let avg = |weight: &dyn Fn(&ClassScores) -> f64, norm: f64| ClassScores {
            precision: classes.iter().map(|(_, s)| weight(s) * s.precision).sum::<f64>() / norm,
            recall: classes.iter().map(|(_, s)| weight(s) * s.recall).sum::<f64>() / norm,
            f1: classes.iter().map(|(_, s)| weight(s) * s.f1).sum::<f64>() / norm,
            support: total,
        };
        let macro_avg = avg(&|_| 1.0, k);
        let weighted_avg = avg(&|s| s.support as f64, total.max(1) as f64);
        Self {
            accuracy: cm.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

// ---------------------------------------------------------------------------
// ROC AUC
// ---------------------------------------------------------------------------

/// Area under the ROC curve for binary labels, with tied scores grouped.
///
/// Returns `None` when either class is absent or a score is not finite.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    if scores.is_empty() || scores.len() != labels.len() || scores.iter().any(|s| !s.is_finite()) {
        return None;
    }
    let total_pos = labels.iter().filter(|&&l| l).count();
    let total_neg = labels.len() - total_pos;
    if total_pos == 0 || total_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let (p, n) = (total_pos as f64, total_neg as f64);
    let (mut tp, mut fp) = (0usize, 0usize);
    let (mut prev_fpr, mut prev_tpr) = (0.0, 0.0);
    let mut auc = 0.0;
    let mut i = 0;
    while i < order.len() {
        let score = scores[order[i]];
        while i < order.len() && scores[order[i]] == score {
            if labels[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let (fpr, tpr) = (fp as f64 / n, tp as f64 / p);
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_fpr = fpr;
        prev_tpr = tpr;
    }
    Some(auc)
}

/// Macro-averaged one-vs-rest AUC over `proba` rows (one column per class).
///
/// `None` if any class is missing from `labels` or any column fails.
pub fn roc_auc_ovr(proba: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Option<f64> {
    if proba.len() != labels.len() || n_classes < 2 {
        return None;
    }
    let mut total = 0.0;
    for class in 0..n_classes {
        let scores: Vec<f64> = proba.iter().map(|row| row.get(class).copied().unwrap_or(f64::NAN)).collect();
        let truth: Vec<bool> = labels.iter().map(|&l| l == class).collect();
        total += roc_auc(&scores, &truth)?;
    }
    Some(total / n_classes as f64)
}

// ---------------------------------------------------------------------------
// Evaluation result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Absent when the model has no probabilities or a class is degenerate.
    pub roc_auc: Option<f64>,
    pub report: ClassificationReport,
}

/// Metrics for a held-out set, by task kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Evaluation {
    Regression(RegressionMetrics),
    Classification(ClassificationMetrics),
}

impl Summarizable for Evaluation {
    fn summary(&self) -> String {
        match self {
            Evaluation::Regression(m) => {
                format!("MSE {:.4}, RMSE {:.4}, R² {:.4}, MAE {:.4}", m.mse, m.rmse, m.r2, m.mae)
            }
            Evaluation::Classification(m) => match m.roc_auc {
                Some(auc) => format!("accuracy {:.4}, ROC AUC {:.4}", m.accuracy, auc),
                None => format!("accuracy {:.4}", m.accuracy),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regression_metrics() {
        let actual = [3.0, -0.5, 2.0, 7.0];
        let predicted = [2.5, 0.0, 2.0, 8.0];
        let m = RegressionMetrics::compute(&actual, &predicted).unwrap();
        assert!((m.mse - 0.375).abs() < 1e-12);
        assert!((m.rmse - 0.375f64.sqrt()).abs() < 1e-12);
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.r2 - 0.948_608_137_044_967_9).abs() < 1e-12);
        assert!(mean_squared_error(&[], &[]).is_err());
        assert!(r2_score(&[1.0, 1.0], &[1.0, 1.0]).unwrap() == 1.0);
    }

    #[test]
    fn confusion_and_report() {
        let actual = [0, 0, 1, 1, 1, 2];
        let predicted = [0, 1, 1, 1, 0, 2];
        let cm = ConfusionMatrix::from_labels(&actual, &predicted, 3).unwrap();
        assert_eq!(cm.get(1, 0), 1);
        assert!((cm.accuracy() - 4.0 / 6.0).abs() < 1e-12);
        assert!((cm.precision(1) - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.recall(1) - 2.0 / 3.0).abs() < 1e-12);

        let report = ClassificationReport::from_confusion(&cm, &[10.0, 20.0, 30.0]);
        assert_eq!(report.classes[2].0, 30.0);
        assert_eq!(report.classes[2].1.f1, 1.0);
        assert_eq!(report.weighted_avg.support, 6);
        let macro_recall = (0.5 + 2.0 / 3.0 + 1.0) / 3.0;
        assert!((report.macro_avg.recall - macro_recall).abs() < 1e-12);
        assert!((report.weighted_avg.recall - report.accuracy).abs() < 1e-12);
        assert!(ConfusionMatrix::from_labels(&[0, 3], &[0, 0], 2).is_err());
    }

    #[test]
    fn auc_values() {
        let perfect = roc_auc(&[0.9, 0.8, 0.2, 0.1], &[true, true, false, false]).unwrap();
        assert!((perfect - 1.0).abs() < 1e-12);
        let reversed = roc_auc(&[0.1, 0.2, 0.8, 0.9], &[true, true, false, false]).unwrap();
        assert!(reversed.abs() < 1e-12);
        let ties = roc_auc(&[0.5, 0.5, 0.5, 0.5], &[true, false, true, false]).unwrap();
        assert!((ties - 0.5).abs() < 1e-12);
        assert_eq!(roc_auc(&[0.5, 0.4], &[true, true]), None);
    }

    #[test]
    fn ovr_auc() {
        let proba = vec![
            vec![0.8, 0.1, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.1, 0.1, 0.8],
            vec![0.7, 0.2, 0.1],
        ];
        let auc = roc_auc_ovr(&proba, &[0, 1, 2, 0], 3).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
        assert_eq!(roc_auc_ovr(&proba, &[0, 1, 1, 0], 3), None);
    }

    #[test]
    fn summaries() {
        let e = Evaluation::Regression(RegressionMetrics::compute(&[1.0, 2.0], &[1.0, 2.0]).unwrap());
        assert!(e.summary().starts_with("MSE 0.0000"));
    }
}
