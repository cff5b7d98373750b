//! Linear regression (plain, ridge, lasso, elastic net) and L2-penalised
//! logistic regression.
//!
//! Objectives follow the usual conventions:
//!
//! - ridge: `||y - Xw||² + alpha·||w||²`
//! - lasso / elastic net: `1/(2n)·||y - Xw||² + alpha·l1_ratio·||w||₁
//!   + alpha·(1 - l1_ratio)/2·||w||²`, solved by coordinate descent
//! - logistic: `Σ logloss + alpha/2·||w||²` (so `C = 1/alpha`), solved by
//!   Newton iterations, one-vs-rest for more than two classes
//!
//! The intercept is never penalised.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{validate_data, validate_targets};
use crate::linalg::solve_spd;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Regularisation applied to a linear regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    None,
    Ridge,
    Lasso,
    ElasticNet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    pub penalty: Penalty,
    pub alpha: f64,
    /// Share of the L1 term for elastic net.
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            penalty: Penalty::None,
            alpha: 1.0,
            l1_ratio: 0.5,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    /// Inverse of the usual `C`.
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iter: 100,
            tol: 1e-6,
        }
    }
}

fn column_means(data: &[f64], n_features: usize) -> Vec<f64> {
    let n = (data.len() / n_features) as f64;
    let mut means = vec![0.0; n_features];
    for row in data.chunks_exact(n_features) {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    means.iter_mut().for_each(|m| *m /= n);
    means
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn soft_threshold(x: f64, lambda: f64) -> f64 {
    if x > lambda {
        x - lambda
    } else if x < -lambda {
        x + lambda
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// LinearModel
// ---------------------------------------------------------------------------

/// A fitted linear regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    coef: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn fit(data: &[f64], n_features: usize, y: &[f64], config: &LinearConfig) -> Result<Self> {
        let n_samples = validate_data(data, n_features)?;
        validate_targets(y.len(), n_samples)?;
        if config.penalty != Penalty::None && !(config.alpha >= 0.0) {
            return Err(QsarError::InvalidInput("alpha must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&config.l1_ratio) {
            return Err(QsarError::InvalidInput("l1_ratio must be in [0, 1]".into()));
        }

        let x_mean = column_means(data, n_features);
        let y_mean = y.iter().sum::<f64>() / n_samples as f64;
        let xc: Vec<f64> = data
            .chunks_exact(n_features)
            .flat_map(|row| row.iter().zip(&x_mean).map(|(v, m)| v - m))
            .collect();
        let yc: Vec<f64> = y.iter().map(|v| v - y_mean).collect();

        let coef = match config.penalty {
            Penalty::None => normal_equations(&xc, n_features, &yc, 0.0)?,
            Penalty::Ridge => normal_equations(&xc, n_features, &yc, config.alpha)?,
            Penalty::Lasso => coordinate_descent(&xc, n_features, &yc, config.alpha, 1.0, config),
            Penalty::ElasticNet => coordinate_descent(&xc, n_features, &yc, config.alpha, config.l1_ratio, config),
        };
        let intercept = y_mean - dot(&coef, &x_mean);
        Ok(Self { coef, intercept })
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        self.intercept + dot(&self.coef, sample)
    }

    pub fn predict_batch(&self, data: &[f64]) -> Vec<f64> {
        data.chunks_exact(self.coef.len().max(1)).map(|row| self.predict(row)).collect()
    }

    pub fn coef(&self) -> &[f64] {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// `(XᵀX + alpha·I) w = Xᵀy` on centered data.
fn normal_equations(xc: &[f64], p: usize, yc: &[f64], alpha: f64) -> Result<Vec<f64>> {
    let mut gram = vec![0.0; p * p];
    let mut rhs = vec![0.0; p];
    for (row, &t) in xc.chunks_exact(p).zip(yc) {
        for i in 0..p {
            rhs[i] += row[i] * t;
            for j in i..p {
                gram[i * p + j] += row[i] * row[j];
            }
        }
    }
    for i in 0..p {
        for j in 0..i {
            gram[i * p + j] = gram[j * p + i];
        }
        gram[i * p + i] += alpha;
    }
    solve_spd(&gram, &rhs)
}

fn coordinate_descent(xc: &[f64], p: usize, yc: &[f64], alpha: f64, l1_ratio: f64, config: &LinearConfig) -> Vec<f64> {
    let n = yc.len();
    let nf = n as f64;
    let l1 = alpha * l1_ratio;
    let l2 = alpha * (1.0 - l1_ratio);
    let col_sq: Vec<f64> = (0..p)
        .map(|j| (0..n).map(|i| xc[i * p + j].powi(2)).sum::<f64>() / nf)
        .collect();

    let mut w = vec![0.0; p];
    let mut residual = yc.to_vec();
    for iter in 0..config.max_iter {
        let mut max_delta = 0.0f64;
        let mut max_w = 0.0f64;
        for j in 0..p {
            if col_sq[j] == 0.0 {
                continue;
            }
            let old = w[j];
            let rho = (0..n).map(|i| xc[i * p + j] * (residual[i] + xc[i * p + j] * old)).sum::<f64>() / nf;
            let new = soft_threshold(rho, l1) / (col_sq[j] + l2);
            if new != old {
                let delta = new - old;
                for i in 0..n {
                    residual[i] -= xc[i * p + j] * delta;
                }
                w[j] = new;
            }
            max_delta = max_delta.max((new - old).abs());
            max_w = max_w.max(new.abs());
        }
        if max_w == 0.0 || max_delta <= config.tol * max_w {
            debug!(iter, "coordinate descent converged");
            break;
        }
    }
    w
}

// ---------------------------------------------------------------------------
// LogisticRegression
// ---------------------------------------------------------------------------

/// A fitted logistic regression; one binary model per class for multiclass
/// problems (one-vs-rest), a single model otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    n_classes: usize,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl LogisticRegression {
    pub fn fit(
        data: &[f64],
        n_features: usize,
        labels: &[usize],
        n_classes: usize,
        config: &LogisticConfig,
    ) -> Result<Self> {
        let n_samples = validate_data(data, n_features)?;
        validate_targets(labels.len(), n_samples)?;
        if n_classes < 2 {
            return Err(QsarError::InvalidInput("need at least two classes".into()));
        }
        if !(config.alpha > 0.0) {
            return Err(QsarError::InvalidInput("alpha must be > 0".into()));
        }

        let positives: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };
        let mut coef = Vec::with_capacity(positives.len());
        let mut intercept = Vec::with_capacity(positives.len());
        for class in positives {
            let y: Vec<f64> = labels.iter().map(|&l| f64::from(u8::from(l == class))).collect();
            let (w, b) = newton_binary(data, n_features, &y, config)?;
            coef.push(w);
            intercept.push(b);
        }
        Ok(Self {
            coef,
            intercept,
            n_classes,
        })
    }

    /// Class probabilities; one-vs-rest scores are normalised to sum to 1.
    pub fn predict_proba(&self, sample: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(w, b)| sigmoid(dot(w, sample) + b))
            .collect();
        if self.n_classes == 2 {
            return vec![1.0 - scores[0], scores[0]];
        }
        let sum: f64 = scores.iter().sum();
        if sum > 0.0 {
            scores.iter().map(|s| s / sum).collect()
        } else {
            vec![1.0 / self.n_classes as f64; self.n_classes]
        }
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        crate::tree::argmax(&self.predict_proba(sample)) as f64
    }

    pub fn coef(&self) -> &[Vec<f64>] {
        &self.coef
    }

    /// Mean absolute coefficient per feature across the binary models.
    pub fn abs_coef(&self) -> Vec<f64> {
        let p = self.coef.first().map_or(0, Vec::len);
        let k = self.coef.len() as f64;
        (0..p)
            .map(|j| self.coef.iter().map(|w| w[j].abs()).sum::<f64>() / k)
            .collect()
    }
}

fn logistic_objective(data: &[f64], p: usize, y: &[f64], w: &[f64], b: f64, alpha: f64) -> f64 {
    let loss: f64 = data
        .chunks_exact(p)
        .zip(y)
        .map(|(row, &t)| {
            let z = dot(w, row) + b;
            // log(1 + e^z) - t z, stable for large |z|
            let softplus = if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() };
            softplus - t * z
        })
        .sum();
    loss + 0.5 * alpha * dot(w, w)
}

fn newton_binary(data: &[f64], p: usize, y: &[f64], config: &LogisticConfig) -> Result<(Vec<f64>, f64)> {
    let dim = p + 1;
    let mut w = vec![0.0; p];
    let mut b = 0.0;
    let mut objective = logistic_objective(data, p, y, &w, b, config.alpha);

    for _ in 0..config.max_iter {
        let mut grad = vec![0.0; dim];
        let mut hess = vec![0.0; dim * dim];
        for (row, &t) in data.chunks_exact(p).zip(y) {
            let prob = sigmoid(dot(&w, row) + b);
            let err = prob - t;
            let s = (prob * (1.0 - prob)).max(1e-12);
            for i in 0..dim {
                let xi = if i < p { row[i] } else { 1.0 };
                grad[i] += err * xi;
                for j in i..dim {
                    let xj = if j < p { row[j] } else { 1.0 };
                    hess[i * dim + j] += s * xi * xj;
                }
            }
        }
        for i in 0..dim {
            for j in 0..i {
                hess[i * dim + j] = hess[j * dim + i];
            }
            if i < p {
                grad[i] += config.alpha * w[i];
                hess[i * dim + i] += config.alpha;
            }
        }
        let step = solve_spd(&hess, &grad)?;

        // damped step: halve until the objective stops increasing
        let mut scale = 1.0;
        let mut accepted = false;
        for _ in 0..30 {
            let w_new: Vec<f64> = w.iter().zip(&step).map(|(wi, si)| wi - scale * si).collect();
            let b_new = b - scale * step[p];
            let obj_new = logistic_objective(data, p, y, &w_new, b_new, config.alpha);
            if obj_new <= objective + 1e-12 {
                let improvement = objective - obj_new;
                w = w_new;
                b = b_new;
                objective = obj_new;
                accepted = improvement > config.tol * objective.abs().max(1.0);
                break;
            }
            scale *= 0.5;
        }
        if !accepted {
            break;
        }
    }
    Ok((w, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> (Vec<f64>, Vec<f64>) {
        // y = 3 x0 - 2 x1 + 1
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let x0 = i as f64;
            let x1 = ((i * 7) % 5) as f64;
            data.extend_from_slice(&[x0, x1]);
            y.push(3.0 * x0 - 2.0 * x1 + 1.0);
        }
        (data, y)
    }

    #[test]
    fn ols_recovers_exact_coefficients() {
        let (data, y) = line_data();
        let m = LinearModel::fit(&data, 2, &y, &LinearConfig::default()).unwrap();
        assert!((m.coef()[0] - 3.0).abs() < 1e-8);
        assert!((m.coef()[1] + 2.0).abs() < 1e-8);
        assert!((m.intercept() - 1.0).abs() < 1e-8);
        assert!((m.predict(&[2.0, 1.0]) - 5.0).abs() < 1e-8);
    }

    #[test]
    fn ridge_shrinks_towards_zero() {
        let (data, y) = line_data();
        let ols = LinearModel::fit(&data, 2, &y, &LinearConfig::default()).unwrap();
        let ridge = LinearModel::fit(
            &data,
            2,
            &y,
            &LinearConfig {
                penalty: Penalty::Ridge,
                alpha: 100.0,
                ..LinearConfig::default()
            },
        )
        .unwrap();
        let norm = |c: &[f64]| c.iter().map(|v| v * v).sum::<f64>();
        assert!(norm(ridge.coef()) < norm(ols.coef()));
    }

    #[test]
    fn lasso_zeroes_irrelevant_feature() {
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let x0 = i as f64 / 3.0;
            let noise = ((i * 13) % 7) as f64 / 7.0 - 0.5;
            data.extend_from_slice(&[x0, noise]);
            y.push(2.0 * x0);
        }
        let config = LinearConfig {
            penalty: Penalty::Lasso,
            alpha: 0.1,
            ..LinearConfig::default()
        };
        let m = LinearModel::fit(&data, 2, &y, &config).unwrap();
        assert!(m.coef()[0] > 1.5);
        assert_eq!(m.coef()[1], 0.0);

        let enet = LinearModel::fit(
            &data,
            2,
            &y,
            &LinearConfig {
                penalty: Penalty::ElasticNet,
                ..config
            },
        )
        .unwrap();
        assert!(enet.coef()[0] > 1.0);
    }

    #[test]
    fn huge_lasso_penalty_gives_mean_model() {
        let (data, y) = line_data();
        let config = LinearConfig {
            penalty: Penalty::Lasso,
            alpha: 1e6,
            ..LinearConfig::default()
        };
        let m = LinearModel::fit(&data, 2, &y, &config).unwrap();
        assert!(m.coef().iter().all(|&c| c == 0.0));
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        assert!((m.intercept() - mean).abs() < 1e-9);
    }

    #[test]
    fn logistic_binary_and_multiclass() {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            data.push(i as f64 / 10.0 - 1.5);
            labels.push(usize::from(i >= 15));
        }
        let model = LogisticRegression::fit(&data, 1, &labels, 2, &LogisticConfig::default()).unwrap();
        assert_eq!(model.predict(&[-1.2]), 0.0);
        assert_eq!(model.predict(&[1.2]), 1.0);
        let p = model.predict_proba(&[1.2]);
        assert!((p[0] + p[1] - 1.0).abs() < 1e-12);
        assert_eq!(model.coef().len(), 1);

        let labels3: Vec<usize> = (0..30).map(|i| i / 10).collect();
        let model = LogisticRegression::fit(&data, 1, &labels3, 3, &LogisticConfig { alpha: 0.01, ..LogisticConfig::default() }).unwrap();
        assert_eq!(model.coef().len(), 3);
        assert_eq!(model.predict(&[-1.4]), 0.0);
        assert_eq!(model.predict(&[1.4]), 2.0);
        let p = model.predict_proba(&[0.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(model.abs_coef().len(), 1);
    }

    #[test]
    fn rejects_bad_settings() {
        let (data, y) = line_data();
        let bad = LinearConfig {
            penalty: Penalty::ElasticNet,
            l1_ratio: 2.0,
            ..LinearConfig::default()
        };
        assert!(LinearModel::fit(&data, 2, &y, &bad).is_err());
        assert!(LogisticRegression::fit(&[1.0, 2.0], 1, &[0, 0], 1, &LogisticConfig::default()).is_err());
        assert!(LogisticRegression::fit(&[1.0, 2.0], 1, &[0, 1], 2, &LogisticConfig { alpha: 0.0, ..LogisticConfig::default() }).is_err());
    }
}
