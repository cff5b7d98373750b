//! Kernel support vector machines: epsilon-SVR and one-vs-rest C-SVC.
//!
//! Both are trained by dual coordinate descent with the bias folded into
//! the kernel (`K(x, z) + 1`), which removes the equality constraint of the
//! classic dual. The kernel matrix is precomputed, so training is meant for
//! the few-hundred-row tables typical of QSAR work.
//!
//! SVC exposes decision values only; it has no probability output.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{validate_data, validate_targets};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Rbf,
    Linear,
}

/// RBF width. `Scale` is `1 / (n_features · var(X))`, `Auto` is
/// `1 / n_features`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    Scale,
    Auto,
    Value(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    pub c: f64,
    /// Width of the insensitive tube (regression only).
    pub epsilon: f64,
    pub kernel: Kernel,
    pub gamma: Gamma,
    pub tol: f64,
    pub max_iter: usize,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            kernel: Kernel::Rbf,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1000,
        }
    }
}

fn resolve_gamma(gamma: Gamma, data: &[f64], n_features: usize) -> f64 {
    match gamma {
        Gamma::Value(g) => g,
        Gamma::Auto => 1.0 / n_features as f64,
        Gamma::Scale => {
            let n = data.len() as f64;
            let mean = data.iter().sum::<f64>() / n;
            let var = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            if var > 0.0 {
                1.0 / (n_features as f64 * var)
            } else {
                1.0
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Kernel evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct KernelFn {
    kernel: Kernel,
    gamma: f64,
}

impl KernelFn {
    /// Kernel value plus the folded-in bias term.
    fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        let k = match self.kernel {
            Kernel::Linear => a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>(),
            Kernel::Rbf => {
                let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
                (-self.gamma * d2).exp()
            }
        };
        k + 1.0
    }

    fn gram(&self, data: &[f64], n_features: usize) -> Vec<f64> {
        let rows: Vec<&[f64]> = data.chunks_exact(n_features).collect();
        let n = rows.len();
        let mut k = vec![0.0; n * n];
        for i in 0..n {
            for j in i..n {
                let v = self.eval(rows[i], rows[j]);
                k[i * n + j] = v;
                k[j * n + i] = v;
            }
        }
        k
    }
}

/// Support vectors with their dual weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DualModel {
    support: Vec<f64>,
    weights: Vec<f64>,
}

impl DualModel {
    fn from_dual(data: &[f64], n_features: usize, coef: &[f64]) -> Self {
        let mut support = Vec::new();
        let mut weights = Vec::new();
        for (row, &c) in data.chunks_exact(n_features).zip(coef) {
            if c != 0.0 {
                support.extend_from_slice(row);
                weights.push(c);
            }
        }
        Self { support, weights }
    }

    fn decision(&self, kernel: &KernelFn, n_features: usize, sample: &[f64]) -> f64 {
        self.support
            .chunks_exact(n_features)
            .zip(&self.weights)
            .map(|(sv, w)| w * kernel.eval(sv, sample))
            .sum()
    }

    /// Primal weights for a linear kernel (bias excluded).
    fn primal(&self, n_features: usize) -> Vec<f64> {
        let mut w = vec![0.0; n_features];
        for (sv, c) in self.support.chunks_exact(n_features).zip(&self.weights) {
            for (wj, x) in w.iter_mut().zip(sv) {
                *wj += c * x;
            }
        }
        w
    }
}

// ---------------------------------------------------------------------------
// Solvers
// ---------------------------------------------------------------------------

/// Box-constrained hinge dual: `min ½ aᵀQa - Σa`, `0 ≤ a ≤ C`,
/// `Q_ij = y_i y_j K_ij`. Returns signed coefficients `a_i y_i`.
fn solve_svc_dual(gram: &[f64], y: &[f64], config: &SvmConfig) -> Vec<f64> {
    let n = y.len();
    let mut alpha = vec![0.0; n];
    // grad_i = (Q a)_i - 1
    let mut grad = vec![-1.0; n];
    for epoch in 0..config.max_iter {
        let mut max_step = 0.0f64;
        for i in 0..n {
            let qii = gram[i * n + i];
            if qii <= 0.0 {
                continue;
            }
            let new = (alpha[i] - grad[i] / qii).clamp(0.0, config.c);
            let delta = new - alpha[i];
            if delta == 0.0 {
                continue;
            }
            alpha[i] = new;
            for j in 0..n {
                grad[j] += delta * y[i] * y[j] * gram[i * n + j];
            }
            max_step = max_step.max(delta.abs());
        }
        if max_step < config.tol {
            debug!(epoch, "svc dual converged");
            break;
        }
    }
    alpha.iter().zip(y).map(|(a, t)| a * t).collect()
}

/// Epsilon-insensitive dual in the signed variable `b = a - a*`:
/// `min ½ bᵀKb - yᵀb + eps·||b||₁`, `-C ≤ b ≤ C`.
fn solve_svr_dual(gram: &[f64], y: &[f64], config: &SvmConfig) -> Vec<f64> {
    let n = y.len();
    let mut beta = vec![0.0; n];
    // kb_i = (K b)_i
    let mut kb = vec![0.0; n];
    for epoch in 0..config.max_iter {
        let mut max_step = 0.0f64;
        for i in 0..n {
            let kii = gram[i * n + i];
            if kii <= 0.0 {
                continue;
            }
            let rest = kb[i] - kii * beta[i];
            let target = y[i] - rest;
            let shrunk = if target > config.epsilon {
                target - config.epsilon
            } else if target < -config.epsilon {
                target + config.epsilon
            } else {
                0.0
            };
            let new = (shrunk / kii).clamp(-config.c, config.c);
            let delta = new - beta[i];
            if delta == 0.0 {
                continue;
            }
            beta[i] = new;
            for j in 0..n {
                kb[j] += delta * gram[i * n + j];
            }
            max_step = max_step.max(delta.abs());
        }
        if max_step < config.tol {
            debug!(epoch, "svr dual converged");
            break;
        }
    }
    beta
}

fn validate_config(config: &SvmConfig) -> Result<()> {
    if !(config.c > 0.0) {
        return Err(QsarError::InvalidInput("C must be > 0".into()));
    }
    if !(config.epsilon >= 0.0) {
        return Err(QsarError::InvalidInput("epsilon must be >= 0".into()));
    }
    if let Gamma::Value(g) = config.gamma {
        if !(g > 0.0) {
            return Err(QsarError::InvalidInput("gamma must be > 0".into()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Svr
// ---------------------------------------------------------------------------

/// A fitted epsilon-support vector regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Svr {
    kernel: KernelFn,
    n_features: usize,
    model: DualModel,
}

impl Svr {
    pub fn fit(data: &[f64], n_features: usize, y: &[f64], config: &SvmConfig) -> Result<Self> {
        validate_config(config)?;
        let n_samples = validate_data(data, n_features)?;
        validate_targets(y.len(), n_samples)?;
        let kernel = KernelFn {
            kernel: config.kernel,
            gamma: resolve_gamma(config.gamma, data, n_features),
        };
        let gram = kernel.gram(data, n_features);
        let beta = solve_svr_dual(&gram, y, config);
        Ok(Self {
            model: DualModel::from_dual(data, n_features, &beta),
            kernel,
            n_features,
        })
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        self.model.decision(&self.kernel, self.n_features, sample)
    }

    pub fn n_support(&self) -> usize {
        self.model.weights.len()
    }

    /// Primal weights, available for the linear kernel only.
    pub fn coef(&self) -> Option<Vec<f64>> {
        (self.kernel.kernel == Kernel::Linear).then(|| self.model.primal(self.n_features))
    }
}

// ---------------------------------------------------------------------------
// Svc
// ---------------------------------------------------------------------------

/// A fitted support vector classifier (one binary machine per class for
/// more than two classes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Svc {
    kernel: KernelFn,
    n_features: usize,
    n_classes: usize,
    machines: Vec<DualModel>,
}

impl Svc {
    pub fn fit(
        data: &[f64],
        n_features: usize,
        labels: &[usize],
        n_classes: usize,
        config: &SvmConfig,
    ) -> Result<Self> {
        validate_config(config)?;
        let n_samples = validate_data(data, n_features)?;
        validate_targets(labels.len(), n_samples)?;
        if n_classes < 2 {
            return Err(QsarError::InvalidInput("need at least two classes".into()));
        }
        let kernel = KernelFn {
            kernel: config.kernel,
            gamma: resolve_gamma(config.gamma, data, n_features),
        };
        let gram = kernel.gram(data, n_features);
        let positives: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };
        let machines = positives
            .into_iter()
            .map(|class| {
                let y: Vec<f64> = labels.iter().map(|&l| if l == class { 1.0 } else { -1.0 }).collect();
                let coef = solve_svc_dual(&gram, &y, config);
                DualModel::from_dual(data, n_features, &coef)
            })
            .collect();
        Ok(Self {
            kernel,
            n_features,
            n_classes,
            machines,
        })
    }

    /// Signed distance per binary machine.
    pub fn decision_function(&self, sample: &[f64]) -> Vec<f64> {
        self.machines
            .iter()
            .map(|m| m.decision(&self.kernel, self.n_features, sample))
            .collect()
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        let scores = self.decision_function(sample);
        if self.n_classes == 2 {
            f64::from(u8::from(scores[0] > 0.0))
        } else {
            crate::tree::argmax(&scores) as f64
        }
    }

    /// Mean absolute primal weight across machines, linear kernel only.
    pub fn abs_coef(&self) -> Option<Vec<f64>> {
        if self.kernel.kernel != Kernel::Linear {
            return None;
        }
        let k = self.machines.len() as f64;
        let mut out = vec![0.0; self.n_features];
        for m in &self.machines {
            for (o, w) in out.iter_mut().zip(m.primal(self.n_features)) {
                *o += w.abs() / k;
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svr_fits_smooth_curve() {
        let data: Vec<f64> = (0..40).map(|i| i as f64 / 10.0).collect();
        let y: Vec<f64> = data.iter().map(|x| x.sin()).collect();
        let config = SvmConfig {
            c: 10.0,
            gamma: Gamma::Value(1.0),
            ..SvmConfig::default()
        };
        let model = Svr::fit(&data, 1, &y, &config).unwrap();
        for (x, t) in data.iter().zip(&y) {
            assert!((model.predict(&[*x]) - t).abs() < 0.25);
        }
        assert!(model.n_support() > 0);
        assert!(model.coef().is_none());
    }

    #[test]
    fn linear_svr_exposes_weights() {
        let data: Vec<f64> = (0..20).map(|i| i as f64 / 5.0).collect();
        let y: Vec<f64> = data.iter().map(|x| 2.0 * x).collect();
        let config = SvmConfig {
            kernel: Kernel::Linear,
            c: 100.0,
            ..SvmConfig::default()
        };
        let model = Svr::fit(&data, 1, &y, &config).unwrap();
        let w = model.coef().unwrap();
        assert!((w[0] - 2.0).abs() < 0.3, "w {w:?}");
    }

    #[test]
    fn svc_binary_and_multiclass() {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let class = i % 3;
            let center = class as f64 * 4.0;
            data.extend_from_slice(&[center + (i % 4) as f64 * 0.1, center - (i % 5) as f64 * 0.1]);
            labels.push(class);
        }
        let model = Svc::fit(&data, 2, &labels, 3, &SvmConfig::default()).unwrap();
        assert_eq!(model.predict(&[0.1, 0.0]), 0.0);
        assert_eq!(model.predict(&[4.1, 3.9]), 1.0);
        assert_eq!(model.predict(&[8.0, 8.0]), 2.0);
        assert_eq!(model.decision_function(&[0.0, 0.0]).len(), 3);

        let binary: Vec<usize> = labels.iter().map(|&l| usize::from(l > 0)).collect();
        let config = SvmConfig {
            kernel: Kernel::Linear,
            ..SvmConfig::default()
        };
        let model = Svc::fit(&data, 2, &binary, 2, &config).unwrap();
        assert_eq!(model.predict(&[0.0, 0.0]), 0.0);
        assert_eq!(model.predict(&[8.0, 8.0]), 1.0);
        assert_eq!(model.abs_coef().unwrap().len(), 2);
    }

    #[test]
    fn gamma_modes() {
        let data = [0.0, 2.0, 4.0, 6.0];
        assert_eq!(resolve_gamma(Gamma::Auto, &data, 2), 0.5);
        assert_eq!(resolve_gamma(Gamma::Value(0.3), &data, 2), 0.3);
        assert!((resolve_gamma(Gamma::Scale, &data, 2) - 1.0 / (2.0 * 5.0)).abs() < 1e-12);
    }

    #[test]
    fn config_errors() {
        let bad = SvmConfig {
            c: 0.0,
            ..SvmConfig::default()
        };
        assert!(Svr::fit(&[1.0, 2.0], 1, &[1.0, 2.0], &bad).is_err());
        assert!(Svc::fit(&[1.0, 2.0], 1, &[0, 0], 1, &SvmConfig::default()).is_err());
    }
}
