//! Multi-layer perceptrons for regression and classification.
//!
//! ReLU hidden layers; identity output with half squared error for
//! regression, softmax output with cross-entropy for classification. All
//! weights live in one flat parameter vector so the optimisers (Adam, or SGD
//! with momentum) work on plain slices.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{validate_data, Targets};
use crate::rng::LcgRng;
use crate::tree::argmax;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Solver {
    Adam,
    Sgd,
}

/// Step-size schedule. `Adaptive` divides the rate by 5 whenever the
/// training loss stalls instead of stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningRate {
    Constant,
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    pub hidden_layer_sizes: Vec<usize>,
    /// L2 penalty.
    pub alpha: f64,
    pub learning_rate_init: f64,
    pub learning_rate: LearningRate,
    pub solver: Solver,
    /// SGD momentum.
    pub momentum: f64,
    pub batch_size: usize,
    /// Maximum number of epochs.
    pub max_iter: usize,
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            alpha: 1e-4,
            learning_rate_init: 1e-3,
            learning_rate: LearningRate::Constant,
            solver: Solver::Adam,
            momentum: 0.9,
            batch_size: 32,
            max_iter: 200,
            tol: 1e-4,
            n_iter_no_change: 10,
            seed: 42,
        }
    }
}

fn validate_config(config: &MlpConfig) -> Result<()> {
    if config.hidden_layer_sizes.iter().any(|&h| h == 0) {
        return Err(QsarError::InvalidInput("hidden layer sizes must be > 0".into()));
    }
    if !(config.learning_rate_init > 0.0) {
        return Err(QsarError::InvalidInput("learning_rate_init must be > 0".into()));
    }
    if !(config.alpha >= 0.0) {
        return Err(QsarError::InvalidInput("alpha must be >= 0".into()));
    }
    if config.batch_size == 0 || config.max_iter == 0 {
        return Err(QsarError::InvalidInput("batch_size and max_iter must be > 0".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// A fitted multi-layer perceptron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    /// Layer widths, input first.
    sizes: Vec<usize>,
    params: Vec<f64>,
    /// 0 for regression networks.
    n_classes: usize,
    n_epochs: usize,
    final_loss: f64,
}

/// `(weight offset, bias offset)` per layer; weights are `in x out`.
fn layer_offsets(sizes: &[usize]) -> (Vec<(usize, usize)>, usize) {
    let mut offsets = Vec::with_capacity(sizes.len() - 1);
    let mut at = 0;
    for w in sizes.windows(2) {
        let w_off = at;
        let b_off = w_off + w[0] * w[1];
        offsets.push((w_off, b_off));
        at = b_off + w[1];
    }
    (offsets, at)
}

fn softmax_in_place(v: &mut [f64]) {
    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for x in v.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    v.iter_mut().for_each(|x| *x /= sum);
}

/// Activations of every layer (input included); the last entry holds raw
/// output scores.
fn forward(sizes: &[usize], offsets: &[(usize, usize)], params: &[f64], sample: &[f64]) -> Vec<Vec<f64>> {
    let mut acts = Vec::with_capacity(sizes.len());
    acts.push(sample.to_vec());
    let last = offsets.len() - 1;
    for (l, &(w_off, b_off)) in offsets.iter().enumerate() {
        let (n_in, n_out) = (sizes[l], sizes[l + 1]);
        let input = &acts[l];
        let mut out = params[b_off..b_off + n_out].to_vec();
        for (i, &x) in input.iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            let row = &params[w_off + i * n_out..w_off + (i + 1) * n_out];
            for (o, w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        if l < last {
            out.iter_mut().for_each(|v| *v = v.max(0.0));
        }
        debug_assert_eq!(input.len(), n_in);
        acts.push(out);
    }
    acts
}

impl Mlp {
    pub fn fit(data: &[f64], n_features: usize, targets: Targets<'_>, config: &MlpConfig) -> Result<Self> {
        validate_config(config)?;
        let n_samples = validate_data(data, n_features)?;
        targets.check(n_samples)?;

        let n_out = match targets {
            Targets::Continuous(_) => 1,
            Targets::Classes { n_classes, .. } => n_classes,
        };
        let mut sizes = vec![n_features];
        sizes.extend_from_slice(&config.hidden_layer_sizes);
        sizes.push(n_out);
        let (offsets, n_params) = layer_offsets(&sizes);

        // Glorot uniform initialisation
        let mut rng = LcgRng::new(config.seed);
        let mut params = vec![0.0; n_params];
        for (l, &(w_off, _)) in offsets.iter().enumerate() {
            let (n_in, n_out) = (sizes[l], sizes[l + 1]);
            let bound = (6.0 / (n_in + n_out) as f64).sqrt();
            let end = w_off + n_in * n_out + n_out;
            for p in &mut params[w_off..end] {
                *p = rng.uniform(-bound, bound);
            }
        }

        let mut optimizer = Optimizer::new(config, n_params);
        let batch_size = config.batch_size.min(n_samples);
        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0usize;
        let mut epochs = 0usize;
        let mut loss = f64::INFINITY;

        for epoch in 0..config.max_iter {
            rng.shuffle(&mut order);
            let mut epoch_loss = 0.0;
            for batch in order.chunks(batch_size) {
                let mut grad = vec![0.0; n_params];
                let batch_loss = backprop(&sizes, &offsets, &params, data, n_features, targets, batch, &mut grad);
                let scale = 1.0 / batch.len() as f64;
                let mut penalty = 0.0;
                for &(w_off, b_off) in &offsets {
                    for j in w_off..b_off {
                        penalty += params[j] * params[j];
                        grad[j] += config.alpha * params[j];
                    }
                }
                grad.iter_mut().for_each(|g| *g *= scale);
                epoch_loss += batch_loss + 0.5 * config.alpha * penalty;
                optimizer.step(&mut params, &grad);
            }
            loss = epoch_loss / n_samples as f64;
            epochs = epoch + 1;
            if !loss.is_finite() {
                return Err(QsarError::Other(format!("training diverged at epoch {epoch}")));
            }

            if loss > best_loss - config.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(loss);
            if no_improvement > config.n_iter_no_change {
                if config.learning_rate == LearningRate::Adaptive && optimizer.lr > 1e-6 {
                    optimizer.lr /= 5.0;
                    no_improvement = 0;
                    debug!(epoch, lr = optimizer.lr, "mlp learning rate reduced");
                } else {
                    debug!(epoch, loss, "mlp training loss stalled");
                    break;
                }
            }
        }

        Ok(Self {
            sizes,
            params,
            n_classes: targets.n_classes(),
            n_epochs: epochs,
            final_loss: loss,
        })
    }

    fn output(&self, sample: &[f64]) -> Vec<f64> {
        let (offsets, _) = layer_offsets(&self.sizes);
        let mut out = forward(&self.sizes, &offsets, &self.params, sample).pop().unwrap_or_default();
        if self.n_classes > 0 {
            softmax_in_place(&mut out);
        }
        out
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        let out = self.output(sample);
        if self.n_classes == 0 {
            out.first().copied().unwrap_or(0.0)
        } else {
            argmax(&out) as f64
        }
    }

    /// Softmax class probabilities. Empty for regression networks.
    pub fn predict_proba(&self, sample: &[f64]) -> Vec<f64> {
        if self.n_classes == 0 {
            return Vec::new();
        }
        self.output(sample)
    }

    /// 0 for regression networks.
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    /// Mean training loss (penalty included) of the last epoch.
    pub fn final_loss(&self) -> f64 {
        self.final_loss
    }
}

/// Accumulate gradients of the summed batch loss into `grad`; returns the
/// summed loss.
#[allow(clippy::too_many_arguments)]
fn backprop(
    sizes: &[usize],
    offsets: &[(usize, usize)],
    params: &[f64],
    data: &[f64],
    n_features: usize,
    targets: Targets<'_>,
    batch: &[usize],
    grad: &mut [f64],
) -> f64 {
    let mut loss = 0.0;
    for &i in batch {
        let sample = &data[i * n_features..(i + 1) * n_features];
        let acts = forward(sizes, offsets, params, sample);
        let mut delta = acts[acts.len() - 1].clone();
        match targets {
            Targets::Continuous(y) => {
                delta[0] -= y[i];
                loss += 0.5 * delta[0] * delta[0];
            }
            Targets::Classes { labels, .. } => {
                softmax_in_place(&mut delta);
                loss -= delta[labels[i]].max(1e-15).ln();
                delta[labels[i]] -= 1.0;
            }
        }

        for l in (0..offsets.len()).rev() {
            let (w_off, b_off) = offsets[l];
            let (n_in, n_out) = (sizes[l], sizes[l + 1]);
            let input = &acts[l];
            for (o, d) in delta.iter().enumerate() {
                grad[b_off + o] += d;
            }
            for (k, &x) in input.iter().enumerate() {
                if x == 0.0 {
                    continue;
                }
                let g = &mut grad[w_off + k * n_out..w_off + (k + 1) * n_out];
                for (gj, d) in g.iter_mut().zip(&delta) {
                    *gj += x * d;
                }
            }
            if l == 0 {
                break;
            }
            // propagate through the ReLU of the layer below
            let mut prev = vec![0.0; n_in];
            for (k, p) in prev.iter_mut().enumerate() {
                if input[k] <= 0.0 {
                    continue;
                }
                let row = &params[w_off + k * n_out..w_off + (k + 1) * n_out];
                *p = row.iter().zip(&delta).map(|(w, d)| w * d).sum();
            }
            delta = prev;
        }
    }
    loss
}

// ---------------------------------------------------------------------------
// Optimisers
// ---------------------------------------------------------------------------

struct Optimizer {
    solver: Solver,
    lr: f64,
    momentum: f64,
    first: Vec<f64>,
    second: Vec<f64>,
    t: i32,
}

impl Optimizer {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPS: f64 = 1e-8;

    fn new(config: &MlpConfig, n_params: usize) -> Self {
        Self {
            solver: config.solver,
            lr: config.learning_rate_init,
            momentum: config.momentum,
            first: vec![0.0; n_params],
            second: match config.solver {
                Solver::Adam => vec![0.0; n_params],
                Solver::Sgd => Vec::new(),
            },
            t: 0,
        }
    }

    fn step(&mut self, params: &mut [f64], grad: &[f64]) {
        match self.solver {
            Solver::Sgd => {
                for ((p, v), g) in params.iter_mut().zip(&mut self.first).zip(grad) {
                    *v = self.momentum * *v - self.lr * g;
                    *p += *v;
                }
            }
            Solver::Adam => {
                self.t = self.t.saturating_add(1);
                let lr_t = self.lr * (1.0 - Self::BETA2.powi(self.t)).sqrt() / (1.0 - Self::BETA1.powi(self.t));
                for (((p, m), v), g) in params.iter_mut().zip(&mut self.first).zip(&mut self.second).zip(grad) {
                    *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * g;
                    *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * g * g;
                    *p -= lr_t * *m / (v.sqrt() + Self::EPS);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_cover_all_parameters() {
        let (offsets, n) = layer_offsets(&[3, 4, 2]);
        assert_eq!(offsets, vec![(0, 12), (16, 24)]);
        assert_eq!(n, 26);
    }

    #[test]
    fn regression_learns_linear_map() {
        let data: Vec<f64> = (0..64).map(|i| i as f64 / 32.0 - 1.0).collect();
        let y: Vec<f64> = data.iter().map(|x| 3.0 * x + 0.5).collect();
        let config = MlpConfig {
            hidden_layer_sizes: vec![16],
            learning_rate_init: 0.01,
            max_iter: 500,
            ..MlpConfig::default()
        };
        let model = Mlp::fit(&data, 1, Targets::Continuous(&y), &config).unwrap();
        let mse = data
            .iter()
            .zip(&y)
            .map(|(x, t)| (model.predict(&[*x]) - t).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 0.05, "mse {mse}");
        assert!(model.predict_proba(&[0.0]).is_empty());
    }

    #[test]
    fn classifier_separates_two_groups() {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let x = i as f64 / 10.0 - 2.0;
            data.extend_from_slice(&[x, -x]);
            labels.push(usize::from(x > 0.0));
        }
        for solver in [Solver::Adam, Solver::Sgd] {
            let config = MlpConfig {
                hidden_layer_sizes: vec![8],
                learning_rate_init: 0.05,
                solver,
                ..MlpConfig::default()
            };
            let model = Mlp::fit(&data, 2, Targets::Classes { labels: &labels, n_classes: 2 }, &config).unwrap();
            assert_eq!(model.predict(&[-1.5, 1.5]), 0.0);
            assert_eq!(model.predict(&[1.5, -1.5]), 1.0);
            let p = model.predict_proba(&[1.5, -1.5]);
            assert!((p[0] + p[1] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn adaptive_schedule_trains_and_is_deterministic() {
        let data: Vec<f64> = (0..20).map(|i| i as f64 / 10.0).collect();
        let y: Vec<f64> = data.iter().map(|x| x * x).collect();
        let config = MlpConfig {
            hidden_layer_sizes: vec![10, 5],
            learning_rate: LearningRate::Adaptive,
            max_iter: 50,
            ..MlpConfig::default()
        };
        let a = Mlp::fit(&data, 1, Targets::Continuous(&y), &config).unwrap();
        let b = Mlp::fit(&data, 1, Targets::Continuous(&y), &config).unwrap();
        assert_eq!(a, b);
        assert!(a.n_epochs() <= 50);
        assert!(a.final_loss().is_finite());
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let sizes = vec![2, 3, 1];
        let (offsets, n) = layer_offsets(&sizes);
        let mut rng = LcgRng::new(5);
        let params: Vec<f64> = (0..n).map(|_| rng.uniform(-1.0, 1.0)).collect();
        let data = [0.3, -0.7, 1.1, 0.4];
        let y = [0.5, -0.2];
        let targets = Targets::Continuous(&y);
        let mut grad = vec![0.0; n];
        backprop(&sizes, &offsets, &params, &data, 2, targets, &[0, 1], &mut grad);
        let h = 1e-6;
        for k in 0..n {
            let mut plus = params.clone();
            plus[k] += h;
            let mut minus = params.clone();
            minus[k] -= h;
            let mut scratch = vec![0.0; n];
            let lp = backprop(&sizes, &offsets, &plus, &data, 2, targets, &[0, 1], &mut scratch);
            let lm = backprop(&sizes, &offsets, &minus, &data, 2, targets, &[0, 1], &mut scratch);
            let numeric = (lp - lm) / (2.0 * h);
            assert!((numeric - grad[k]).abs() < 1e-5, "param {k}: {numeric} vs {}", grad[k]);
        }
    }

    #[test]
    fn config_errors() {
        let y = [1.0, 2.0];
        let bad = MlpConfig {
            hidden_layer_sizes: vec![0],
            ..MlpConfig::default()
        };
        assert!(Mlp::fit(&[1.0, 2.0], 1, Targets::Continuous(&y), &bad).is_err());
        let bad = MlpConfig {
            learning_rate_init: 0.0,
            ..MlpConfig::default()
        };
        assert!(Mlp::fit(&[1.0, 2.0], 1, Targets::Continuous(&y), &bad).is_err());
    }
}
