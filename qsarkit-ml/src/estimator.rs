//! Estimator construction from hyper-parameters and a uniform interface
//! over the fitted models.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};

use crate::data::{validate_data, Targets};
use crate::forest::{ForestConfig, RandomForest};
use crate::gbdt::{GbdtConfig, GradientBoosting};
use crate::linear::{LinearConfig, LinearModel, LogisticConfig, LogisticRegression, Penalty};
use crate::mlp::{LearningRate, Mlp, MlpConfig, Solver};
use crate::registry::{HyperParams, ModelFamily, ModelKind, ParamValue, TaskKind};
use crate::svm::{Gamma, Kernel, Svc, Svr, SvmConfig};

// ---------------------------------------------------------------------------
// Parameter coercion
// ---------------------------------------------------------------------------

fn mistyped(name: &str, value: &ParamValue) -> QsarError {
    QsarError::Config(format!("invalid value {value} for parameter '{name}'"))
}

fn as_usize(name: &str, value: &ParamValue) -> Result<usize> {
    match value {
        ParamValue::Int(v) if *v >= 0 => usize::try_from(*v).map_err(|_| mistyped(name, value)),
        _ => Err(mistyped(name, value)),
    }
}

fn as_opt_usize(name: &str, value: &ParamValue) -> Result<Option<usize>> {
    match value {
        ParamValue::Null => Ok(None),
        other => as_usize(name, other).map(Some),
    }
}

fn as_f64(name: &str, value: &ParamValue) -> Result<f64> {
    match value {
        ParamValue::Float(v) => Ok(*v),
        ParamValue::Int(v) => Ok(*v as f64),
        _ => Err(mistyped(name, value)),
    }
}

fn as_u64(name: &str, value: &ParamValue) -> Result<u64> {
    as_usize(name, value).map(|v| v as u64)
}

fn as_str<'a>(name: &str, value: &'a ParamValue) -> Result<&'a str> {
    match value {
        ParamValue::Str(s) => Ok(s),
        _ => Err(mistyped(name, value)),
    }
}

fn unknown(kind: ModelKind, name: &str) -> QsarError {
    QsarError::Config(format!("unknown parameter '{name}' for {kind}"))
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Resolved configuration for one estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimatorConfig {
    Forest(ForestConfig),
    Gbdt(GbdtConfig),
    Linear(LinearConfig),
    Logistic(LogisticConfig),
    Svm(SvmConfig),
    Mlp(MlpConfig),
}

/// An unfitted estimator: a registered kind plus its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimator {
    kind: ModelKind,
    config: EstimatorConfig,
}

impl Estimator {
    /// The estimator with library defaults.
    pub fn default_for(kind: ModelKind) -> Self {
        let config = match kind.family() {
            ModelFamily::RandomForest => EstimatorConfig::Forest(ForestConfig::default()),
            ModelFamily::GradientBoosting => EstimatorConfig::Gbdt(GbdtConfig::default()),
            ModelFamily::Linear => EstimatorConfig::Linear(LinearConfig::default()),
            ModelFamily::Ridge => EstimatorConfig::Linear(LinearConfig {
                penalty: Penalty::Ridge,
                ..LinearConfig::default()
            }),
            ModelFamily::Lasso => EstimatorConfig::Linear(LinearConfig {
                penalty: Penalty::Lasso,
                ..LinearConfig::default()
            }),
            ModelFamily::ElasticNet => EstimatorConfig::Linear(LinearConfig {
                penalty: Penalty::ElasticNet,
                ..LinearConfig::default()
            }),
            ModelFamily::Logistic => EstimatorConfig::Logistic(LogisticConfig::default()),
            ModelFamily::Svr | ModelFamily::Svc => EstimatorConfig::Svm(SvmConfig::default()),
            ModelFamily::NeuralNetwork => EstimatorConfig::Mlp(MlpConfig::default()),
        };
        Self { kind, config }
    }

    /// Defaults overridden by `params`.
    ///
    /// # Errors
    ///
    /// [`QsarError::Config`] for a parameter the estimator does not accept
    /// or a value of the wrong type.
    pub fn from_params(kind: ModelKind, params: &HyperParams) -> Result<Self> {
        let mut estimator = Self::default_for(kind);
        for (name, value) in params {
            estimator.set_param(name, value)?;
        }
        Ok(estimator)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let kind = self.kind;
        match &mut self.config {
            EstimatorConfig::Forest(c) => match name {
                "n_estimators" => c.n_estimators = as_usize(name, value)?,
                "max_depth" => c.max_depth = as_opt_usize(name, value)?,
                "min_samples_split" => c.min_samples_split = as_usize(name, value)?,
                "min_samples_leaf" => c.min_samples_leaf = as_usize(name, value)?,
                "max_features" => c.max_features = as_opt_usize(name, value)?,
                "random_state" => c.seed = as_u64(name, value)?,
                _ => return Err(unknown(kind, name)),
            },
            EstimatorConfig::Gbdt(c) => match name {
                "n_estimators" => c.n_estimators = as_usize(name, value)?,
                "learning_rate" => c.learning_rate = as_f64(name, value)?,
                "max_depth" => c.max_depth = as_usize(name, value)?,
                "min_samples_split" => c.min_samples_split = as_usize(name, value)?,
                "min_samples_leaf" => c.min_samples_leaf = as_usize(name, value)?,
                "subsample" => c.subsample = as_f64(name, value)?,
                "max_features" => c.max_features = as_opt_usize(name, value)?,
                "random_state" => c.seed = as_u64(name, value)?,
                _ => return Err(unknown(kind, name)),
            },
            EstimatorConfig::Linear(c) => match (c.penalty, name) {
                (Penalty::None, _) => return Err(unknown(kind, name)),
                (_, "alpha") => c.alpha = as_f64(name, value)?,
                (_, "max_iter") => c.max_iter = as_usize(name, value)?,
                (_, "tol") => c.tol = as_f64(name, value)?,
                (Penalty::ElasticNet, "l1_ratio") => c.l1_ratio = as_f64(name, value)?,
                _ => return Err(unknown(kind, name)),
            },
            EstimatorConfig::Logistic(c) => match name {
                "alpha" => c.alpha = as_f64(name, value)?,
                "C" => {
                    let inverse = as_f64(name, value)?;
                    if !(inverse > 0.0) {
                        return Err(mistyped(name, value));
                    }
                    c.alpha = 1.0 / inverse;
                }
                "max_iter" => c.max_iter = as_usize(name, value)?,
                "tol" => c.tol = as_f64(name, value)?,
                _ => return Err(unknown(kind, name)),
            },
            EstimatorConfig::Svm(c) => match name {
                "C" => c.c = as_f64(name, value)?,
                "epsilon" if kind == ModelKind::Svr => c.epsilon = as_f64(name, value)?,
                "kernel" => {
                    c.kernel = match as_str(name, value)? {
                        "rbf" => Kernel::Rbf,
                        "linear" => Kernel::Linear,
                        _ => return Err(mistyped(name, value)),
                    }
                }
                "gamma" => {
                    c.gamma = match value {
                        ParamValue::Str(s) if s == "scale" => Gamma::Scale,
                        ParamValue::Str(s) if s == "auto" => Gamma::Auto,
                        other => Gamma::Value(as_f64(name, other)?),
                    }
                }
                "tol" => c.tol = as_f64(name, value)?,
                "max_iter" => c.max_iter = as_usize(name, value)?,
                _ => return Err(unknown(kind, name)),
            },
            EstimatorConfig::Mlp(c) => match name {
                "hidden_layer_sizes" => {
                    c.hidden_layer_sizes = match value {
                        ParamValue::IntList(sizes) => sizes.clone(),
                        ParamValue::Int(_) => vec![as_usize(name, value)?],
                        _ => return Err(mistyped(name, value)),
                    }
                }
                "alpha" => c.alpha = as_f64(name, value)?,
                "learning_rate" => {
                    c.learning_rate = match as_str(name, value)? {
                        "constant" => LearningRate::Constant,
                        "adaptive" => LearningRate::Adaptive,
                        _ => return Err(mistyped(name, value)),
                    }
                }
                "learning_rate_init" => c.learning_rate_init = as_f64(name, value)?,
                "solver" => {
                    c.solver = match as_str(name, value)? {
                        "adam" => Solver::Adam,
                        "sgd" => Solver::Sgd,
                        _ => return Err(mistyped(name, value)),
                    }
                }
                "momentum" => c.momentum = as_f64(name, value)?,
                "batch_size" => c.batch_size = as_usize(name, value)?,
                "max_iter" => c.max_iter = as_usize(name, value)?,
                "tol" => c.tol = as_f64(name, value)?,
                "random_state" => c.seed = as_u64(name, value)?,
                _ => return Err(unknown(kind, name)),
            },
        }
        Ok(())
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Fit on flat row-major data.
    ///
    /// # Errors
    ///
    /// [`QsarError::InvalidInput`] when the target kind does not match the
    /// estimator's task, plus any error from the underlying fit.
    pub fn fit(&self, data: &[f64], n_features: usize, targets: Targets<'_>) -> Result<FittedModel> {
        validate_data(data, n_features)?;
        let expected = self.kind.task();
        let got = if targets.is_classification() {
            TaskKind::Classification
        } else {
            TaskKind::Regression
        };
        if expected != got {
            return Err(QsarError::InvalidInput(format!(
                "{} expects {expected} targets, got {got}",
                self.kind
            )));
        }

        let model = match (&self.config, targets) {
            (EstimatorConfig::Forest(c), t) => FittedModel::Forest(RandomForest::fit(data, n_features, t, c)?),
            (EstimatorConfig::Gbdt(c), t) => FittedModel::Gbdt(GradientBoosting::fit(data, n_features, t, c)?),
            (EstimatorConfig::Mlp(c), t) => FittedModel::Mlp(Mlp::fit(data, n_features, t, c)?),
            (EstimatorConfig::Linear(c), Targets::Continuous(y)) => {
                FittedModel::Linear(LinearModel::fit(data, n_features, y, c)?)
            }
            (EstimatorConfig::Svm(c), Targets::Continuous(y)) => FittedModel::Svr(Svr::fit(data, n_features, y, c)?),
            (EstimatorConfig::Logistic(c), Targets::Classes { labels, n_classes }) => {
                FittedModel::Logistic(LogisticRegression::fit(data, n_features, labels, n_classes, c)?)
            }
            (EstimatorConfig::Svm(c), Targets::Classes { labels, n_classes }) => {
                FittedModel::Svc(Svc::fit(data, n_features, labels, n_classes, c)?)
            }
            (config, _) => {
                return Err(QsarError::InvalidInput(format!(
                    "configuration {config:?} cannot fit these targets"
                )))
            }
        };
        Ok(model)
    }
}

// ---------------------------------------------------------------------------
// FittedModel
// ---------------------------------------------------------------------------

/// A fitted estimator of any registered kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "model", rename_all = "snake_case")]
pub enum FittedModel {
    Forest(RandomForest),
    Gbdt(GradientBoosting),
    Linear(LinearModel),
    Logistic(LogisticRegression),
    Svr(Svr),
    Svc(Svc),
    Mlp(Mlp),
}

impl FittedModel {
    /// Prediction for one row; class models return the class index.
    pub fn predict(&self, sample: &[f64]) -> f64 {
        match self {
            FittedModel::Forest(m) => m.predict(sample),
            FittedModel::Gbdt(m) => m.predict(sample),
            FittedModel::Linear(m) => m.predict(sample),
            FittedModel::Logistic(m) => m.predict(sample),
            FittedModel::Svr(m) => m.predict(sample),
            FittedModel::Svc(m) => m.predict(sample),
            FittedModel::Mlp(m) => m.predict(sample),
        }
    }

    pub fn predict_batch(&self, data: &[f64], n_features: usize) -> Result<Vec<f64>> {
        validate_data(data, n_features)?;
        Ok(data.chunks_exact(n_features).map(|row| self.predict(row)).collect())
    }

    pub fn is_classifier(&self) -> bool {
        match self {
            FittedModel::Forest(m) => m.n_classes() > 0,
            FittedModel::Gbdt(m) => m.n_classes() > 0,
            FittedModel::Logistic(_) | FittedModel::Svc(_) => true,
            FittedModel::Linear(_) | FittedModel::Svr(_) => false,
            FittedModel::Mlp(m) => m.n_classes() > 0,
        }
    }

    pub fn has_proba(&self) -> bool {
        self.is_classifier() && !matches!(self, FittedModel::Svc(_))
    }

    /// Class probabilities for one row.
    ///
    /// # Errors
    ///
    /// [`QsarError::Unsupported`] for regressors and for SVC.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>> {
        if !self.has_proba() {
            return Err(QsarError::Unsupported("model does not provide class probabilities".into()));
        }
        Ok(match self {
            FittedModel::Forest(m) => m.predict_proba(sample),
            FittedModel::Gbdt(m) => m.predict_proba(sample),
            FittedModel::Logistic(m) => m.predict_proba(sample),
            FittedModel::Mlp(m) => m.predict_proba(sample),
            _ => return Err(QsarError::Unsupported("model does not provide class probabilities".into())),
        })
    }

    /// Per-feature importance: native impurity importances for tree models,
    /// absolute coefficients for linear models, `None` otherwise.
    pub fn importances(&self) -> Option<Vec<f64>> {
        match self {
            FittedModel::Forest(m) => Some(m.feature_importance()),
            FittedModel::Gbdt(m) => Some(m.feature_importance()),
            FittedModel::Linear(m) => Some(m.coef().iter().map(|w| w.abs()).collect()),
            FittedModel::Logistic(m) => Some(m.abs_coef()),
            FittedModel::Svr(m) => m.coef().map(|w| w.iter().map(|v| v.abs()).collect()),
            FittedModel::Svc(m) => m.abs_coef(),
            FittedModel::Mlp(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regression_data() -> (Vec<f64>, Vec<f64>) {
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let a = i as f64 / 10.0;
            let b = ((i * 7) % 11) as f64 / 5.0;
            data.extend_from_slice(&[a, b]);
            y.push(3.0 * a - b + 0.5);
        }
        (data, y)
    }

    fn classification_data() -> (Vec<f64>, Vec<usize>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let class = i % 2;
            let offset = if class == 1 { 3.0 } else { -3.0 };
            data.extend_from_slice(&[offset + (i % 5) as f64 * 0.1, (i % 3) as f64 * 0.1]);
            labels.push(class);
        }
        (data, labels)
    }

    #[test]
    fn params_override_defaults() {
        let mut params = HyperParams::new();
        params.insert("n_estimators".into(), ParamValue::Int(7));
        params.insert("max_depth".into(), ParamValue::Null);
        let est = Estimator::from_params(ModelKind::RandomForestRegressor, &params).unwrap();
        match est.config() {
            EstimatorConfig::Forest(c) => {
                assert_eq!(c.n_estimators, 7);
                assert_eq!(c.max_depth, None);
            }
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn bad_params_are_config_errors() {
        let mut params = HyperParams::new();
        params.insert("alpha".into(), ParamValue::Float(0.1));
        assert!(matches!(
            Estimator::from_params(ModelKind::LinearRegression, &params),
            Err(QsarError::Config(_))
        ));
        let mut params = HyperParams::new();
        params.insert("kernel".into(), ParamValue::Str("poly".into()));
        assert!(matches!(
            Estimator::from_params(ModelKind::Svc, &params),
            Err(QsarError::Config(_))
        ));
        let mut params = HyperParams::new();
        params.insert("epsilon".into(), ParamValue::Float(0.2));
        assert!(Estimator::from_params(ModelKind::Svc, &params).is_err());
        assert!(Estimator::from_params(ModelKind::Svr, &params).is_ok());
    }

    #[test]
    fn every_regressor_fits() {
        let (data, y) = regression_data();
        for kind in ModelKind::available(TaskKind::Regression) {
            let mut est = Estimator::default_for(kind);
            if let EstimatorConfig::Forest(c) = &mut est.config {
                c.n_estimators = 10;
            }
            let model = est.fit(&data, 2, Targets::Continuous(&y)).unwrap();
            assert!(!model.is_classifier(), "{kind}");
            assert!(model.predict(&[1.0, 1.0]).is_finite(), "{kind}");
            assert!(matches!(model.predict_proba(&[1.0, 1.0]), Err(QsarError::Unsupported(_))));
        }
    }

    #[test]
    fn every_classifier_fits() {
        let (data, labels) = classification_data();
        let targets = Targets::Classes {
            labels: &labels,
            n_classes: 2,
        };
        for kind in ModelKind::available(TaskKind::Classification) {
            let model = Estimator::default_for(kind).fit(&data, 2, targets).unwrap();
            assert!(model.is_classifier(), "{kind}");
            assert_eq!(model.predict(&[3.2, 0.1]), 1.0, "{kind}");
            assert_eq!(model.predict(&[-3.2, 0.1]), 0.0, "{kind}");
            if kind == ModelKind::Svc {
                assert!(matches!(model.predict_proba(&[3.0, 0.0]), Err(QsarError::Unsupported(_))));
            } else {
                let p = model.predict_proba(&[3.0, 0.0]).unwrap();
                assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9, "{kind}");
            }
        }
    }

    #[test]
    fn task_mismatch_rejected() {
        let (data, y) = regression_data();
        let est = Estimator::default_for(ModelKind::Svc);
        assert!(matches!(
            est.fit(&data, 2, Targets::Continuous(&y)),
            Err(QsarError::InvalidInput(_))
        ));
    }

    #[test]
    fn importance_sources() {
        let (data, y) = regression_data();
        let ridge = Estimator::default_for(ModelKind::Ridge)
            .fit(&data, 2, Targets::Continuous(&y))
            .unwrap();
        let imp = ridge.importances().unwrap();
        assert!(imp[0] > 0.0 && imp.iter().all(|v| *v >= 0.0));

        let svr = Estimator::default_for(ModelKind::Svr)
            .fit(&data, 2, Targets::Continuous(&y))
            .unwrap();
        assert!(svr.importances().is_none());
    }
}
