//! The modeling engine: an untrained [`QsarModel`] fixed to one registered
//! estimator, and the [`TrainedModel`] that training produces.
//!
//! Training runs optional feature selection, optional hyper-parameter
//! search, cross-validation of the final configuration and a fit on the
//! full training data. Inference re-applies the stored scaler and selector,
//! so callers always pass the original, unreduced columns.

use std::path::Path;

use chrono::Utc;
use qsarkit_core::{QsarError, Result, Summarizable};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cross_validation::{cross_val_score, folds_for, Scoring};
use crate::data::{FeatureMatrix, LabelEncoder, OwnedTargets};
use crate::estimator::{Estimator, FittedModel};
use crate::feature_selection::{FeatureSelector, SelectionConfig};
use crate::metrics::{
    roc_auc, roc_auc_ovr, ClassificationMetrics, ClassificationReport, ConfusionMatrix, Evaluation,
    RegressionMetrics,
};
use crate::registry::{HyperParams, ModelFamily, ModelKind, TaskKind};
use crate::scaler::StandardScaler;
use crate::search::{search, SearchConfig, SearchMethod};
use crate::split::{stratified_split, train_test_split, SplitConfig};

// ---------------------------------------------------------------------------
// Options and records
// ---------------------------------------------------------------------------

/// Training pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    /// `None` skips feature selection.
    pub feature_selection: Option<SelectionConfig>,
    /// `None` skips hyper-parameter search and trains with defaults.
    pub tuning: Option<SearchConfig>,
    /// Cross-validation folds, for both search and the final score.
    pub cv: usize,
    /// Search worker threads; `None` uses every core.
    pub n_jobs: Option<usize>,
    /// Seeds the final cross-validation folds.
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            feature_selection: Some(SelectionConfig::default()),
            tuning: Some(SearchConfig::default()),
            cv: 5,
            n_jobs: None,
            seed: 42,
        }
    }
}

impl TrainOptions {
    /// No selection and no search: fit the defaults and cross-validate them.
    pub fn minimal() -> Self {
        Self {
            feature_selection: None,
            tuning: None,
            ..Self::default()
        }
    }
}

/// Search outcome kept in the training history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningRecord {
    pub method: SearchMethod,
    pub best_params: HyperParams,
    pub best_score: f64,
    pub n_candidates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// RFC 3339 UTC timestamp.
    pub training_date: String,
    pub cv_scores: Vec<f64>,
    pub feature_names: Vec<String>,
    pub tuning: Option<TuningRecord>,
}

/// What [`QsarModel::train`] reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub cv_scores: Vec<f64>,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub best_params: HyperParams,
    pub feature_names: Vec<String>,
}

impl Summarizable for TrainingSummary {
    fn summary(&self) -> String {
        format!(
            "CV {:.4} ± {:.4} over {} folds, {} features",
            self.cv_mean,
            self.cv_std,
            self.cv_scores.len(),
            self.feature_names.len()
        )
    }
}

/// Hold-out split produced by [`QsarModel::prepare_data`].
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: FeatureMatrix,
    pub test: FeatureMatrix,
    /// `train` standardised with the scaler fitted on it.
    pub train_scaled: Vec<f64>,
    /// `test` standardised with the same scaler.
    pub test_scaled: Vec<f64>,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
}

fn not_trained() -> QsarError {
    QsarError::NotTrained("call train() before using the model".into())
}

fn check_rows(x: &FeatureMatrix, y: &[f64]) -> Result<()> {
    if x.n_rows() != y.len() {
        return Err(QsarError::InvalidInput(format!(
            "{} rows but {} targets",
            x.n_rows(),
            y.len()
        )));
    }
    Ok(())
}

/// Encode targets for `task`; classification labels go through a fitted
/// [`LabelEncoder`].
fn encode_targets(task: TaskKind, y: &[f64]) -> Result<(OwnedTargets, Option<LabelEncoder>)> {
    match task {
        TaskKind::Regression => Ok((OwnedTargets::Continuous(y.to_vec()), None)),
        TaskKind::Classification => {
            let encoder = LabelEncoder::fit(y)?;
            let labels = encoder.encode(y)?;
            let targets = OwnedTargets::Classes {
                labels,
                n_classes: encoder.n_classes(),
            };
            Ok((targets, Some(encoder)))
        }
    }
}

// ---------------------------------------------------------------------------
// QsarModel
// ---------------------------------------------------------------------------

/// An untrained model: family and task are fixed at construction.
#[derive(Debug, Clone)]
pub struct QsarModel {
    kind: ModelKind,
    scaler: Option<StandardScaler>,
    feature_names: Vec<String>,
}

impl QsarModel {
    /// # Errors
    ///
    /// [`QsarError::Config`] if `family` is not registered for `task`.
    pub fn new(family: ModelFamily, task: TaskKind) -> Result<Self> {
        Ok(Self {
            kind: ModelKind::resolve(family, task)?,
            scaler: None,
            feature_names: Vec::new(),
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn family(&self) -> ModelFamily {
        self.kind.family()
    }

    pub fn task(&self) -> TaskKind {
        self.kind.task()
    }

    /// Column names recorded by [`prepare_data`](Self::prepare_data).
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    /// A fresh estimator of the configured kind; empty `params` gives the
    /// defaults.
    pub fn create_model(&self, params: &HyperParams) -> Result<Estimator> {
        Estimator::from_params(self.kind, params)
    }

    /// Split into train and test rows (stratified for classification), fit
    /// the scaler on the training rows only and keep it for training and
    /// inference.
    pub fn prepare_data(&mut self, x: &FeatureMatrix, y: &[f64], split: &SplitConfig) -> Result<PreparedData> {
        check_rows(x, y)?;
        let (train_idx, test_idx) = match self.task() {
            TaskKind::Regression => train_test_split(x.n_rows(), split)?,
            TaskKind::Classification => {
                let encoder = LabelEncoder::fit(y)?;
                stratified_split(&encoder.encode(y)?, split)?
            }
        };
        let train = x.select_rows(&train_idx)?;
        let test = x.select_rows(&test_idx)?;
        let (scaler, train_scaled) = StandardScaler::fit_transform(train.data(), train.n_cols())?;
        let test_scaled = scaler.transform(test.data())?;
        info!(
            train = train.n_rows(),
            test = test.n_rows(),
            features = x.n_cols(),
            "prepared data"
        );

        self.feature_names = x.names().to_vec();
        self.scaler = Some(scaler);
        Ok(PreparedData {
            y_train: train_idx.iter().map(|&i| y[i]).collect(),
            y_test: test_idx.iter().map(|&i| y[i]).collect(),
            train,
            test,
            train_scaled,
            test_scaled,
        })
    }

    /// Run the training pipeline and hand back the fitted model.
    ///
    /// Reuses the scaler from [`prepare_data`](Self::prepare_data) when one
    /// exists, otherwise fits one on `x`.
    ///
    /// # Errors
    ///
    /// Fails on mismatched shapes, columns that differ from the prepared
    /// ones, an RFE request on a family without importances, or any fit
    /// failure during cross-validation or the final fit.
    pub fn train(self, x: &FeatureMatrix, y: &[f64], options: &TrainOptions) -> Result<(TrainedModel, TrainingSummary)> {
        check_rows(x, y)?;
        let kind = self.kind;
        let (owned_targets, labels) = encode_targets(kind.task(), y)?;
        let targets = owned_targets.view();

        let scaler = match self.scaler {
            Some(scaler) => {
                if self.feature_names != x.names() {
                    return Err(QsarError::InvalidInput(
                        "training columns differ from the prepared data".into(),
                    ));
                }
                scaler
            }
            None => StandardScaler::fit(x.data(), x.n_cols())?,
        };
        let scaled = scaler.transform(x.data())?;

        let (selector, feature_names, data) = match &options.feature_selection {
            Some(config) => {
                let selector = FeatureSelector::fit(config, &Estimator::default_for(kind), &scaled, x.n_cols(), targets)?;
                let names = selector.select_names(x.names());
                let reduced = selector.transform(&scaled)?;
                info!(%selector, kept = names.len(), of = x.n_cols(), "feature selection done");
                (Some(selector), names, reduced)
            }
            None => (None, x.names().to_vec(), scaled),
        };
        let n_features = feature_names.len();

        let tuning = match &options.tuning {
            Some(config) => {
                let result = search(kind, &data, n_features, targets, options.cv, options.n_jobs, config)?;
                info!(best_params = ?result.best_params, best_score = result.best_score, "hyper-parameter search done");
                Some(TuningRecord {
                    method: config.method,
                    best_params: result.best_params,
                    best_score: result.best_score,
                    n_candidates: result.candidates.len(),
                })
            }
            None => None,
        };
        let best_params = tuning.as_ref().map(|t| t.best_params.clone()).unwrap_or_default();

        let estimator = Estimator::from_params(kind, &best_params)?;
        let folds = folds_for(targets, options.cv, options.seed)?;
        let cv = cross_val_score(&estimator, &data, n_features, targets, &folds, Scoring::for_task(kind.task()))?;
        let model = estimator.fit(&data, n_features, targets)?;
        info!(%kind, cv_mean = cv.mean, cv_std = cv.std, "model trained");

        let history = TrainingHistory {
            training_date: Utc::now().to_rfc3339(),
            cv_scores: cv.scores.clone(),
            feature_names: feature_names.clone(),
            tuning,
        };
        let summary = TrainingSummary {
            cv_scores: cv.scores,
            cv_mean: cv.mean,
            cv_std: cv.std,
            best_params: best_params.clone(),
            feature_names: feature_names.clone(),
        };
        let trained = TrainedModel {
            kind,
            input_names: x.names().to_vec(),
            feature_names,
            scaler,
            selector,
            labels,
            model,
            best_params,
            history,
        };
        Ok((trained, summary))
    }

    // An untrained model can only report that it has not been trained.

    pub fn predict(&self, _x: &FeatureMatrix) -> Result<Vec<f64>> {
        Err(not_trained())
    }

    pub fn predict_proba(&self, _x: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        Err(not_trained())
    }

    pub fn evaluate(&self, _x: &FeatureMatrix, _y: &[f64]) -> Result<Evaluation> {
        Err(not_trained())
    }

    pub fn feature_importance(&self) -> Result<Vec<(String, f64)>> {
        Err(not_trained())
    }

    pub fn save(&self, _base: impl AsRef<Path>) -> Result<()> {
        Err(not_trained())
    }
}

/// Parse `model_type` and `task_type` and build an untrained model.
pub fn create_qsar_model(model_type: &str, task_type: &str) -> Result<QsarModel> {
    QsarModel::new(model_type.parse()?, task_type.parse()?)
}

/// Build and train a model in one call.
pub fn train_qsar_model(
    x: &FeatureMatrix,
    y: &[f64],
    model_type: &str,
    task_type: &str,
    options: &TrainOptions,
) -> Result<(TrainedModel, TrainingSummary)> {
    create_qsar_model(model_type, task_type)?.train(x, y, options)
}

// ---------------------------------------------------------------------------
// TrainedModel
// ---------------------------------------------------------------------------

/// A fitted model with everything needed to score raw descriptor columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub(crate) kind: ModelKind,
    /// Columns expected at inference, before selection.
    pub(crate) input_names: Vec<String>,
    /// Columns the estimator was fitted on.
    pub(crate) feature_names: Vec<String>,
    pub(crate) scaler: StandardScaler,
    pub(crate) selector: Option<FeatureSelector>,
    pub(crate) labels: Option<LabelEncoder>,
    pub(crate) model: FittedModel,
    pub(crate) best_params: HyperParams,
    pub(crate) history: TrainingHistory,
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn task(&self) -> TaskKind {
        self.kind.task()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn best_params(&self) -> &HyperParams {
        &self.best_params
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn selector(&self) -> Option<&FeatureSelector> {
        self.selector.as_ref()
    }

    pub fn estimator(&self) -> &FittedModel {
        &self.model
    }

    /// Align, scale and select columns into the estimator's input space.
    ///
    /// Absent columns and non-finite cells take the training column mean,
    /// so a row scores the same alone or in any batch.
    fn transform(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let aligned = x.align_filled(&self.input_names, self.scaler.mean())?;
        let scaled = self.scaler.transform(&aligned)?;
        match &self.selector {
            Some(selector) => selector.transform(&scaled),
            None => Ok(scaled),
        }
    }

    fn class_indices(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let data = self.transform(x)?;
        self.model.predict_batch(&data, self.feature_names.len())
    }

    /// Predicted values; classification returns the original label values.
    ///
    /// Columns are matched by name, so `x` may carry extra columns or a
    /// different order than the training matrix. Missing columns (such as a
    /// 3D group that failed to embed) are filled from the training means.
    ///
    /// # Errors
    ///
    /// [`QsarError::InvalidInput`] when `x` shares no column with the
    /// training matrix.
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let raw = self.class_indices(x)?;
        Ok(match &self.labels {
            Some(encoder) => raw.iter().map(|&p| encoder.decode(p as usize)).collect(),
            None => raw,
        })
    }

    /// Per-row class probabilities, columns ordered by ascending label.
    ///
    /// # Errors
    ///
    /// [`QsarError::Unsupported`] for regression tasks and for families
    /// without probability output.
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        if self.task() == TaskKind::Regression {
            return Err(QsarError::Unsupported("predict_proba is only available for classification".into()));
        }
        if !self.model.has_proba() {
            return Err(QsarError::Unsupported(format!("{} has no probability output", self.kind)));
        }
        let data = self.transform(x)?;
        data.chunks_exact(self.feature_names.len())
            .map(|row| self.model.predict_proba(row))
            .collect()
    }

    /// Held-out metrics. ROC AUC is `None` when probabilities are not
    /// available, a class is missing from `y`, or `y` holds labels unseen in
    /// training.
    ///
    /// Unseen labels are scored as misclassified and get their own report
    /// rows.
    pub fn evaluate(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Evaluation> {
        check_rows(x, y)?;
        let encoder = match &self.labels {
            None => return Ok(Evaluation::Regression(RegressionMetrics::compute(y, &self.predict(x)?)?)),
            Some(encoder) => encoder,
        };
        if let Some(bad) = y.iter().find(|v| !v.is_finite()) {
            return Err(QsarError::InvalidInput(format!("non-finite class label {bad}")));
        }

        // Report classes: training classes plus any label only seen here.
        let mut report_classes = encoder.classes().to_vec();
        report_classes.extend(y.iter().copied().filter(|&v| encoder.index_of(v).is_none()));
        report_classes.sort_by(f64::total_cmp);
        report_classes.dedup();
        let position = |value: f64| report_classes.binary_search_by(|c| c.total_cmp(&value)).unwrap_or(0);
        let has_unseen = report_classes.len() > encoder.n_classes();

        let actual: Vec<usize> = y.iter().map(|&v| position(v)).collect();
        let predicted: Vec<usize> = self
            .class_indices(x)?
            .iter()
            .map(|&p| position(encoder.decode(p as usize)))
            .collect();
        let cm = ConfusionMatrix::from_labels(&actual, &predicted, report_classes.len())?;

        let n_classes = encoder.n_classes();
        let roc_auc = if self.model.has_proba() && !has_unseen {
            let proba = self.predict_proba(x)?;
            let encoded = encoder.encode(y)?;
            if n_classes == 2 {
                let scores: Vec<f64> = proba.iter().map(|p| p.get(1).copied().unwrap_or(f64::NAN)).collect();
                let truth: Vec<bool> = encoded.iter().map(|&a| a == 1).collect();
                roc_auc(&scores, &truth)
            } else {
                roc_auc_ovr(&proba, &encoded, n_classes)
            }
        } else {
            None
        };

        Ok(Evaluation::Classification(ClassificationMetrics {
            accuracy: cm.accuracy(),
            roc_auc,
            report: ClassificationReport::from_confusion(&cm, &report_classes),
        }))
    }

    /// `(feature, importance)` pairs, most important first. Empty when the
    /// estimator exposes neither importances nor coefficients.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.model.importances() else {
            return Vec::new();
        };
        let mut pairs: Vec<(String, f64)> = self.feature_names.iter().cloned().zip(importances).collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        pairs
    }

    /// Summary of the recorded cross-validation.
    pub fn summary(&self) -> TrainingSummary {
        let n = self.history.cv_scores.len().max(1) as f64;
        let mean = self.history.cv_scores.iter().sum::<f64>() / n;
        let std = (self.history.cv_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
        TrainingSummary {
            cv_scores: self.history.cv_scores.clone(),
            cv_mean: mean,
            cv_std: std,
            best_params: self.best_params.clone(),
            feature_names: self.feature_names.clone(),
        }
    }
}
