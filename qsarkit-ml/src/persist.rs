//! Saving and loading trained models.
//!
//! A model is stored as two JSON files sharing a base path:
//!
//! - `<base>.model.json`: the fitted estimator with its scaler, selector and
//!   label map
//! - `<base>_metadata.json`: family, task, feature names, best parameters,
//!   cross-validation scores, training history, readable renderings of the
//!   scaler and selector, and the SHA-256 of the model file
//!
//! Loading needs both halves and verifies the checksum.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use qsarkit_core::hash::sha256;
use qsarkit_core::{ContentAddressable, QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::LabelEncoder;
use crate::engine::{TrainedModel, TrainingHistory};
use crate::estimator::FittedModel;
use crate::feature_selection::FeatureSelector;
use crate::registry::{HyperParams, ModelFamily, ModelKind, TaskKind};
use crate::scaler::StandardScaler;

/// Paths of the model and metadata files for `base`.
pub fn artifact_paths(base: impl AsRef<Path>) -> (PathBuf, PathBuf) {
    let with_suffix = |suffix: &str| {
        let mut name = OsString::from(base.as_ref().as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    };
    (with_suffix(".model.json"), with_suffix("_metadata.json"))
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    kind: ModelKind,
    input_names: Vec<String>,
    feature_names: Vec<String>,
    scaler: StandardScaler,
    selector: Option<FeatureSelector>,
    labels: Option<LabelEncoder>,
    model: FittedModel,
}

/// The metadata half of a saved model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: ModelFamily,
    pub task_type: TaskKind,
    pub feature_names: Vec<String>,
    pub best_params: HyperParams,
    pub cv_scores: Vec<f64>,
    pub training_history: TrainingHistory,
    pub scaler: String,
    pub selector: Option<String>,
    pub model_sha256: String,
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| QsarError::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))))
}

impl TrainedModel {
    fn artifact_bytes(&self) -> Result<Vec<u8>> {
        let artifact = ModelArtifact {
            kind: self.kind,
            input_names: self.input_names.clone(),
            feature_names: self.feature_names.clone(),
            scaler: self.scaler.clone(),
            selector: self.selector.clone(),
            labels: self.labels.clone(),
            model: self.model.clone(),
        };
        Ok(serde_json::to_vec_pretty(&artifact)?)
    }

    /// Write `<base>.model.json` and `<base>_metadata.json`, creating the
    /// parent directory if needed.
    pub fn save(&self, base: impl AsRef<Path>) -> Result<()> {
        let (model_path, meta_path) = artifact_paths(&base);
        if let Some(parent) = model_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let blob = self.artifact_bytes()?;
        let metadata = ModelMetadata {
            model_type: self.kind.family(),
            task_type: self.kind.task(),
            feature_names: self.feature_names.clone(),
            best_params: self.best_params.clone(),
            cv_scores: self.history.cv_scores.clone(),
            training_history: self.history.clone(),
            scaler: self.scaler.to_string(),
            selector: self.selector.as_ref().map(ToString::to_string),
            model_sha256: sha256(&blob),
        };
        fs::write(&model_path, &blob)?;
        fs::write(&meta_path, serde_json::to_vec_pretty(&metadata)?)?;
        info!(path = %model_path.display(), kind = %self.kind, "model saved");
        Ok(())
    }

    /// Rebuild a model saved with [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// [`QsarError::Io`] if either file is missing, [`QsarError::Config`] if
    /// the checksum does not match or the two halves disagree.
    pub fn load(base: impl AsRef<Path>) -> Result<Self> {
        let (model_path, meta_path) = artifact_paths(&base);
        let metadata: ModelMetadata = serde_json::from_slice(&read_file(&meta_path)?)?;
        let blob = read_file(&model_path)?;

        let digest = sha256(&blob);
        if digest != metadata.model_sha256 {
            return Err(QsarError::Config(format!(
                "checksum mismatch for {}: expected {}, got {digest}",
                model_path.display(),
                metadata.model_sha256
            )));
        }
        let artifact: ModelArtifact = serde_json::from_slice(&blob)?;
        if artifact.kind.family() != metadata.model_type || artifact.kind.task() != metadata.task_type {
            return Err(QsarError::Config(format!(
                "model file holds {} but metadata says {} {}",
                artifact.kind, metadata.model_type, metadata.task_type
            )));
        }
        if artifact.feature_names != metadata.feature_names {
            return Err(QsarError::Config("feature names differ between model and metadata".into()));
        }

        info!(path = %model_path.display(), kind = %artifact.kind, "model loaded");
        Ok(TrainedModel {
            kind: artifact.kind,
            input_names: artifact.input_names,
            feature_names: artifact.feature_names,
            scaler: artifact.scaler,
            selector: artifact.selector,
            labels: artifact.labels,
            model: artifact.model,
            best_params: metadata.best_params,
            history: metadata.training_history,
        })
    }
}

impl ContentAddressable for TrainedModel {
    /// SHA-256 of the serialized model file contents.
    fn content_hash(&self) -> String {
        self.artifact_bytes().map(|b| sha256(&b)).unwrap_or_default()
    }
}

/// Read just the metadata half of a saved model.
pub fn load_metadata(base: impl AsRef<Path>) -> Result<ModelMetadata> {
    let (_, meta_path) = artifact_paths(base);
    Ok(serde_json::from_slice(&read_file(&meta_path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureMatrix;
    use crate::engine::{train_qsar_model, TrainOptions};
    use crate::feature_selection::SelectionConfig;

    fn dataset(classes: bool) -> (FeatureMatrix, Vec<f64>) {
        let names: Vec<String> = ["MolWt", "LogP", "TPSA", "fr_benzene"].iter().map(|s| s.to_string()).collect();
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..45 {
            let row = vec![
                100.0 + (i * 17 % 23) as f64 * 9.0,
                -1.0 + (i * 5 % 11) as f64 * 0.5,
                20.0 + (i * 7 % 13) as f64 * 4.0,
                (i % 3) as f64,
            ];
            let score = 0.01 * row[0] + row[1] - 0.02 * row[2];
            y.push(if classes { f64::from(u8::from(score > 1.5)) } else { score });
            rows.push(row);
        }
        (FeatureMatrix::from_rows(names, &rows).unwrap(), y)
    }

    fn options() -> TrainOptions {
        TrainOptions {
            feature_selection: Some(SelectionConfig::kbest(3)),
            tuning: None,
            cv: 3,
            ..TrainOptions::default()
        }
    }

    #[test]
    fn round_trip_reproduces_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = dataset(false);
        for family in ["random_forest", "gradient_boosting", "ridge", "svr", "neural_network"] {
            let (trained, _) = train_qsar_model(&x, &y, family, "regression", &options()).unwrap();
            let base = dir.path().join("models").join(family);
            trained.save(&base).unwrap();
            let loaded = TrainedModel::load(&base).unwrap();
            assert_eq!(loaded.predict(&x).unwrap(), trained.predict(&x).unwrap(), "{family}");
            assert_eq!(loaded.feature_names(), trained.feature_names());
            assert_eq!(loaded.content_hash(), trained.content_hash());
        }
    }

    #[test]
    fn classifier_round_trip_keeps_labels() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = dataset(true);
        let (trained, _) = train_qsar_model(&x, &y, "logistic", "classification", &options()).unwrap();
        let base = dir.path().join("logistic");
        trained.save(&base).unwrap();
        let loaded = TrainedModel::load(&base).unwrap();
        assert_eq!(loaded, trained);
        assert_eq!(loaded.predict_proba(&x).unwrap(), trained.predict_proba(&x).unwrap());
    }

    #[test]
    fn metadata_contents() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = dataset(false);
        let (trained, summary) = train_qsar_model(&x, &y, "lasso", "regression", &options()).unwrap();
        let base = dir.path().join("lasso");
        trained.save(&base).unwrap();

        let (model_path, meta_path) = artifact_paths(&base);
        assert!(model_path.ends_with("lasso.model.json"));
        assert!(meta_path.ends_with("lasso_metadata.json"));

        let meta = load_metadata(&base).unwrap();
        assert_eq!(meta.model_type, ModelFamily::Lasso);
        assert_eq!(meta.task_type, TaskKind::Regression);
        assert_eq!(meta.feature_names, summary.feature_names);
        assert_eq!(meta.cv_scores, summary.cv_scores);
        assert_eq!(meta.scaler, "StandardScaler(n_features=4)");
        assert_eq!(meta.selector.as_deref(), Some("SelectKBest(k=3)"));
        assert_eq!(meta.model_sha256, trained.content_hash());
    }

    #[test]
    fn missing_metadata_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = dataset(false);
        let (trained, _) = train_qsar_model(&x, &y, "ridge", "regression", &options()).unwrap();
        let base = dir.path().join("ridge");
        trained.save(&base).unwrap();
        fs::remove_file(artifact_paths(&base).1).unwrap();
        assert!(matches!(TrainedModel::load(&base), Err(QsarError::Io(_))));
        assert!(matches!(TrainedModel::load(dir.path().join("absent")), Err(QsarError::Io(_))));
    }

    #[test]
    fn tampered_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = dataset(false);
        let (trained, _) = train_qsar_model(&x, &y, "ridge", "regression", &options()).unwrap();
        let base = dir.path().join("ridge");
        trained.save(&base).unwrap();
        let model_path = artifact_paths(&base).0;
        let mut blob = fs::read_to_string(&model_path).unwrap();
        blob.push(' ');
        fs::write(&model_path, blob).unwrap();
        assert!(matches!(TrainedModel::load(&base), Err(QsarError::Config(_))));
    }
}
