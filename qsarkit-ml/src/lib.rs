//! QSAR/QSPR modeling engine.
//!
//! - **Data**: [`FeatureMatrix`] built from descriptor tables, mean
//!   imputation, [`StandardScaler`], plain and stratified splits
//! - **Estimators**: random forest, gradient boosting, linear / ridge /
//!   lasso / elastic net, logistic regression, SVR / SVC, MLP
//! - **Model selection**: k-best and RFE feature selection, k-fold cross
//!   validation, grid and randomized hyper-parameter search
//! - **Engine**: [`QsarModel`] → [`TrainedModel`] training pipeline,
//!   evaluation metrics, feature importance, save / load
//!
//! # Example
//!
//! ```
//! use qsarkit_ml::{create_qsar_model, FeatureMatrix, TrainOptions};
//!
//! let names = vec!["LogP".to_string(), "TPSA".to_string()];
//! let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 * 0.3, (i * 7 % 11) as f64]).collect();
//! let y: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] - 0.1 * r[1]).collect();
//! let x = FeatureMatrix::from_rows(names, &rows).unwrap();
//!
//! let model = create_qsar_model("ridge", "regression").unwrap();
//! let (trained, summary) = model.train(&x, &y, &TrainOptions { cv: 4, ..TrainOptions::minimal() }).unwrap();
//! assert_eq!(summary.cv_scores.len(), 4);
//! assert_eq!(trained.predict(&x).unwrap().len(), 20);
//! ```

pub mod cross_validation;
pub mod data;
pub mod engine;
pub mod estimator;
pub mod feature_selection;
pub mod forest;
pub mod gbdt;
mod linalg;
pub mod linear;
pub mod metrics;
pub mod mlp;
pub mod persist;
pub mod registry;
mod rng;
pub mod scaler;
pub mod search;
pub mod split;
pub mod svm;
pub mod tree;

pub use cross_validation::{cross_val_score, cross_validate, kfold, stratified_kfold, CvResult, Folds, Scoring};
pub use data::{FeatureMatrix, LabelEncoder, Targets};
pub use engine::{
    create_qsar_model, train_qsar_model, PreparedData, QsarModel, TrainOptions, TrainedModel, TrainingHistory,
    TrainingSummary, TuningRecord,
};
pub use estimator::{Estimator, EstimatorConfig, FittedModel};
pub use feature_selection::{f_classif, f_regression, select_k_best, FeatureSelector, SelectionConfig, SelectionMethod};
pub use forest::{ForestConfig, RandomForest};
pub use gbdt::{GbdtConfig, GradientBoosting};
pub use linear::{LinearConfig, LinearModel, LogisticConfig, LogisticRegression, Penalty};
pub use metrics::{
    ClassScores, ClassificationMetrics, ClassificationReport, ConfusionMatrix, Evaluation, RegressionMetrics,
};
pub use mlp::{LearningRate, Mlp, MlpConfig, Solver};
pub use persist::{artifact_paths, load_metadata, ModelMetadata};
pub use registry::{HyperParams, ModelFamily, ModelKind, ParamSpace, ParamValue, TaskKind};
pub use scaler::StandardScaler;
pub use search::{search, CandidateResult, SearchConfig, SearchMethod, SearchResult};
pub use split::{stratified_split, train_test_split, SplitConfig};
pub use svm::{Gamma, Kernel, Svc, SvmConfig, Svr};
pub use tree::{DecisionTree, TreeConfig, TreeNode};

#[cfg(test)]
mod tests {
    use super::*;
    use qsarkit_chem::calculate_descriptors;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn descriptors_to_trained_model() {
        init_tracing();
        let smiles = [
            "CCO", "CCCO", "CCCCO", "CCCCCO", "CC(C)O", "CC(=O)O", "CCC(=O)O", "c1ccccc1", "Cc1ccccc1",
            "CCc1ccccc1", "c1ccccc1O", "Oc1ccc(O)cc1", "CCN", "CCCN", "CC(=O)N", "c1ccncc1",
        ];
        let tables: Vec<_> = smiles.iter().map(|s| calculate_descriptors(s, false).unwrap()).collect();
        let x = FeatureMatrix::from_tables(&tables).unwrap();
        let y: Vec<f64> = x.column("MolWt").unwrap().iter().map(|w| w / 10.0).collect();

        let options = TrainOptions {
            feature_selection: Some(SelectionConfig::kbest(10)),
            tuning: None,
            cv: 4,
            ..TrainOptions::default()
        };
        let (trained, summary) = train_qsar_model(&x, &y, "random_forest", "regression", &options).unwrap();
        assert!(summary.feature_names.len() <= 10);
        assert_eq!(trained.predict(&x).unwrap().len(), smiles.len());
        assert!(!trained.feature_importance().is_empty());
    }
}
