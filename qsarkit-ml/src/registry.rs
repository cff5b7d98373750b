//! Model registry: the fixed set of valid family × task combinations and
//! their hyper-parameter search spaces.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use qsarkit_core::{Annotated, QsarError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Task and family
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Regression,
    Classification,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Regression => "regression",
            TaskKind::Classification => "classification",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = QsarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regression" => Ok(TaskKind::Regression),
            "classification" => Ok(TaskKind::Classification),
            other => Err(QsarError::Config(format!("unknown task type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    Linear,
    Ridge,
    Lasso,
    ElasticNet,
    Svr,
    Svc,
    Logistic,
    NeuralNetwork,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 10] = [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::Linear,
        ModelFamily::Ridge,
        ModelFamily::Lasso,
        ModelFamily::ElasticNet,
        ModelFamily::Svr,
        ModelFamily::Svc,
        ModelFamily::Logistic,
        ModelFamily::NeuralNetwork,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::Linear => "linear",
            ModelFamily::Ridge => "ridge",
            ModelFamily::Lasso => "lasso",
            ModelFamily::ElasticNet => "elastic_net",
            ModelFamily::Svr => "svr",
            ModelFamily::Svc => "svc",
            ModelFamily::Logistic => "logistic",
            ModelFamily::NeuralNetwork => "neural_network",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = QsarError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        ModelFamily::ALL
            .into_iter()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| QsarError::Config(format!("unknown model type: {key}")))
    }
}

// ---------------------------------------------------------------------------
// ModelKind
// ---------------------------------------------------------------------------

/// A registered estimator: one variant per valid family × task pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForestRegressor,
    GradientBoostingRegressor,
    LinearRegression,
    Ridge,
    Lasso,
    ElasticNet,
    Svr,
    MlpRegressor,
    RandomForestClassifier,
    GradientBoostingClassifier,
    Svc,
    LogisticRegression,
    MlpClassifier,
}

impl ModelKind {
    /// Look up the estimator registered for `family` under `task`.
    ///
    /// # Errors
    ///
    /// [`QsarError::Config`] when the family is not registered for the task.
    pub fn resolve(family: ModelFamily, task: TaskKind) -> Result<Self> {
        use ModelFamily as F;
        use TaskKind::{Classification, Regression};
        let kind = match (family, task) {
            (F::RandomForest, Regression) => ModelKind::RandomForestRegressor,
            (F::GradientBoosting, Regression) => ModelKind::GradientBoostingRegressor,
            (F::Linear, Regression) => ModelKind::LinearRegression,
            (F::Ridge, Regression) => ModelKind::Ridge,
            (F::Lasso, Regression) => ModelKind::Lasso,
            (F::ElasticNet, Regression) => ModelKind::ElasticNet,
            (F::Svr, Regression) => ModelKind::Svr,
            (F::NeuralNetwork, Regression) => ModelKind::MlpRegressor,
            (F::RandomForest, Classification) => ModelKind::RandomForestClassifier,
            (F::GradientBoosting, Classification) => ModelKind::GradientBoostingClassifier,
            (F::Svc, Classification) => ModelKind::Svc,
            (F::Logistic, Classification) => ModelKind::LogisticRegression,
            (F::NeuralNetwork, Classification) => ModelKind::MlpClassifier,
            (family, task) => {
                return Err(QsarError::Config(format!(
                    "model type '{family}' is not available for {task}"
                )))
            }
        };
        Ok(kind)
    }

    /// Every registered estimator for `task`.
    pub fn available(task: TaskKind) -> Vec<ModelKind> {
        ModelFamily::ALL
            .into_iter()
            .filter_map(|f| ModelKind::resolve(f, task).ok())
            .collect()
    }

    pub fn family(self) -> ModelFamily {
        match self {
            ModelKind::RandomForestRegressor | ModelKind::RandomForestClassifier => ModelFamily::RandomForest,
            ModelKind::GradientBoostingRegressor | ModelKind::GradientBoostingClassifier => {
                ModelFamily::GradientBoosting
            }
            ModelKind::LinearRegression => ModelFamily::Linear,
            ModelKind::Ridge => ModelFamily::Ridge,
            ModelKind::Lasso => ModelFamily::Lasso,
            ModelKind::ElasticNet => ModelFamily::ElasticNet,
            ModelKind::Svr => ModelFamily::Svr,
            ModelKind::Svc => ModelFamily::Svc,
            ModelKind::LogisticRegression => ModelFamily::Logistic,
            ModelKind::MlpRegressor | ModelKind::MlpClassifier => ModelFamily::NeuralNetwork,
        }
    }

    pub fn task(self) -> TaskKind {
        match self {
            ModelKind::RandomForestRegressor
            | ModelKind::GradientBoostingRegressor
            | ModelKind::LinearRegression
            | ModelKind::Ridge
            | ModelKind::Lasso
            | ModelKind::ElasticNet
            | ModelKind::Svr
            | ModelKind::MlpRegressor => TaskKind::Regression,
            _ => TaskKind::Classification,
        }
    }

    /// Exhaustive search space.
    pub fn param_grid(self) -> ParamSpace {
        use ParamValue::{Float, Int, Null};
        match self.family() {
            ModelFamily::RandomForest => ParamSpace::new()
                .axis("n_estimators", ints(&[50, 100, 200]))
                .axis("max_depth", vec![Null, Int(10), Int(20), Int(30)])
                .axis("min_samples_split", ints(&[2, 5, 10]))
                .axis("min_samples_leaf", ints(&[1, 2, 4])),
            ModelFamily::GradientBoosting => ParamSpace::new()
                .axis("n_estimators", ints(&[50, 100, 200]))
                .axis("learning_rate", floats(&[0.01, 0.1, 0.2]))
                .axis("max_depth", ints(&[3, 5, 7]))
                .axis("subsample", floats(&[0.8, 0.9, 1.0])),
            ModelFamily::Linear => ParamSpace::new(),
            ModelFamily::Ridge | ModelFamily::Lasso | ModelFamily::ElasticNet | ModelFamily::Logistic => {
                ParamSpace::new().axis("alpha", floats(&[0.001, 0.01, 0.1, 1.0, 10.0]))
            }
            ModelFamily::Svr | ModelFamily::Svc => ParamSpace::new()
                .axis("C", floats(&[0.1, 1.0, 10.0, 100.0]))
                .axis(
                    "gamma",
                    vec![strs("scale"), strs("auto"), Float(0.001), Float(0.01), Float(0.1)],
                )
                .axis("kernel", vec![strs("rbf"), strs("linear")]),
            ModelFamily::NeuralNetwork => ParamSpace::new()
                .axis(
                    "hidden_layer_sizes",
                    vec![
                        ParamValue::IntList(vec![50]),
                        ParamValue::IntList(vec![100]),
                        ParamValue::IntList(vec![50, 50]),
                        ParamValue::IntList(vec![100, 50]),
                    ],
                )
                .axis("alpha", floats(&[1e-4, 1e-3, 1e-2]))
                .axis("learning_rate", vec![strs("constant"), strs("adaptive")]),
        }
    }

    /// Space sampled by randomized search. Wider than the grid for the tree
    /// ensembles, identical otherwise.
    pub fn param_distributions(self) -> ParamSpace {
        use ParamValue::{Int, Null};
        match self.family() {
            ModelFamily::RandomForest => ParamSpace::new()
                .axis("n_estimators", ints(&[50, 100, 200, 300, 500]))
                .axis(
                    "max_depth",
                    vec![Null, Int(10), Int(20), Int(30), Int(40), Int(50)],
                )
                .axis("min_samples_split", ints(&[2, 5, 10, 15, 20]))
                .axis("min_samples_leaf", ints(&[1, 2, 4, 6, 8])),
            ModelFamily::GradientBoosting => ParamSpace::new()
                .axis("n_estimators", ints(&[50, 100, 200, 300, 500]))
                .axis("learning_rate", floats(&[0.01, 0.05, 0.1, 0.15, 0.2]))
                .axis("max_depth", ints(&[3, 5, 7, 9, 11]))
                .axis("subsample", floats(&[0.7, 0.8, 0.9, 1.0])),
            _ => self.param_grid(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Annotated for ModelKind {
    fn name(&self) -> &str {
        match self {
            ModelKind::RandomForestRegressor => "RandomForestRegressor",
            ModelKind::GradientBoostingRegressor => "GradientBoostingRegressor",
            ModelKind::LinearRegression => "LinearRegression",
            ModelKind::Ridge => "Ridge",
            ModelKind::Lasso => "Lasso",
            ModelKind::ElasticNet => "ElasticNet",
            ModelKind::Svr => "SVR",
            ModelKind::MlpRegressor => "MLPRegressor",
            ModelKind::RandomForestClassifier => "RandomForestClassifier",
            ModelKind::GradientBoostingClassifier => "GradientBoostingClassifier",
            ModelKind::Svc => "SVC",
            ModelKind::LogisticRegression => "LogisticRegression",
            ModelKind::MlpClassifier => "MLPClassifier",
        }
    }

    fn description(&self) -> Option<&str> {
        Some(match self.family() {
            ModelFamily::RandomForest => "bagged CART ensemble",
            ModelFamily::GradientBoosting => "gradient-boosted regression trees",
            ModelFamily::Linear => "ordinary least squares",
            ModelFamily::Ridge => "L2-penalised least squares",
            ModelFamily::Lasso => "L1-penalised least squares",
            ModelFamily::ElasticNet => "mixed L1/L2-penalised least squares",
            ModelFamily::Svr | ModelFamily::Svc => "kernel support vector machine",
            ModelFamily::Logistic => "L2-penalised logistic regression",
            ModelFamily::NeuralNetwork => "multi-layer perceptron",
        })
    }
}

// ---------------------------------------------------------------------------
// Hyper-parameters
// ---------------------------------------------------------------------------

/// A single hyper-parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<usize>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("None"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => write!(f, "'{s}'"),
            ParamValue::IntList(v) => {
                let parts: Vec<String> = v.iter().map(usize::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// Named hyper-parameter values, ordered by name.
pub type HyperParams = BTreeMap<String, ParamValue>;

fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Int(v)).collect()
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Float(v)).collect()
}

fn strs(value: &str) -> ParamValue {
    ParamValue::Str(value.to_string())
}

/// A Cartesian product of per-parameter value lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSpace {
    axes: Vec<(&'static str, Vec<ParamValue>)>,
}

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(mut self, name: &'static str, values: Vec<ParamValue>) -> Self {
        self.axes.push((name, values));
        self
    }

    pub fn axes(&self) -> &[(&'static str, Vec<ParamValue>)] {
        &self.axes
    }

    /// Number of combinations. An empty space has exactly one: the defaults.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Combination `index` in row-major order (last axis varies fastest).
    pub fn get(&self, index: usize) -> Option<HyperParams> {
        if index >= self.len() {
            return None;
        }
        let mut rest = index;
        let mut params = HyperParams::new();
        for (name, values) in self.axes.iter().rev() {
            params.insert((*name).to_string(), values[rest % values.len()].clone());
            rest /= values.len();
        }
        Some(params)
    }

    /// Every combination, in row-major order.
    pub fn candidates(&self) -> Vec<HyperParams> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_thirteen_pairs() {
        let regression = ModelKind::available(TaskKind::Regression);
        let classification = ModelKind::available(TaskKind::Classification);
        assert_eq!(regression.len(), 8);
        assert_eq!(classification.len(), 5);
        for kind in regression.iter().chain(&classification) {
            assert_eq!(ModelKind::resolve(kind.family(), kind.task()).unwrap(), *kind);
        }
    }

    #[test]
    fn linear_classification_is_config_error() {
        let err = ModelKind::resolve(ModelFamily::Linear, TaskKind::Classification).unwrap_err();
        assert!(matches!(err, QsarError::Config(_)));
        assert!(ModelKind::resolve(ModelFamily::Svc, TaskKind::Regression).is_err());
        assert!(ModelKind::resolve(ModelFamily::Logistic, TaskKind::Regression).is_err());
    }

    #[test]
    fn parse_names() {
        assert_eq!("elastic_net".parse::<ModelFamily>().unwrap(), ModelFamily::ElasticNet);
        assert_eq!("Classification".parse::<TaskKind>().unwrap(), TaskKind::Classification);
        assert!(matches!("xgboost".parse::<ModelFamily>(), Err(QsarError::Config(_))));
        for family in ModelFamily::ALL {
            assert_eq!(family.to_string().parse::<ModelFamily>().unwrap(), family);
        }
    }

    #[test]
    fn grid_sizes() {
        assert_eq!(ModelKind::RandomForestRegressor.param_grid().len(), 108);
        assert_eq!(ModelKind::RandomForestRegressor.param_distributions().len(), 750);
        assert_eq!(ModelKind::GradientBoostingClassifier.param_grid().len(), 81);
        assert_eq!(ModelKind::Ridge.param_grid().len(), 5);
        assert_eq!(ModelKind::Svc.param_grid().len(), 40);
        assert_eq!(ModelKind::MlpRegressor.param_distributions().len(), 24);
        let linear = ModelKind::LinearRegression.param_grid();
        assert_eq!(linear.candidates(), vec![HyperParams::new()]);
    }

    #[test]
    fn grid_enumeration_is_row_major() {
        let space = ParamSpace::new()
            .axis("a", ints(&[1, 2]))
            .axis("b", floats(&[0.5, 1.5, 2.5]));
        let all = space.candidates();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0]["a"], ParamValue::Int(1));
        assert_eq!(all[1]["b"], ParamValue::Float(1.5));
        assert_eq!(all[3]["a"], ParamValue::Int(2));
        assert_eq!(space.get(6), None);
    }

    #[test]
    fn param_values_round_trip_json() {
        let mut params = HyperParams::new();
        params.insert("max_depth".into(), ParamValue::Null);
        params.insert("n_estimators".into(), ParamValue::Int(100));
        params.insert("alpha".into(), ParamValue::Float(0.1));
        params.insert("kernel".into(), strs("rbf"));
        params.insert("hidden_layer_sizes".into(), ParamValue::IntList(vec![100, 50]));
        let json = serde_json::to_string(&params).unwrap();
        let back: HyperParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
