//! Grid and randomized hyper-parameter search over a model's registered
//! parameter space, scored by cross-validation.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cross_validation::{cross_val_score, folds_for, CvResult, Scoring};
use crate::data::{validate_data, Targets};
use crate::estimator::Estimator;
use crate::registry::{HyperParams, ModelKind, ParamSpace};
use crate::rng::LcgRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Grid,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub method: SearchMethod,
    /// Candidates drawn by randomized search.
    pub n_iter: usize,
    /// Seeds fold shuffling and candidate sampling.
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            method: SearchMethod::Grid,
            n_iter: 100,
            seed: 42,
        }
    }
}

impl SearchConfig {
    pub fn grid() -> Self {
        Self::default()
    }

    pub fn random(n_iter: usize) -> Self {
        Self {
            method: SearchMethod::Random,
            n_iter,
            ..Self::default()
        }
    }
}

/// Outcome for one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: HyperParams,
    /// `None` when fitting failed on some fold.
    pub cv: Option<CvResult>,
}

impl CandidateResult {
    pub fn mean_score(&self) -> f64 {
        self.cv.as_ref().map_or(f64::NAN, |cv| cv.mean)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub best_params: HyperParams,
    pub best_score: f64,
    pub candidates: Vec<CandidateResult>,
}

/// Combinations to evaluate: the full grid, or up to `n_iter` distinct
/// draws from the distribution space.
pub fn candidates(kind: ModelKind, config: &SearchConfig) -> Vec<HyperParams> {
    match config.method {
        SearchMethod::Grid => kind.param_grid().candidates(),
        SearchMethod::Random => sample_space(&kind.param_distributions(), config.n_iter, config.seed),
    }
}

fn sample_space(space: &ParamSpace, n_iter: usize, seed: u64) -> Vec<HyperParams> {
    let total = space.len();
    if total <= n_iter {
        return space.candidates();
    }
    LcgRng::new(seed)
        .sample_without_replacement(total, n_iter)
        .into_iter()
        .filter_map(|i| space.get(i))
        .collect()
}

/// Evaluate every candidate of `kind`'s parameter space with `cv`-fold
/// cross-validation and keep the best mean score. `n_jobs` caps the worker
/// threads; `None` uses every core.
///
/// # Errors
///
/// Fails on invalid data or fold count, or when every candidate fails.
pub fn search(
    kind: ModelKind,
    data: &[f64],
    n_features: usize,
    targets: Targets<'_>,
    cv: usize,
    n_jobs: Option<usize>,
    config: &SearchConfig,
) -> Result<SearchResult> {
    let n_samples = validate_data(data, n_features)?;
    targets.check(n_samples)?;
    let folds = folds_for(targets, cv, config.seed)?;
    let scoring = Scoring::for_task(kind.task());
    let combos = candidates(kind, config);
    debug!(%kind, candidates = combos.len(), folds = cv, "starting hyper-parameter search");

    let evaluate = |params: &HyperParams| -> Result<CandidateResult> {
        let estimator = Estimator::from_params(kind, params)?;
        let cv = match cross_val_score(&estimator, data, n_features, targets, &folds, scoring) {
            Ok(cv) => Some(cv),
            Err(e) => {
                debug!(?params, error = %e, "candidate failed");
                None
            }
        };
        Ok(CandidateResult {
            params: params.clone(),
            cv,
        })
    };

    let results = evaluate_all(&combos, n_jobs, evaluate)?;
    pick_best(results)
}

#[cfg(feature = "parallel")]
fn evaluate_all<F>(combos: &[HyperParams], n_jobs: Option<usize>, evaluate: F) -> Result<Vec<CandidateResult>>
where
    F: Fn(&HyperParams) -> Result<CandidateResult> + Send + Sync,
{
    use rayon::prelude::*;
    let run = || combos.par_iter().map(&evaluate).collect::<Result<Vec<_>>>();
    match n_jobs {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n.max(1))
            .build()
            .map_err(|e| QsarError::Other(format!("failed to build search pool: {e}")))?
            .install(run),
        None => run(),
    }
}

#[cfg(not(feature = "parallel"))]
fn evaluate_all<F>(combos: &[HyperParams], _n_jobs: Option<usize>, evaluate: F) -> Result<Vec<CandidateResult>>
where
    F: Fn(&HyperParams) -> Result<CandidateResult>,
{
    combos.iter().map(evaluate).collect()
}

/// Highest finite mean wins; ties keep the earlier candidate.
fn pick_best(candidates: Vec<CandidateResult>) -> Result<SearchResult> {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in candidates.iter().enumerate() {
        let score = c.mean_score();
        if !score.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((i, score));
        }
    }
    let (idx, best_score) = best.ok_or_else(|| QsarError::Other("every search candidate failed".into()))?;
    Ok(SearchResult {
        best_params: candidates[idx].params.clone(),
        best_score,
        candidates,
    })
}
