//! Score-model ensemble: one random-forest regressor per target score
//! dimension, tuned by randomized hyperparameter search.
//!
//! Candidate configurations are evaluated in parallel with rayon; that
//! parallelism is internal to fitting and invisible to the rest of the
//! pipeline. Everything is seeded, so a fit is reproducible end to end.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::PipelineError;
use crate::ml::forest::{FeatureSubsample, ForestParams, RandomForestRegressor};
use crate::ml::metrics;
use crate::model::records::TARGETS;

/// Hyperparameter grid sampled by the randomized search.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub n_trees: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub max_features: Vec<FeatureSubsample>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        ParamGrid {
            n_trees: vec![100, 200, 300],
            max_depth: vec![None, Some(10), Some(20), Some(30)],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
            max_features: vec![
                FeatureSubsample::Sqrt,
                FeatureSubsample::Log2,
                FeatureSubsample::All,
            ],
        }
    }
}

impl ParamGrid {
    fn draw(&self, rng: &mut StdRng) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees[rng.gen_range(0..self.n_trees.len())],
            max_depth: self.max_depth[rng.gen_range(0..self.max_depth.len())],
            min_samples_split: self.min_samples_split
                [rng.gen_range(0..self.min_samples_split.len())],
            min_samples_leaf: self.min_samples_leaf[rng.gen_range(0..self.min_samples_leaf.len())],
            max_features: self.max_features[rng.gen_range(0..self.max_features.len())],
        }
    }
}

/// Search budget. Tests shrink this; the defaults mirror the production
/// training run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub n_iter: usize,
    pub cv_folds: usize,
    /// Folds used for the monitoring cross-validation in the report.
    pub report_cv_folds: usize,
    pub test_fraction: f64,
    pub seed: u64,
    pub grid: ParamGrid,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            n_iter: 20,
            cv_folds: 3,
            report_cv_folds: 5,
            test_fraction: 0.2,
            seed: 42,
            grid: ParamGrid::default(),
        }
    }
}

/// Held-out metrics and monitoring cross-validation for one target.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: String,
    pub params: ForestParams,
    pub mae: f64,
    pub rmse: f64,
    pub mse: f64,
    pub r2: f64,
    pub mape: f64,
    pub cv_r2_mean: f64,
    pub cv_r2_std: f64,
    /// Feature importances, descending.
    pub feature_importance: Vec<(String, f64)>,
}

/// Six fitted regressors keyed by target dimension name. Read-only at
/// inference time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreModelEnsemble {
    models: BTreeMap<String, RandomForestRegressor>,
}

impl ScoreModelEnsemble {
    /// Trains one tuned regressor per target. Rows whose six targets are
    /// all exactly zero are "unscored" and excluded up front.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[[f64; 6]],
        feature_names: &[String],
        cfg: &SearchConfig,
    ) -> Result<(Self, Vec<TargetReport>), PipelineError> {
        if x.len() != y.len() {
            return Err(PipelineError::Input(format!(
                "feature matrix has {} rows but targets have {}",
                x.len(),
                y.len()
            )));
        }

        let scored: Vec<usize> = (0..y.len())
            .filter(|&i| y[i].iter().any(|v| *v != 0.0))
            .collect();
        if scored.len() < 4 {
            return Err(PipelineError::Input(format!(
                "only {} scored rows after excluding all-zero targets; need at least 4",
                scored.len()
            )));
        }

        // One 80/20 split shared by every target.
        let mut order = scored.clone();
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        order.shuffle(&mut rng);
        let test_len = ((order.len() as f64 * cfg.test_fraction).round() as usize)
            .clamp(1, order.len() - 2);
        let (test_idx, train_idx) = order.split_at(test_len);

        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| x[i].clone()).collect();
        let x_all: Vec<Vec<f64>> = scored.iter().map(|&i| x[i].clone()).collect();

        let mut models = BTreeMap::new();
        let mut reports = Vec::with_capacity(TARGETS.len());

        for (target_pos, target) in TARGETS.iter().enumerate() {
            info!("tuning model for {target}");
            let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i][target_pos]).collect();
            let y_test: Vec<f64> = test_idx.iter().map(|&i| y[i][target_pos]).collect();
            let y_all: Vec<f64> = scored.iter().map(|&i| y[i][target_pos]).collect();

            let mut draw_rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(target_pos as u64));
            let candidates: Vec<ForestParams> =
                (0..cfg.n_iter).map(|_| cfg.grid.draw(&mut draw_rng)).collect();

            let folds = fold_assignment(x_train.len(), cfg.cv_folds, cfg.seed);
            let scores: Vec<f64> = candidates
                .par_iter()
                .map(|params| cv_r2(&x_train, &y_train, &folds, params, cfg.seed))
                .collect();

            // strictly-greater keeps the earliest candidate on ties
            let mut best_pos = 0;
            for (pos, score) in scores.iter().enumerate() {
                if *score > scores[best_pos] {
                    best_pos = pos;
                }
            }
            let best_params = candidates[best_pos].clone();
            info!(
                "best parameters for {target}: {:?} (cv r2 {:.4})",
                best_params, scores[best_pos]
            );

            let model = RandomForestRegressor::fit(&x_train, &y_train, &best_params, cfg.seed);
            let predictions = model.predict(&x_test);

            let mut feature_importance: Vec<(String, f64)> = feature_names
                .iter()
                .cloned()
                .zip(model.feature_importances().iter().copied())
                .collect();
            feature_importance
                .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            let report_folds = fold_assignment(x_all.len(), cfg.report_cv_folds, cfg.seed);
            let (cv_r2_mean, cv_r2_std) =
                cv_r2_moments(&x_all, &y_all, &report_folds, &best_params, cfg.seed);
            info!("cross-validation r2 for {target}: {cv_r2_mean:.4} ± {cv_r2_std:.4}");

            reports.push(TargetReport {
                target: target.to_string(),
                params: best_params,
                mae: metrics::mae(&y_test, &predictions),
                rmse: metrics::rmse(&y_test, &predictions),
                mse: metrics::mse(&y_test, &predictions),
                r2: metrics::r2(&y_test, &predictions),
                mape: metrics::mape(&y_test, &predictions),
                cv_r2_mean,
                cv_r2_std,
                feature_importance,
            });
            models.insert(target.to_string(), model);
        }

        Ok((ScoreModelEnsemble { models }, reports))
    }

    /// Pure prediction: one value per target per row. The caller must pass
    /// feature columns in the trained order; the schema contract upstream
    /// guarantees it.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<BTreeMap<String, Vec<f64>>, PipelineError> {
        let mut out = BTreeMap::new();
        for target in TARGETS {
            let model = self.models.get(target).ok_or_else(|| {
                PipelineError::Artifact(format!("model bundle is missing target '{target}'"))
            })?;
            out.insert(target.to_string(), model.predict(x));
        }
        Ok(out)
    }
}

/// Shuffled fold assignment: `assignment[i]` is the fold of row `i`.
fn fold_assignment(n_rows: usize, folds: usize, seed: u64) -> Vec<usize> {
    let folds = folds.clamp(2, n_rows.max(2));
    let mut order: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let mut assignment = vec![0; n_rows];
    for (position, &row) in order.iter().enumerate() {
        assignment[row] = position % folds;
    }
    assignment
}

/// Mean cross-validated R² for one hyperparameter candidate.
fn cv_r2(x: &[Vec<f64>], y: &[f64], folds: &[usize], params: &ForestParams, seed: u64) -> f64 {
    let scores = fold_scores(x, y, folds, params, seed);
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

fn cv_r2_moments(
    x: &[Vec<f64>],
    y: &[f64],
    folds: &[usize],
    params: &ForestParams,
    seed: u64,
) -> (f64, f64) {
    let scores = fold_scores(x, y, folds, params, seed);
    if scores.is_empty() {
        return (0.0, 0.0);
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance =
        scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / scores.len() as f64;
    (mean, variance.sqrt())
}

fn fold_scores(
    x: &[Vec<f64>],
    y: &[f64],
    folds: &[usize],
    params: &ForestParams,
    seed: u64,
) -> Vec<f64> {
    let n_folds = folds.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    let mut scores = Vec::with_capacity(n_folds);
    for fold in 0..n_folds {
        let mut x_train = Vec::new();
        let mut y_train = Vec::new();
        let mut x_val = Vec::new();
        let mut y_val = Vec::new();
        for (i, &assigned) in folds.iter().enumerate() {
            if assigned == fold {
                x_val.push(x[i].clone());
                y_val.push(y[i]);
            } else {
                x_train.push(x[i].clone());
                y_train.push(y[i]);
            }
        }
        if x_val.is_empty() || x_train.is_empty() {
            continue;
        }
        let model = RandomForestRegressor::fit(&x_train, &y_train, params, seed);
        scores.push(metrics::r2(&y_val, &model.predict(&x_val)));
    }
    scores
}
