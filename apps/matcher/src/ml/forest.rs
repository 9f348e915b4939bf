//! Random-forest regression: bootstrap-sampled variance-reduction trees
//! with per-split feature subsampling.
//!
//! The fitted forest is plain serde data so it rides inside the artifact
//! bundle next to the feature schema. Fitting is deterministic for a given
//! seed; prediction is pure.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Feature-subsampling strategy evaluated at every split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSubsample {
    Sqrt,
    Log2,
    All,
}

impl FeatureSubsample {
    fn count(self, n_features: usize) -> usize {
        let k = match self {
            FeatureSubsample::Sqrt => (n_features as f64).sqrt().floor() as usize,
            FeatureSubsample::Log2 => (n_features as f64).log2().floor() as usize,
            FeatureSubsample::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: FeatureSubsample,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: FeatureSubsample::Sqrt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<Node>,
    n_features: usize,
    /// Impurity-decrease importances, normalized to sum to 1.
    importances: Vec<f64>,
}

impl RandomForestRegressor {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams, seed: u64) -> Self {
        let n_rows = x.len();
        let n_features = x.first().map(|row| row.len()).unwrap_or(0);

        if n_rows == 0 || n_features == 0 {
            return RandomForestRegressor {
                params: params.clone(),
                trees: vec![Node::Leaf(0.0)],
                n_features,
                importances: vec![0.0; n_features],
            };
        }

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(params.n_trees);

        for tree_index in 0..params.n_trees {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_index as u64));
            let bootstrap: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();

            let mut tree_importance = vec![0.0; n_features];
            let root = grow(
                x,
                y,
                bootstrap,
                0,
                params,
                &mut rng,
                &mut tree_importance,
            );

            let total: f64 = tree_importance.iter().sum();
            if total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(&tree_importance) {
                    *acc += value / total;
                }
            }
            trees.push(root);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for value in &mut importances {
                *value /= total;
            }
        }

        RandomForestRegressor {
            params: params.clone(),
            trees,
            n_features,
            importances,
        }
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| walk(tree, row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

fn walk(node: &Node, row: &[f64]) -> f64 {
    match node {
        Node::Leaf(value) => *value,
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] <= *threshold {
                walk(left, row)
            } else {
                walk(right, row)
            }
        }
    }
}

/// Sum of squared deviations from the mean, returned with the mean.
fn mean_sse(y: &[f64], idx: &[usize]) -> (f64, f64) {
    let n = idx.len() as f64;
    let sum: f64 = idx.iter().map(|&i| y[i]).sum();
    let sumsq: f64 = idx.iter().map(|&i| y[i] * y[i]).sum();
    let mean = sum / n;
    (mean, (sumsq - sum * sum / n).max(0.0))
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    children_sse: f64,
}

fn grow(
    x: &[Vec<f64>],
    y: &[f64],
    idx: Vec<usize>,
    depth: usize,
    params: &ForestParams,
    rng: &mut StdRng,
    importance: &mut [f64],
) -> Node {
    let (mean, sse) = mean_sse(y, &idx);

    let depth_exhausted = params.max_depth.is_some_and(|limit| depth >= limit);
    if idx.len() < params.min_samples_split || sse <= 1e-12 || depth_exhausted {
        return Node::Leaf(mean);
    }

    let n_features = x[idx[0]].len();
    let k = params.max_features.count(n_features);
    let candidates = rand::seq::index::sample(rng, n_features, k);

    let mut best: Option<BestSplit> = None;
    for feature in candidates {
        if let Some(split) = best_split_for_feature(x, y, &idx, feature, params.min_samples_leaf) {
            if best
                .as_ref()
                .map_or(true, |b| split.children_sse < b.children_sse)
            {
                best = Some(split);
            }
        }
    }

    let Some(split) = best else {
        return Node::Leaf(mean);
    };

    importance[split.feature] += (sse - split.children_sse).max(0.0);

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
        .into_iter()
        .partition(|&i| x[i][split.feature] <= split.threshold);

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow(x, y, left_idx, depth + 1, params, rng, importance)),
        right: Box::new(grow(x, y, right_idx, depth + 1, params, rng, importance)),
    }
}

/// Scans one feature for the split minimizing the summed child SSE,
/// respecting the leaf-size minimum on both sides.
fn best_split_for_feature(
    x: &[Vec<f64>],
    y: &[f64],
    idx: &[usize],
    feature: usize,
    min_samples_leaf: usize,
) -> Option<BestSplit> {
    let mut pairs: Vec<(f64, f64)> = idx.iter().map(|&i| (x[i][feature], y[i])).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let n = pairs.len();
    let total_sum: f64 = pairs.iter().map(|(_, v)| v).sum();
    let total_sumsq: f64 = pairs.iter().map(|(_, v)| v * v).sum();

    let mut left_sum = 0.0;
    let mut left_sumsq = 0.0;
    let mut best: Option<BestSplit> = None;

    for split_at in 1..n {
        let (value, target) = pairs[split_at - 1];
        left_sum += target;
        left_sumsq += target * target;

        // can only split between distinct feature values
        if value == pairs[split_at].0 {
            continue;
        }
        if split_at < min_samples_leaf || n - split_at < min_samples_leaf {
            continue;
        }

        let n_left = split_at as f64;
        let n_right = (n - split_at) as f64;
        let right_sum = total_sum - left_sum;
        let right_sumsq = total_sumsq - left_sumsq;
        let children_sse = (left_sumsq - left_sum * left_sum / n_left).max(0.0)
            + (right_sumsq - right_sum * right_sum / n_right).max(0.0);

        if best
            .as_ref()
            .map_or(true, |b| children_sse < b.children_sse)
        {
            best = Some(BestSplit {
                feature,
                threshold: (value + pairs[split_at].0) / 2.0,
                children_sse,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 10 when x0 > 0.5, else 0; x1 is noise-free filler
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let v = i as f64 / 40.0;
            x.push(vec![v, 0.3]);
            y.push(if v > 0.5 { 10.0 } else { 0.0 });
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 20,
            max_features: FeatureSubsample::All,
            ..Default::default()
        }
    }

    #[test]
    fn test_constant_target_predicts_constant() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![7.0, 7.0, 7.0];
        let forest = RandomForestRegressor::fit(&x, &y, &small_params(), 42);
        assert!((forest.predict_one(&[2.5]) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_dataset();
        let forest = RandomForestRegressor::fit(&x, &y, &small_params(), 42);
        assert!(forest.predict_one(&[0.9, 0.3]) > 8.0);
        assert!(forest.predict_one(&[0.1, 0.3]) < 2.0);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = step_dataset();
        let a = RandomForestRegressor::fit(&x, &y, &small_params(), 42);
        let b = RandomForestRegressor::fit(&x, &y, &small_params(), 42);
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn test_importances_normalized_and_informative() {
        let (x, y) = step_dataset();
        let forest = RandomForestRegressor::fit(&x, &y, &small_params(), 42);
        let importances = forest.feature_importances();
        let total: f64 = importances.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "total was {total}");
        // all the signal is in feature 0
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let (x, y) = step_dataset();
        let params = ForestParams {
            max_depth: Some(0),
            ..small_params()
        };
        let forest = RandomForestRegressor::fit(&x, &y, &params, 42);
        // depth 0 means every tree is a single leaf: constant prediction
        let p1 = forest.predict_one(&[0.9, 0.3]);
        let p2 = forest.predict_one(&[0.1, 0.3]);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_empty_input_yields_zero_forest() {
        let forest = RandomForestRegressor::fit(&[], &[], &small_params(), 42);
        assert_eq!(forest.predict_one(&[1.0]), 0.0);
    }

    #[test]
    fn test_subsample_counts() {
        assert_eq!(FeatureSubsample::Sqrt.count(16), 4);
        assert_eq!(FeatureSubsample::Log2.count(16), 4);
        assert_eq!(FeatureSubsample::All.count(16), 16);
        assert_eq!(FeatureSubsample::Sqrt.count(1), 1);
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = step_dataset();
        let forest = RandomForestRegressor::fit(&x, &y, &small_params(), 42);
        let bytes = bincode::serialize(&forest).unwrap();
        let back: RandomForestRegressor = bincode::deserialize(&bytes).unwrap();
        assert_eq!(forest.predict(&x), back.predict(&x));
    }
}
