// src/models/iforest.rs

use ndarray::ArrayView2;
use rand::prelude::*;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::base_model::{Detector, OutlierModel};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// Tree node. A node without children is a leaf holding `size` samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Node {
    split_feature: Option<usize>,
    split_value: f64,
    size: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(size: usize) -> Self {
        Node {
            split_feature: None,
            split_value: 0.0,
            size,
            left: None,
            right: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Hyperparameters of an isolation forest. Also the [`Detector`] that fits one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    /// Upper bound on rows drawn (without replacement) per tree.
    pub max_samples: usize,
    /// Expected share of outliers in the training data, in (0, 0.5].
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        IsolationForestParams {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

impl IsolationForestParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::Config("n_estimators must be at least 1".into()));
        }
        if self.max_samples == 0 {
            return Err(Error::Config("max_samples must be at least 1".into()));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(Error::Config(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        Ok(())
    }
}

/// A fitted isolation forest.
///
/// Scores follow the usual convention: `score_samples` is the negated
/// anomaly score `-2^(-E[h(x)] / c(psi))` and `decision_function` shifts it
/// by the contamination quantile of the training scores, so inliers land
/// above zero and the most isolated rows below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    n_features: usize,
    sample_size: usize,
    trees: Vec<Node>,
    offset: f64,
}

impl IsolationForest {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn build_tree(
        samples: &ArrayView2<'_, f64>,
        rows: &[usize],
        height: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> Node {
        let size = rows.len();

        // Stop criteria
        if size <= 1 || height >= height_limit {
            return Node::leaf(size);
        }

        // Per-feature range over this node's rows; constant features cannot split.
        let candidates: Vec<(usize, f64, f64)> = (0..samples.ncols())
            .filter_map(|feature| {
                let mut min_val = f64::INFINITY;
                let mut max_val = f64::NEG_INFINITY;
                for &r in rows {
                    let val = samples[[r, feature]];
                    min_val = min_val.min(val);
                    max_val = max_val.max(val);
                }
                (max_val - min_val > 1e-10).then_some((feature, min_val, max_val))
            })
            .collect();

        let Some(&(split_feature, min_val, max_val)) = candidates.choose(rng) else {
            return Node::leaf(size);
        };

        let split_value = rng.gen::<f64>() * (max_val - min_val) + min_val;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| samples[[r, split_feature]] < split_value);

        // Only split if we actually divided the data
        if left_rows.is_empty() || right_rows.is_empty() {
            return Node::leaf(size);
        }

        Node {
            split_feature: Some(split_feature),
            split_value,
            size,
            left: Some(Box::new(Self::build_tree(
                samples,
                &left_rows,
                height + 1,
                height_limit,
                rng,
            ))),
            right: Some(Box::new(Self::build_tree(
                samples,
                &right_rows,
                height + 1,
                height_limit,
                rng,
            ))),
        }
    }

    fn path_length(node: &Node, x: &[f64], current_height: usize) -> f64 {
        if node.is_leaf() {
            return current_height as f64 + average_path_length(node.size);
        }

        if let Some(split_feature) = node.split_feature {
            if x[split_feature] < node.split_value {
                if let Some(ref left) = node.left {
                    return Self::path_length(left, x, current_height + 1);
                }
            } else if let Some(ref right) = node.right {
                return Self::path_length(right, x, current_height + 1);
            }
        }

        current_height as f64
    }

    fn check_width(&self, x: &[f64]) -> Result<()> {
        if x.len() != self.n_features {
            return Err(Error::DimensionMismatch {
                expected: self.n_features,
                actual: x.len(),
            });
        }
        Ok(())
    }

    /// Negated anomaly score in [-1, 0]; lower is more anomalous.
    pub fn score_samples(&self, x: &[f64]) -> Result<f64> {
        self.check_width(x)?;
        Ok(self.raw_score(x))
    }

    fn raw_score(&self, x: &[f64]) -> f64 {
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| Self::path_length(tree, x, 0))
            .sum();
        let avg_path_length = total / self.trees.len() as f64;

        let expected = average_path_length(self.sample_size);
        let expected = if expected > 0.0 { expected } else { 1.0 };
        -(2.0f64).powf(-avg_path_length / expected)
    }
}

impl OutlierModel for IsolationForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn decision_function(&self, x: &[f64]) -> Result<f64> {
        Ok(self.score_samples(x)? - self.offset)
    }
}

impl Detector for IsolationForestParams {
    type Model = IsolationForest;

    fn fit(&self, samples: ArrayView2<'_, f64>) -> Result<IsolationForest> {
        self.validate()?;
        let (n_rows, n_features) = samples.dim();
        if n_rows == 0 || n_features == 0 {
            return Err(Error::EmptyTrainingSet);
        }

        let sample_size = self.max_samples.min(n_rows);
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;

        // One seed per tree, drawn up front, keeps parallel building reproducible.
        let mut rng = StdRng::seed_from_u64(self.seed);
        let tree_seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.gen()).collect();

        let trees: Vec<Node> = tree_seeds
            .par_iter()
            .map(|&tree_seed| {
                let mut tree_rng = StdRng::seed_from_u64(tree_seed);
                let rows = index::sample(&mut tree_rng, n_rows, sample_size).into_vec();
                IsolationForest::build_tree(&samples, &rows, 0, height_limit, &mut tree_rng)
            })
            .collect();

        let mut forest = IsolationForest {
            n_features,
            sample_size,
            trees,
            offset: 0.0,
        };

        let mut training_scores: Vec<f64> = samples
            .rows()
            .into_iter()
            .map(|row| forest.raw_score(&row.to_vec()))
            .collect();
        forest.offset = percentile(&mut training_scores, self.contamination);

        Ok(forest)
    }
}

/// Average unsuccessful-search path length in a binary search tree of `n`
/// nodes, `c(n)`. Normalizes depths and extends leaves that stopped early.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// Linear-interpolated quantile `q` in [0, 1]; sorts `values` in place.
fn percentile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}
