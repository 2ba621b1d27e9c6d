//! CART regression tree (squared-error criterion).
//!
//! Nodes live in a flat vector; a split sends rows with
//! `value <= threshold` left and everything else (NaN included) right.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::features::FeatureMatrix;
use super::ModelError;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or cannot be split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    n_features: usize,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    sse: f64,
    feature: usize,
    threshold: f64,
}

impl RegressionTree {
    /// Fit on the rows listed in `samples` (repeats allowed, as produced by
    /// bootstrap sampling).
    pub fn fit(
        x: &FeatureMatrix,
        y: &[f64],
        samples: &[usize],
        params: &TreeParams,
    ) -> Result<Self, ModelError> {
        if samples.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.n_rows() != y.len() {
            return Err(ModelError::FeatureMismatch {
                expected: x.n_rows(),
                actual: y.len(),
            });
        }

        let min_leaf = params.min_samples_leaf.max(1);
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(0, samples.to_vec(), 0)];

        while let Some((node_id, idx, depth)) = stack.pop() {
            let value = mean_of(y, &idx);
            let splittable = idx.len() >= params.min_samples_split.max(2)
                && params.max_depth.map_or(true, |max| depth < max)
                && !is_pure(y, &idx);

            let candidate = if splittable {
                best_split(x, y, &idx, value, min_leaf)
            } else {
                None
            };

            let Some(split) = candidate else {
                nodes[node_id] = Node::Leaf { value };
                continue;
            };

            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
                .iter()
                .partition(|&&i| x.get(i, split.feature) <= split.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            let right = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[node_id] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push((right, right_idx, depth + 1));
            stack.push((left, left_idx, depth + 1));
        }

        Ok(Self {
            n_features: x.n_features(),
            nodes,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Predict one row. The caller guarantees `row.len() == n_features`.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node_id = 0;
        loop {
            match &self.nodes[node_id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn mean_of(y: &[f64], idx: &[usize]) -> f64 {
    idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64
}

fn is_pure(y: &[f64], idx: &[usize]) -> bool {
    let first = y[idx[0]];
    idx.iter().all(|&i| y[i] == first)
}

/// NaN sorts after every number.
fn cmp_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi || !mid.is_finite() {
        lo
    } else {
        mid
    }
}

/// Exhaustive search for the split with the lowest summed squared error.
///
/// Targets are centred on the node mean before accumulating so the prefix
/// sums stay well conditioned for large prices. Ties keep the first candidate
/// found (lowest feature index, then lowest threshold).
fn best_split(
    x: &FeatureMatrix,
    y: &[f64],
    idx: &[usize],
    node_mean: f64,
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = idx.len();
    let centred = |i: usize| y[i] - node_mean;
    let total_sum: f64 = idx.iter().map(|&i| centred(i)).sum();
    let total_sq: f64 = idx.iter().map(|&i| centred(i).powi(2)).sum();

    let mut order = idx.to_vec();
    let mut best: Option<SplitCandidate> = None;

    for feature in 0..x.n_features() {
        order.sort_by(|&a, &b| cmp_nan_last(x.get(a, feature), x.get(b, feature)));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 1..n {
            let prev = order[pos - 1];
            let c = centred(prev);
            left_sum += c;
            left_sq += c * c;

            let lo = x.get(prev, feature);
            let hi = x.get(order[pos], feature);
            if lo.is_nan() {
                break;
            }
            let threshold = if hi.is_nan() {
                lo
            } else if hi > lo {
                midpoint(lo, hi)
            } else {
                continue;
            };

            let n_left = pos;
            let n_right = n - pos;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);

            if best.map_or(true, |b| sse < b.sse) {
                best = Some(SplitCandidate {
                    sse,
                    feature,
                    threshold,
                });
            }

            if hi.is_nan() {
                break;
            }
        }
    }

    best
}
