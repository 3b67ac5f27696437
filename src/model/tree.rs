//! Sample-weighted CART classification tree
//!
//! Nodes live in a flat arena indexed by `usize`, which keeps the
//! structure serializable and lets the explainer walk decision paths
//! without pointer chasing. Every node carries its weighted class
//! distribution so path attributions can diff parent and child values.

use bincode::{Decode, Encode};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum impurity gain for a split to be worth keeping
const MIN_GAIN: f64 = 1e-12;

/// One tree node in the arena
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub enum Node {
    /// Terminal node holding the weighted class distribution
    Leaf { distribution: Vec<f64>, weight: f64 },
    /// Binary split: rows with `feature <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        distribution: Vec<f64>,
        weight: f64,
    },
}

impl Node {
    /// Weighted class distribution at this node
    pub fn distribution(&self) -> &[f64] {
        match self {
            Node::Leaf { distribution, .. } | Node::Split { distribution, .. } => distribution,
        }
    }
}

/// Tree growth parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Encode, Decode)]
pub struct TreeParams {
    /// Maximum depth; `None` grows until purity
    pub max_depth: Option<usize>,
    /// Minimum row count to attempt a split
    pub min_samples_split: usize,
    /// Minimum row count in each child
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// Fitted classification tree
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    root: usize,
    n_classes: usize,
    n_features: usize,
}

struct FitContext<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
    params: TreeParams,
}

impl DecisionTree {
    /// Grow a tree on weighted samples
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        weights: &[f64],
        n_classes: usize,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::EmptyTable("cannot fit a tree on zero rows".to_string()));
        }
        if y.len() != x.nrows() || weights.len() != x.nrows() {
            return Err(Error::InvalidParameter(format!(
                "rows {}, labels {}, weights {}",
                x.nrows(),
                y.len(),
                weights.len()
            )));
        }
        if n_classes < 2 {
            return Err(Error::InvalidParameter(
                "classification needs at least two classes".to_string(),
            ));
        }

        let ctx = FitContext {
            x,
            y,
            weights,
            n_classes,
            params,
        };
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut nodes = Vec::new();
        let root = build_node(&ctx, &indices, 0, &mut nodes, rng);
        Ok(Self {
            nodes,
            root,
            n_classes,
            n_features: x.ncols(),
        })
    }

    /// Class distribution at the leaf this row lands in
    pub fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution, .. } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Most probable class for this row
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> usize {
        argmax(self.predict_proba_row(row))
    }

    /// Arena nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Root node index
    pub fn root(&self) -> usize {
        self.root
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Number of features seen at fit time
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Impurity-decrease importance per feature, normalized to sum 1
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut importances = vec![0.0; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                left,
                right,
                distribution,
                weight,
                ..
            } = node
            {
                let g_node = gini_of(distribution);
                let (g_l, w_l) = node_gini_weight(&self.nodes[*left]);
                let (g_r, w_r) = node_gini_weight(&self.nodes[*right]);
                importances[*feature] += weight * g_node - w_l * g_l - w_r * g_r;
            }
        }
        normalize(&mut importances);
        importances
    }
}

fn node_gini_weight(node: &Node) -> (f64, f64) {
    match node {
        Node::Leaf {
            distribution,
            weight,
        }
        | Node::Split {
            distribution,
            weight,
            ..
        } => (gini_of(distribution), *weight),
    }
}

/// Index of the largest element, first on ties
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

/// Gini impurity of a normalized distribution
fn gini_of(distribution: &[f64]) -> f64 {
    1.0 - distribution.iter().map(|p| p * p).sum::<f64>()
}

fn class_sums(ctx: &FitContext<'_>, indices: &[usize]) -> (Vec<f64>, f64) {
    let mut sums = vec![0.0; ctx.n_classes];
    let mut total = 0.0;
    for &i in indices {
        sums[ctx.y[i]] += ctx.weights[i];
        total += ctx.weights[i];
    }
    (sums, total)
}

fn distribution_from(sums: &[f64], total: f64) -> Vec<f64> {
    if total > 0.0 {
        sums.iter().map(|s| s / total).collect()
    } else {
        vec![1.0 / sums.len() as f64; sums.len()]
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn build_node(
    ctx: &FitContext<'_>,
    indices: &[usize],
    depth: usize,
    nodes: &mut Vec<Node>,
    rng: &mut StdRng,
) -> usize {
    let (sums, total) = class_sums(ctx, indices);
    let distribution = distribution_from(&sums, total);

    let is_pure = sums.iter().filter(|s| **s > 0.0).count() <= 1;
    let depth_reached = ctx.params.max_depth.is_some_and(|d| depth >= d);
    let too_small = indices.len() < ctx.params.min_samples_split;

    if !(is_pure || depth_reached || too_small) {
        if let Some(split) = find_best_split(ctx, indices, &sums, total, rng) {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .copied()
                .partition(|&i| ctx.x[[i, split.feature]] <= split.threshold);
            if !left_idx.is_empty() && !right_idx.is_empty() {
                let left = build_node(ctx, &left_idx, depth + 1, nodes, rng);
                let right = build_node(ctx, &right_idx, depth + 1, nodes, rng);
                nodes.push(Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                    distribution,
                    weight: total,
                });
                return nodes.len() - 1;
            }
        }
    }

    nodes.push(Node::Leaf {
        distribution,
        weight: total,
    });
    nodes.len() - 1
}

fn find_best_split(
    ctx: &FitContext<'_>,
    indices: &[usize],
    node_sums: &[f64],
    node_total: f64,
    rng: &mut StdRng,
) -> Option<BestSplit> {
    let n_features = ctx.x.ncols();
    let candidates = candidate_features(n_features, ctx.params.max_features, rng);
    let node_gini = gini_of(&distribution_from(node_sums, node_total));

    let mut best: Option<BestSplit> = None;
    for feature in candidates {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| ctx.x[[a, feature]].total_cmp(&ctx.x[[b, feature]]));

        let mut left_sums = vec![0.0; ctx.n_classes];
        let mut left_total = 0.0;
        for pos in 0..order.len() - 1 {
            let i = order[pos];
            left_sums[ctx.y[i]] += ctx.weights[i];
            left_total += ctx.weights[i];

            let here = ctx.x[[i, feature]];
            let next = ctx.x[[order[pos + 1], feature]];
            if here == next {
                continue;
            }
            let left_count = pos + 1;
            let right_count = order.len() - left_count;
            if left_count < ctx.params.min_samples_leaf
                || right_count < ctx.params.min_samples_leaf
            {
                continue;
            }

            let right_total = node_total - left_total;
            if left_total <= 0.0 || right_total <= 0.0 {
                continue;
            }
            let gini_l = weighted_gini(&left_sums, left_total);
            let right_sums: Vec<f64> = node_sums
                .iter()
                .zip(&left_sums)
                .map(|(n, l)| n - l)
                .collect();
            let gini_r = weighted_gini(&right_sums, right_total);

            let gain = node_gini
                - (left_total / node_total) * gini_l
                - (right_total / node_total) * gini_r;
            if gain > MIN_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

fn weighted_gini(sums: &[f64], total: f64) -> f64 {
    gini_of(&distribution_from(sums, total))
}

/// Feature subset for one split: all features, or `k` drawn without
/// replacement
fn candidate_features(n_features: usize, max_features: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    match max_features {
        Some(k) if k < n_features => {
            let mut pool: Vec<usize> = (0..n_features).collect();
            for i in 0..k {
                let j = rng.random_range(i..n_features);
                pool.swap(i, j);
            }
            pool.truncate(k);
            pool
        }
        _ => (0..n_features).collect(),
    }
}
