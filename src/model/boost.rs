//! Binary gradient boosting with logistic loss
//!
//! Regression trees fit Newton steps on the log-odds margin. Class
//! imbalance enters as a positive-class weight scale multiplying the
//! sample weights, the same lever the usual boosting libraries expose.
//! Multi-class targets are rejected up front; the forest handles those.

use bincode::{Decode, Encode};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Guards Newton denominators near-pure nodes
const HESSIAN_FLOOR: f64 = 1e-16;
/// Minimum split gain worth keeping
const MIN_GAIN: f64 = 1e-12;

/// Boosting parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Encode, Decode)]
pub struct BoostParams {
    /// Number of boosting rounds
    pub n_trees: usize,
    /// Depth limit per tree
    pub max_depth: Option<usize>,
    /// Shrinkage applied to each tree's step
    pub learning_rate: f64,
    /// Minimum rows to split
    pub min_samples_split: usize,
    /// Minimum rows per child
    pub min_samples_leaf: usize,
    /// Weight scale for positive-class samples
    pub scale_pos_weight: f64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: Some(6),
            learning_rate: 0.1,
            min_samples_split: 2,
            min_samples_leaf: 1,
            scale_pos_weight: 1.0,
        }
    }
}

/// One node of a margin-space regression tree
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub enum RegNode {
    /// Terminal Newton step
    Leaf { value: f64, weight: f64 },
    /// Binary split; `value` is the Newton step the node would take
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        value: f64,
        weight: f64,
    },
}

impl RegNode {
    /// Newton-step value at this node
    pub fn value(&self) -> f64 {
        match self {
            RegNode::Leaf { value, .. } | RegNode::Split { value, .. } => *value,
        }
    }
}

/// Regression tree over gradients and hessians
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct RegressionTree {
    nodes: Vec<RegNode>,
    root: usize,
}

struct RegFit<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    weights: &'a [f64],
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    gains: Vec<(usize, f64)>,
}

impl RegressionTree {
    fn fit(ctx: &mut RegFit<'_>) -> Self {
        let indices: Vec<usize> = (0..ctx.x.nrows()).collect();
        let mut nodes = Vec::new();
        let root = build_reg_node(ctx, &indices, 0, &mut nodes);
        Self { nodes, root }
    }

    /// Leaf Newton step for one row
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx] {
                RegNode::Leaf { value, .. } => return *value,
                RegNode::Split {
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

    /// Arena nodes
    pub fn nodes(&self) -> &[RegNode] {
        &self.nodes
    }

    /// Root node index
    pub fn root(&self) -> usize {
        self.root
    }
}

fn newton_value(sum_wg: f64, sum_wh: f64) -> f64 {
    sum_wg / (sum_wh + HESSIAN_FLOOR)
}

fn build_reg_node(
    ctx: &mut RegFit<'_>,
    indices: &[usize],
    depth: usize,
    nodes: &mut Vec<RegNode>,
) -> usize {
    let mut sum_wg = 0.0;
    let mut sum_wh = 0.0;
    let mut total_w = 0.0;
    for &i in indices {
        sum_wg += ctx.weights[i] * ctx.grad[i];
        sum_wh += ctx.weights[i] * ctx.hess[i];
        total_w += ctx.weights[i];
    }
    let value = newton_value(sum_wg, sum_wh);

    let depth_reached = ctx.max_depth.is_some_and(|d| depth >= d);
    let too_small = indices.len() < ctx.min_samples_split;
    if !(depth_reached || too_small) {
        if let Some((feature, threshold, gain)) = best_reg_split(ctx, indices, sum_wg, total_w) {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .copied()
                .partition(|&i| ctx.x[[i, feature]] <= threshold);
            if !left_idx.is_empty() && !right_idx.is_empty() {
                ctx.gains.push((feature, gain));
                let left = build_reg_node(ctx, &left_idx, depth + 1, nodes);
                let right = build_reg_node(ctx, &right_idx, depth + 1, nodes);
                nodes.push(RegNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    value,
                    weight: total_w,
                });
                return nodes.len() - 1;
            }
        }
    }

    nodes.push(RegNode::Leaf {
        value,
        weight: total_w,
    });
    nodes.len() - 1
}

/// Weighted least-squares split search on the gradient targets
///
/// Gain is the SSE decrease `(Swg_l)^2/w_l + (Swg_r)^2/w_r - (Swg)^2/w`,
/// the constant term cancelling across candidates.
fn best_reg_split(
    ctx: &RegFit<'_>,
    indices: &[usize],
    node_sum_wg: f64,
    node_total_w: f64,
) -> Option<(usize, f64, f64)> {
    if node_total_w <= 0.0 {
        return None;
    }
    let node_score = node_sum_wg * node_sum_wg / node_total_w;
    let mut best: Option<(usize, f64, f64)> = None;

    for feature in 0..ctx.x.ncols() {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| ctx.x[[a, feature]].total_cmp(&ctx.x[[b, feature]]));

        let mut left_wg = 0.0;
        let mut left_w = 0.0;
        for pos in 0..order.len() - 1 {
            let i = order[pos];
            left_wg += ctx.weights[i] * ctx.grad[i];
            left_w += ctx.weights[i];

            let here = ctx.x[[i, feature]];
            let next = ctx.x[[order[pos + 1], feature]];
            if here == next {
                continue;
            }
            let left_count = pos + 1;
            let right_count = order.len() - left_count;
            if left_count < ctx.min_samples_leaf || right_count < ctx.min_samples_leaf {
                continue;
            }
            let right_w = node_total_w - left_w;
            if left_w <= 0.0 || right_w <= 0.0 {
                continue;
            }
            let right_wg = node_sum_wg - left_wg;
            let gain = left_wg * left_wg / left_w + right_wg * right_wg / right_w - node_score;
            if gain > MIN_GAIN && best.as_ref().is_none_or(|b| gain > b.2) {
                best = Some((feature, (here + next) / 2.0, gain));
            }
        }
    }
    best
}

/// Fitted binary gradient-boosting classifier
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct GradientBoosting {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    gains: Vec<f64>,
    n_features: usize,
}

impl GradientBoosting {
    /// Fit on binary labels; classes other than {0, 1} are rejected
    pub fn fit(x: &Array2<f64>, y: &[usize], params: BoostParams) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::EmptyTable(
                "cannot boost on zero rows".to_string(),
            ));
        }
        if y.len() != x.nrows() {
            return Err(Error::InvalidParameter(format!(
                "rows {}, labels {}",
                x.nrows(),
                y.len()
            )));
        }
        if y.iter().any(|&c| c > 1) {
            return Err(Error::UnsupportedModel(
                "gradient boosting here is binary; use the random forest for more classes"
                    .to_string(),
            ));
        }
        if params.n_trees == 0 {
            return Err(Error::InvalidParameter(
                "boosting needs at least one round".to_string(),
            ));
        }
        if params.learning_rate.is_nan() || params.learning_rate <= 0.0 {
            return Err(Error::InvalidParameter(
                "learning rate must be positive".to_string(),
            ));
        }

        let n = x.nrows();
        let weights: Vec<f64> = y
            .iter()
            .map(|&c| if c == 1 { params.scale_pos_weight } else { 1.0 })
            .collect();

        let pos_w: f64 = y
            .iter()
            .zip(&weights)
            .filter(|(c, _)| **c == 1)
            .map(|(_, w)| w)
            .sum();
        let total_w: f64 = weights.iter().sum();
        let p0 = (pos_w / total_w).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (p0 / (1.0 - p0)).ln();

        let mut margin = vec![base_score; n];
        let mut trees = Vec::with_capacity(params.n_trees);
        let mut gain_acc: Vec<f64> = vec![0.0; x.ncols()];

        for _ in 0..params.n_trees {
            let mut grad = vec![0.0; n];
            let mut hess = vec![0.0; n];
            for i in 0..n {
                let p = sigmoid(margin[i]);
                grad[i] = y[i] as f64 - p;
                hess[i] = (p * (1.0 - p)).max(HESSIAN_FLOOR);
            }

            let mut ctx = RegFit {
                x,
                grad: &grad,
                hess: &hess,
                weights: &weights,
                max_depth: params.max_depth,
                min_samples_split: params.min_samples_split,
                min_samples_leaf: params.min_samples_leaf,
                gains: Vec::new(),
            };
            let tree = RegressionTree::fit(&mut ctx);
            for (feature, gain) in &ctx.gains {
                gain_acc[*feature] += gain;
            }
            for i in 0..n {
                margin[i] += params.learning_rate * tree.predict_row(x.row(i));
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
            gains: gain_acc,
            n_features: x.ncols(),
        })
    }

    /// Log-odds margin for one row
    pub fn predict_margin_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let steps: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        self.base_score + self.learning_rate * steps
    }

    /// Two-class probabilities, `[P(0), P(1)]` per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, row) in x.rows().into_iter().enumerate() {
            let p = sigmoid(self.predict_margin_row(row));
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        proba
    }

    /// Most probable class per row
    pub fn predict(&self, x: &Array2<f64>) -> Vec<usize> {
        x.rows()
            .into_iter()
            .map(|row| usize::from(sigmoid(self.predict_margin_row(row)) >= 0.5))
            .collect()
    }

    /// Total split-gain importance per feature, normalized to sum 1
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut imp = self.gains.clone();
        let total: f64 = imp.iter().sum();
        if total > 0.0 {
            for v in &mut imp {
                *v /= total;
            }
        }
        imp
    }

    /// Fitted trees, for path-based explanation
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Base log-odds before any tree contributes
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Shrinkage factor
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Number of features seen at fit time
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
