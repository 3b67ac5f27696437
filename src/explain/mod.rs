//! Tree-path attribution for fitted ensembles
//!
//! Walking a record's decision path, each split transfers `child value
//! minus parent value` to the split feature. Summed over trees the terms
//! telescope, so the bias plus all contributions reproduces the model
//! output exactly. Forest paths decompose in probability space, boosting
//! paths in log-odds space.

use bincode::{Decode, Encode};
use ndarray::{s, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{GradientBoosting, Node, RandomForest, RegNode, TrainedModel};

/// Rows of scaled training data kept as the background sample
pub const MAX_BACKGROUND_ROWS: usize = 1000;

/// Output space of an attribution vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum AttributionSpace {
    /// Class-probability deltas, forest decomposition
    Probability,
    /// Log-odds margin deltas, boosting decomposition
    LogOdds,
}

/// One feature's share of a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
    /// Feature column name
    pub feature: String,
    /// Signed contribution in the explanation's space
    pub contribution: f64,
}

/// Additive decomposition of one prediction
///
/// `bias + sum(contributions)` equals the model output for the chosen
/// class: its probability for forests, its signed margin for boosting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Class the attribution vector describes
    pub class_index: usize,
    /// Model probability of that class
    pub probability: f64,
    /// Expected output over the background sample
    pub baseline: f64,
    /// Path-independent term
    pub bias: f64,
    /// Units of `baseline`, `bias`, and the contributions
    pub space: AttributionSpace,
    /// Per-feature contributions, largest magnitude first
    pub attributions: Vec<Attribution>,
}

impl Explanation {
    /// The `n` largest-magnitude contributions
    pub fn top(&self, n: usize) -> &[Attribution] {
        &self.attributions[..self.attributions.len().min(n)]
    }
}

/// Path attributor with a frozen background expectation
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct TreeExplainer {
    expected: Vec<f64>,
    n_background: usize,
    n_features: usize,
    space: AttributionSpace,
}

impl TreeExplainer {
    /// Build against a fitted model and a scaled background sample
    pub fn fit(model: &TrainedModel, background: &Array2<f64>) -> Result<Self> {
        if background.nrows() == 0 {
            return Err(Error::EmptyTable(
                "explainer needs a non-empty background sample".to_string(),
            ));
        }
        if background.ncols() != model.n_features() {
            return Err(Error::FeatureMismatch(format!(
                "background has {} columns, model expects {}",
                background.ncols(),
                model.n_features()
            )));
        }

        let rows = background.nrows().min(MAX_BACKGROUND_ROWS);
        let bg = background.slice(s![..rows, ..]);

        let (expected, space) = match model {
            TrainedModel::RandomForest(forest) => {
                let proba = forest.predict_proba(&bg.to_owned());
                let mean = proba
                    .mean_axis(Axis(0))
                    .ok_or_else(|| Error::EmptyTable("background sample is empty".to_string()))?;
                (mean.to_vec(), AttributionSpace::Probability)
            }
            TrainedModel::GradientBoosting(gbt) => {
                let mean_margin = bg
                    .rows()
                    .into_iter()
                    .map(|row| gbt.predict_margin_row(row))
                    .sum::<f64>()
                    / rows as f64;
                (vec![-mean_margin, mean_margin], AttributionSpace::LogOdds)
            }
        };

        Ok(Self {
            expected,
            n_background: rows,
            n_features: background.ncols(),
            space,
        })
    }

    /// Decompose one scaled row; `class` defaults to the predicted class
    pub fn explain(
        &self,
        model: &TrainedModel,
        row: ArrayView1<'_, f64>,
        feature_names: &[String],
        class: Option<usize>,
    ) -> Result<Explanation> {
        if row.len() != self.n_features || model.n_features() != self.n_features {
            return Err(Error::FeatureMismatch(format!(
                "explainer holds {} features, row has {}, model expects {}",
                self.n_features,
                row.len(),
                model.n_features()
            )));
        }
        if feature_names.len() != self.n_features {
            return Err(Error::FeatureMismatch(format!(
                "{} feature names for {} features",
                feature_names.len(),
                self.n_features
            )));
        }

        let (class_index, probability, bias, per_feature) = match model {
            TrainedModel::RandomForest(forest) => {
                let (bias, contrib) = forest_decomposition(forest, row);
                let proba: Vec<f64> = (0..forest.n_classes())
                    .map(|c| bias[c] + contrib.iter().map(|f| f[c]).sum::<f64>())
                    .collect();
                let class_index = resolve_class(class, &proba)?;
                let per_feature: Vec<f64> = contrib.iter().map(|f| f[class_index]).collect();
                (class_index, proba[class_index], bias[class_index], per_feature)
            }
            TrainedModel::GradientBoosting(gbt) => {
                let (bias, contrib) = boosting_decomposition(gbt, row);
                let margin = bias + contrib.iter().sum::<f64>();
                let p1 = sigmoid(margin);
                let proba = vec![1.0 - p1, p1];
                let class_index = resolve_class(class, &proba)?;
                // class 0 is the complement: same decomposition, negated
                let (bias, per_feature) = if class_index == 0 {
                    (-bias, contrib.iter().map(|c| -c).collect())
                } else {
                    (bias, contrib)
                };
                (class_index, proba[class_index], bias, per_feature)
            }
        };

        let mut attributions: Vec<Attribution> = feature_names
            .iter()
            .zip(per_feature)
            .map(|(name, contribution)| Attribution {
                feature: name.clone(),
                contribution,
            })
            .collect();
        attributions.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(Explanation {
            class_index,
            probability,
            baseline: self.expected.get(class_index).copied().unwrap_or(0.0),
            bias,
            space: self.space,
            attributions,
        })
    }

    /// Expected per-class output over the background
    pub fn expected(&self) -> &[f64] {
        &self.expected
    }

    /// Background rows actually used
    pub fn n_background(&self) -> usize {
        self.n_background
    }

    /// Attribution space of this explainer
    pub fn space(&self) -> AttributionSpace {
        self.space
    }
}

fn resolve_class(requested: Option<usize>, proba: &[f64]) -> Result<usize> {
    match requested {
        Some(c) if c < proba.len() => Ok(c),
        Some(c) => Err(Error::InvalidParameter(format!(
            "class {c} out of range for {} classes",
            proba.len()
        ))),
        None => Ok(argmax(proba)),
    }
}

/// Per-class bias and per-feature deltas averaged over the forest
fn forest_decomposition(
    forest: &RandomForest,
    row: ArrayView1<'_, f64>,
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n_classes = forest.n_classes();
    let n_features = forest.n_features();
    let mut bias = vec![0.0; n_classes];
    let mut contrib = vec![vec![0.0; n_classes]; n_features];

    for tree in forest.trees() {
        let nodes = tree.nodes();
        let mut idx = tree.root();
        for (c, p) in nodes[idx].distribution().iter().enumerate() {
            bias[c] += p;
        }
        while let Node::Split {
            feature,
            threshold,
            left,
            right,
            distribution,
            ..
        } = &nodes[idx]
        {
            let next = if row[*feature] <= *threshold {
                *left
            } else {
                *right
            };
            let child = nodes[next].distribution();
            for c in 0..n_classes {
                contrib[*feature][c] += child[c] - distribution[c];
            }
            idx = next;
        }
    }

    let n = forest.trees().len() as f64;
    for b in &mut bias {
        *b /= n;
    }
    for feature in &mut contrib {
        for c in feature.iter_mut() {
            *c /= n;
        }
    }
    (bias, contrib)
}

/// Margin-space bias and per-feature deltas, scaled by the learning rate
fn boosting_decomposition(gbt: &GradientBoosting, row: ArrayView1<'_, f64>) -> (f64, Vec<f64>) {
    let lr = gbt.learning_rate();
    let mut bias = gbt.base_score();
    let mut contrib = vec![0.0; gbt.n_features()];

    for tree in gbt.trees() {
        let nodes = tree.nodes();
        let mut idx = tree.root();
        bias += lr * nodes[idx].value();
        while let RegNode::Split {
            feature,
            threshold,
            left,
            right,
            value,
            ..
        } = &nodes[idx]
        {
            let next = if row[*feature] <= *threshold {
                *left
            } else {
                *right
            };
            contrib[*feature] += lr * (nodes[next].value() - *value);
            idx = next;
        }
    }
    (bias, contrib)
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
