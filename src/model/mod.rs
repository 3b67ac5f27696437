//! Tree-ensemble classifiers and feature scaling
//!
//! Two families cover the pipeline: binary gradient boosting and a
//! multi-class random forest. `TrainedModel` is the enum the rest of the
//! crate dispatches through, so persistence and inference never care
//! which family is inside.

mod boost;
mod forest;
mod scaler;
mod tree;

pub use boost::{BoostParams, GradientBoosting, RegNode, RegressionTree};
pub use forest::{ForestParams, RandomForest};
pub use scaler::StandardScaler;
pub use tree::{DecisionTree, Node, TreeParams};

use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which classifier family to train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Binary gradient-boosted trees, 100 rounds of depth 6 at rate 0.1
    GradientBoosting,
    /// Random forest, 100 trees of depth 10
    RandomForest,
    /// Random forest with unlimited depth
    Default,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::Default => "default",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ModelFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gradient_boosting" | "gradient-boosting" | "gbt" | "xgboost" => {
                Ok(ModelFamily::GradientBoosting)
            }
            "random_forest" | "random-forest" | "rf" => Ok(ModelFamily::RandomForest),
            "default" => Ok(ModelFamily::Default),
            other => Err(Error::UnsupportedModel(format!(
                "unknown model family '{other}'"
            ))),
        }
    }
}

/// A fitted classifier of either family
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub enum TrainedModel {
    GradientBoosting(GradientBoosting),
    RandomForest(RandomForest),
}

impl TrainedModel {
    /// Most probable class per row
    pub fn predict(&self, x: &Array2<f64>) -> Vec<usize> {
        match self {
            TrainedModel::GradientBoosting(m) => m.predict(x),
            TrainedModel::RandomForest(m) => m.predict(x),
        }
    }

    /// Class probabilities, rows summing to one
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        match self {
            TrainedModel::GradientBoosting(m) => m.predict_proba(x),
            TrainedModel::RandomForest(m) => m.predict_proba(x),
        }
    }

    /// Number of classes the model emits
    pub fn n_classes(&self) -> usize {
        match self {
            TrainedModel::GradientBoosting(_) => 2,
            TrainedModel::RandomForest(m) => m.n_classes(),
        }
    }

    /// Number of features expected per row
    pub fn n_features(&self) -> usize {
        match self {
            TrainedModel::GradientBoosting(m) => m.n_features(),
            TrainedModel::RandomForest(m) => m.n_features(),
        }
    }

    /// Normalized global feature importances
    pub fn feature_importances(&self) -> Vec<f64> {
        match self {
            TrainedModel::GradientBoosting(m) => m.feature_importances(),
            TrainedModel::RandomForest(m) => m.feature_importances(),
        }
    }

    /// Family of the fitted model
    pub fn family(&self) -> ModelFamily {
        match self {
            TrainedModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            TrainedModel::RandomForest(_) => ModelFamily::RandomForest,
        }
    }
}
