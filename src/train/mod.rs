//! Training pipeline
//!
//! Runs the full offline flow: preprocess, engineer features, select and
//! standardize feature columns, fit the requested ensemble with
//! imbalance-aware weighting, then evaluate with a held-out split and
//! seeded cross-validation. The engineered table can be snapshotted to
//! CSV for audit.

mod cv;
mod metrics;

pub use cv::{CvSummary, KFold};
pub use metrics::{classification_report, Average, ClassificationMetrics, ConfusionMatrix};

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{engineer_features, AppliedRules};
use crate::model::{
    BoostParams, ForestParams, GradientBoosting, ModelFamily, RandomForest, StandardScaler,
    TrainedModel,
};
use crate::preprocess::{
    preprocess, CategoryEncoder, LabelEncoder, LabelOutcome, ENGAGEMENT_COLUMN,
    RISK_ENCODED_COLUMN, RISK_LABEL_COLUMN,
};
use crate::schema::ColumnKind;
use crate::table::{write_csv, Table, Value};

/// Columns excluded from features by name, case-insensitively
pub const IDENTIFIER_COLUMNS: &[&str] = &["student_id", "id", "name", "email", "phone"];

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Classifier family to fit
    pub family: ModelFamily,
    /// Seed for the split, bootstrap, and cross-validation shuffles
    pub seed: u64,
    /// Held-out fraction, stratified by class
    pub test_fraction: f64,
    /// Cross-validation folds over the training split
    pub cv_folds: usize,
    /// Features with standard deviation at or below this are dropped
    pub near_zero_std: f64,
    /// Override the family's tree count
    pub n_trees: Option<usize>,
    /// Override the family's depth limit
    pub max_depth: Option<usize>,
    /// Override the boosting learning rate
    pub learning_rate: Option<f64>,
    /// Where to write the engineered-table CSV snapshot
    pub snapshot_path: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            family: ModelFamily::GradientBoosting,
            seed: 42,
            test_fraction: 0.2,
            cv_folds: 5,
            near_zero_std: 0.01,
            n_trees: None,
            max_depth: None,
            learning_rate: None,
            snapshot_path: None,
        }
    }
}

/// One entry of the global importance ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Feature column name
    pub feature: String,
    /// Normalized importance
    pub importance: f64,
}

/// Everything worth knowing about a finished training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Requested model family
    pub family: String,
    /// When training finished
    pub trained_at: DateTime<Utc>,
    /// Target column the run trained against
    pub target: String,
    /// Dtype class of the target
    pub target_kind: ColumnKind,
    /// How the target became labels
    pub label_outcome: LabelOutcome,
    /// Label names in class-index order
    pub labels: Vec<String>,
    /// Feature columns in model order
    pub feature_columns: Vec<String>,
    /// Features dropped for near-zero variance
    pub dropped_features: Vec<String>,
    /// Derivation rules that fired, and those skipped for missing sources
    pub feature_rules: AppliedRules,
    /// Balanced class weights in class-index order
    pub class_weights: Vec<f64>,
    /// Rows in the training split
    pub n_train: usize,
    /// Rows in the held-out split
    pub n_test: usize,
    /// Accuracy on the training split
    pub train_accuracy: f64,
    /// Accuracy on the held-out split
    pub test_accuracy: f64,
    /// Cross-validation summary over the training split
    pub cv: CvSummary,
    /// Held-out confusion matrix
    pub confusion: ConfusionMatrix,
    /// Held-out per-class metrics
    pub metrics: ClassificationMetrics,
    /// Global importances, descending
    pub feature_importances: Vec<FeatureImportance>,
}

impl TrainingReport {
    /// Multi-line human summary
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Model family:     {}\n", self.family));
        out.push_str(&format!("Target column:    {}\n", self.target));
        out.push_str(&format!("Labels:           {}\n", self.labels.join(", ")));
        out.push_str(&format!(
            "Samples:          {} train / {} test\n",
            self.n_train, self.n_test
        ));
        out.push_str(&format!(
            "Features:         {}\n",
            self.feature_columns.len()
        ));
        out.push_str(&format!(
            "Derived features: {} applied, {} skipped\n",
            self.feature_rules.applied.len(),
            self.feature_rules.skipped.len()
        ));
        out.push_str(&format!("Train accuracy:   {:.4}\n", self.train_accuracy));
        out.push_str(&format!("Test accuracy:    {:.4}\n", self.test_accuracy));
        out.push_str(&format!("CV accuracy:      {}\n\n", self.cv));
        out.push_str(&format!("{}\n", self.confusion));
        out.push_str(&classification_report(&self.confusion));
        if !self.feature_importances.is_empty() {
            out.push_str("\nTop features:\n");
            for fi in self.feature_importances.iter().take(10) {
                out.push_str(&format!("  {:<36} {:.4}\n", fi.feature, fi.importance));
            }
        }
        out
    }
}

/// A fitted pipeline ready for persistence and inference
#[derive(Debug, Clone)]
pub struct TrainOutput {
    /// The fitted classifier
    pub model: TrainedModel,
    /// Scaler fitted on the training split
    pub scaler: StandardScaler,
    /// Frozen feature column order
    pub feature_columns: Vec<String>,
    /// Per-column categorical encoders
    pub encoders: BTreeMap<String, CategoryEncoder>,
    /// Label encoder over the derived risk labels
    pub label_encoder: LabelEncoder,
    /// Target column name
    pub target: String,
    /// Dtype class of the target
    pub target_kind: ColumnKind,
    /// Engineered table, as snapshotted
    pub engineered: Table,
    /// Scaled training matrix, for explainer construction
    pub scaled_train: Array2<f64>,
    /// Run report
    pub report: TrainingReport,
}

/// Train a classifier end to end from a raw table
pub fn train(
    table: &Table,
    target_override: Option<&str>,
    config: &TrainConfig,
) -> Result<TrainOutput> {
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return Err(Error::InvalidParameter(format!(
            "test fraction must be in (0, 1), got {}",
            config.test_fraction
        )));
    }

    let prep = preprocess(table, target_override)?;
    let target = prep.target;
    let target_kind = prep.target_kind;
    let label_encoder = prep.label_encoder;
    let encoders = prep.encoders;
    let outcome = prep.outcome;
    let mut engineered = prep.table;

    let rule_excluded = vec![
        target.clone(),
        RISK_LABEL_COLUMN.to_string(),
        RISK_ENCODED_COLUMN.to_string(),
        ENGAGEMENT_COLUMN.to_string(),
    ];
    let feature_rules = engineer_features(&mut engineered, &rule_excluded)?;

    let n_classes = label_encoder.n_classes();
    if n_classes < 2 {
        return Err(Error::InvalidParameter(format!(
            "target '{target}' derived a single class; nothing to separate"
        )));
    }
    if config.family == ModelFamily::GradientBoosting && n_classes > 2 {
        return Err(Error::UnsupportedModel(format!(
            "gradient boosting here is binary but the target derived {n_classes} classes; \
             train with the random_forest family instead"
        )));
    }

    let (feature_columns, dropped_features) =
        select_features(&engineered, &target, config.near_zero_std);
    if feature_columns.is_empty() {
        return Err(Error::FeatureMismatch(
            "no usable feature columns after exclusions and variance filtering".to_string(),
        ));
    }

    let y = encoded_labels(&engineered)?;
    let x = engineered.to_matrix(&feature_columns)?;

    let (train_idx, test_idx) = stratified_split(&y, n_classes, config.test_fraction, config.seed);
    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(Error::InvalidParameter(format!(
            "split produced {} train / {} test rows; need more data",
            train_idx.len(),
            test_idx.len()
        )));
    }

    let x_train = x.select(Axis(0), &train_idx);
    let x_test = x.select(Axis(0), &test_idx);
    let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();

    let scaler = StandardScaler::fit(&x_train)?;
    let scaled_train = scaler.transform(&x_train)?;
    let scaled_test = scaler.transform(&x_test)?;

    let weights = class_weights(&y_train, n_classes);
    let sample_weights: Vec<f64> = y_train.iter().map(|&c| weights[c]).collect();
    let scale_pos = positive_scale(&weights);

    let model = fit_family(
        &scaled_train,
        &y_train,
        n_classes,
        &sample_weights,
        scale_pos,
        config,
    )?;

    let train_preds = model.predict(&scaled_train);
    let test_preds = model.predict(&scaled_test);
    let train_accuracy = accuracy(&y_train, &train_preds);
    let test_accuracy = accuracy(&y_test, &test_preds);

    let cv = cross_validate(&scaled_train, &y_train, n_classes, scale_pos, config)?;

    let confusion =
        ConfusionMatrix::from_predictions(&y_test, &test_preds, label_encoder.labels());
    let class_metrics = ClassificationMetrics::from_confusion_matrix(&confusion);

    let mut feature_importances: Vec<FeatureImportance> = feature_columns
        .iter()
        .zip(model.feature_importances())
        .map(|(name, importance)| FeatureImportance {
            feature: name.clone(),
            importance,
        })
        .collect();
    feature_importances.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if let Some(path) = &config.snapshot_path {
        write_csv(&engineered, path)?;
    }

    let report = TrainingReport {
        family: config.family.to_string(),
        trained_at: Utc::now(),
        target: target.clone(),
        target_kind,
        label_outcome: outcome,
        labels: label_encoder.labels().to_vec(),
        feature_columns: feature_columns.clone(),
        dropped_features,
        feature_rules,
        class_weights: weights,
        n_train: train_idx.len(),
        n_test: test_idx.len(),
        train_accuracy,
        test_accuracy,
        cv,
        confusion,
        metrics: class_metrics,
        feature_importances,
    };

    Ok(TrainOutput {
        model,
        scaler,
        feature_columns,
        encoders,
        label_encoder,
        target,
        target_kind,
        engineered,
        scaled_train,
        report,
    })
}

/// Feature columns after role, identifier, and variance exclusions
fn select_features(table: &Table, target: &str, near_zero_std: f64) -> (Vec<String>, Vec<String>) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for name in table.column_names() {
        if name == target
            || name == RISK_LABEL_COLUMN
            || name == RISK_ENCODED_COLUMN
            || name == ENGAGEMENT_COLUMN
        {
            continue;
        }
        let lower = name.to_lowercase();
        if IDENTIFIER_COLUMNS.iter().any(|id| *id == lower) {
            continue;
        }
        let values = table.column(name).unwrap_or(&[]);
        if column_std(values) > near_zero_std {
            kept.push(name.clone());
        } else {
            dropped.push(name.clone());
        }
    }
    (kept, dropped)
}

fn column_std(values: &[Value]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let nums: Vec<f64> = values.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect();
    let n = nums.len() as f64;
    let mean = nums.iter().sum::<f64>() / n;
    let var = nums.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}

fn encoded_labels(table: &Table) -> Result<Vec<usize>> {
    let col = table
        .column(RISK_ENCODED_COLUMN)
        .ok_or_else(|| Error::ColumnNotFound(RISK_ENCODED_COLUMN.to_string()))?;
    Ok(col
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as usize)
        .collect())
}

/// Balanced class weights: `n / (k * count_c)`, zero for absent classes
pub fn class_weights(y: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &c in y {
        if c < n_classes {
            counts[c] += 1;
        }
    }
    let n = y.len() as f64;
    let k = n_classes as f64;
    counts
        .iter()
        .map(|&count| {
            if count == 0 {
                0.0
            } else {
                n / (k * count as f64)
            }
        })
        .collect()
}

/// Boosting's positive-class scale: weight ratio class 1 over class 0
fn positive_scale(weights: &[f64]) -> f64 {
    if weights.len() == 2 && weights[0] > 0.0 {
        weights[1] / weights[0]
    } else {
        1.0
    }
}

/// Stratified split: per-class shuffle, proportional test allocation
///
/// Every class with at least two members sends at least one row to the
/// test split and keeps at least one in train. Index order within each
/// side is ascending, so downstream work is deterministic.
pub fn stratified_split(
    y: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in 0..n_classes {
        let mut idx: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == class)
            .map(|(i, _)| i)
            .collect();
        if idx.is_empty() {
            continue;
        }
        for i in (1..idx.len()).rev() {
            let j = rng.random_range(0..=i);
            idx.swap(i, j);
        }
        let n = idx.len();
        let n_test = if n >= 2 {
            (((n as f64) * test_fraction).round() as usize).clamp(1, n - 1)
        } else {
            0
        };
        test.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

fn fit_family(
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    sample_weights: &[f64],
    scale_pos: f64,
    config: &TrainConfig,
) -> Result<TrainedModel> {
    match config.family {
        ModelFamily::GradientBoosting => {
            let params = BoostParams {
                n_trees: config.n_trees.unwrap_or(100),
                max_depth: Some(config.max_depth.unwrap_or(6)),
                learning_rate: config.learning_rate.unwrap_or(0.1),
                scale_pos_weight: scale_pos,
                ..BoostParams::default()
            };
            Ok(TrainedModel::GradientBoosting(GradientBoosting::fit(
                x, y, params,
            )?))
        }
        ModelFamily::RandomForest => {
            let params = ForestParams {
                n_trees: config.n_trees.unwrap_or(100),
                max_depth: Some(config.max_depth.unwrap_or(10)),
                seed: config.seed,
                ..ForestParams::default()
            };
            Ok(TrainedModel::RandomForest(RandomForest::fit(
                x,
                y,
                sample_weights,
                n_classes,
                params,
            )?))
        }
        ModelFamily::Default => {
            let params = ForestParams {
                n_trees: config.n_trees.unwrap_or(100),
                max_depth: config.max_depth,
                seed: config.seed,
                ..ForestParams::default()
            };
            Ok(TrainedModel::RandomForest(RandomForest::fit(
                x,
                y,
                sample_weights,
                n_classes,
                params,
            )?))
        }
    }
}

/// K-fold accuracy over the training split
fn cross_validate(
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    scale_pos: f64,
    config: &TrainConfig,
) -> Result<CvSummary> {
    let folds = config.cv_folds.min(x.nrows());
    if folds < 2 {
        return Ok(CvSummary::from_scores(Vec::new()));
    }

    let mut scores = Vec::with_capacity(folds);
    for (train_idx, test_idx) in KFold::new(folds).with_seed(config.seed).split(x.nrows()) {
        if train_idx.is_empty() || test_idx.is_empty() {
            continue;
        }
        let fx = x.select(Axis(0), &train_idx);
        let fy: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let fold_weights = class_weights(&fy, n_classes);
        let fold_samples: Vec<f64> = fy.iter().map(|&c| fold_weights[c]).collect();

        let model = fit_family(&fx, &fy, n_classes, &fold_samples, scale_pos, config)?;
        let tx = x.select(Axis(0), &test_idx);
        let ty: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();
        scores.push(accuracy(&ty, &model.predict(&tx)));
    }
    Ok(CvSummary::from_scores(scores))
}

/// Fraction of positions where prediction matches truth
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    correct as f64 / y_true.len() as f64
}
