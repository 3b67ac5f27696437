//! Raw-table preprocessing
//!
//! Turns a raw table into a model-ready one: missing numerics take the
//! column median, missing categoricals the column mode, categoricals are
//! integer-encoded with persisted encoders, and the located target column
//! is derived into `risk_level`, `risk_level_encoded`, and
//! `engagement_score` columns appended after the originals.

mod encoders;
mod labels;

pub use encoders::{CategoryEncoder, LabelEncoder};
pub use labels::{
    derive_labels, engagement_for_label, engagement_scores, LabelOutcome, MAX_DISCRETE_TARGET,
};

use std::collections::BTreeMap;

use crate::error::Result;
use crate::schema::{locate_target, ColumnKind, Schema};
use crate::table::{Table, Value};

/// Name of the derived label column
pub const RISK_LABEL_COLUMN: &str = "risk_level";
/// Name of the encoded label column
pub const RISK_ENCODED_COLUMN: &str = "risk_level_encoded";
/// Name of the derived engagement score column
pub const ENGAGEMENT_COLUMN: &str = "engagement_score";

/// Fill for categorical columns with no observed values
const FALLBACK_CATEGORY: &str = "unknown";

/// Result of preprocessing a raw table
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Imputed and encoded table with the three derived columns appended
    pub table: Table,
    /// Located target column name
    pub target: String,
    /// Dtype class of the target before derivation
    pub target_kind: ColumnKind,
    /// Fitted per-column categorical encoders, keyed by column name
    pub encoders: BTreeMap<String, CategoryEncoder>,
    /// Fitted encoder over the derived risk labels
    pub label_encoder: LabelEncoder,
    /// Which derivation route produced the labels
    pub outcome: LabelOutcome,
}

/// Preprocess a raw table for training
///
/// `target_override` bypasses target detection entirely; the named column
/// must exist.
pub fn preprocess(table: &Table, target_override: Option<&str>) -> Result<Preprocessed> {
    let schema = Schema::infer(table)?;
    let target = locate_target(&schema, target_override)?;
    let target_kind = schema
        .kind_of(&target)
        .unwrap_or(ColumnKind::Categorical);

    let mut out = table.clone();

    // Imputation over every column, target included
    for stats in &schema.columns {
        let values = out.column(&stats.name).unwrap_or(&[]).to_vec();
        let imputed = match stats.kind {
            ColumnKind::Numeric => impute_median(&values),
            ColumnKind::Categorical => impute_mode(&values),
        };
        out.set_column(&stats.name, imputed)?;
    }

    // Integer-encode categoricals, leaving the target column raw
    let mut encoders = BTreeMap::new();
    for name in schema.categorical_columns() {
        if name == target {
            continue;
        }
        let values = out.column(name).unwrap_or(&[]).to_vec();
        let keys: Vec<String> = values.iter().map(Value::to_field).collect();
        let encoder = CategoryEncoder::fit(keys.iter());
        let encoded = keys
            .iter()
            .map(|k| Value::Float(f64::from(encoder.encode(k))))
            .collect();
        out.set_column(name, encoded)?;
        encoders.insert(name.to_string(), encoder);
    }

    // Target derivation
    let target_values = out.column(&target).unwrap_or(&[]).to_vec();
    let (risk_labels, outcome) = derive_labels(&target_values, target_kind);
    let label_encoder = LabelEncoder::fit(risk_labels.iter());
    let scores = engagement_scores(&target_values, target_kind, &risk_labels);

    let label_cells = risk_labels
        .iter()
        .map(|l| Value::Text(l.clone()))
        .collect();
    let encoded_cells = risk_labels
        .iter()
        .map(|l| {
            let code = label_encoder.encode(l).unwrap_or(0);
            Value::Float(f64::from(code))
        })
        .collect();
    let score_cells = scores.into_iter().map(Value::Float).collect();

    upsert_column(&mut out, RISK_LABEL_COLUMN, label_cells)?;
    upsert_column(&mut out, RISK_ENCODED_COLUMN, encoded_cells)?;
    upsert_column(&mut out, ENGAGEMENT_COLUMN, score_cells)?;

    Ok(Preprocessed {
        table: out,
        target,
        target_kind,
        encoders,
        label_encoder,
        outcome,
    })
}

fn upsert_column(table: &mut Table, name: &str, values: Vec<Value>) -> Result<()> {
    if table.has_column(name) {
        table.set_column(name, values)
    } else {
        table.push_column(name, values)
    }
}

/// Replace missing cells with the column median
fn impute_median(values: &[Value]) -> Vec<Value> {
    let mut nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    nums.sort_by(|a, b| a.total_cmp(b));
    let median = if nums.is_empty() {
        0.0
    } else if nums.len() % 2 == 1 {
        nums[nums.len() / 2]
    } else {
        let hi = nums.len() / 2;
        (nums[hi - 1] + nums[hi]) / 2.0
    };
    values
        .iter()
        .map(|v| {
            if v.is_missing() {
                Value::Float(median)
            } else {
                v.clone()
            }
        })
        .collect()
}

/// Replace missing cells with the column mode, first-encountered on ties
fn impute_mode(values: &[Value]) -> Vec<Value> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        if value.is_missing() {
            continue;
        }
        let key = value.to_field();
        if !counts.contains_key(&key) {
            order.push(key.clone());
        }
        *counts.entry(key).or_insert(0) += 1;
    }
    // strictly-greater keeps the first-encountered key on ties
    let mut mode: Option<&String> = None;
    let mut best = 0usize;
    for key in &order {
        if counts[key] > best {
            best = counts[key];
            mode = Some(key);
        }
    }
    let mode = mode
        .cloned()
        .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
    values
        .iter()
        .map(|v| {
            if v.is_missing() {
                Value::Text(mode.clone())
            } else {
                v.clone()
            }
        })
        .collect()
}
