//! Online inference over a loaded bundle
//!
//! Records may omit columns the model trained on or carry extras; the
//! frozen feature list decides what the classifier sees. Categorical
//! cells re-encode through the persisted encoders with unseen keys
//! taking each encoder's unknown code, and a failing row in a batch
//! never takes the rest of the batch down with it.

use ndarray::Array2;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::explain::Explanation;
use crate::features::engineer_features;
use crate::preprocess::{
    engagement_for_label, ENGAGEMENT_COLUMN, RISK_ENCODED_COLUMN, RISK_LABEL_COLUMN,
};
use crate::schema::ColumnKind;
use crate::store::ModelArtifactBundle;
use crate::table::{Record, Table, Value};

/// Default cap on rows in one batch call
pub const DEFAULT_MAX_BATCH_ROWS: usize = 10_000;

/// A categorical value the persisted encoders never saw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnseenCategory {
    /// Column the value appeared in
    pub column: String,
    /// The offending value, as its category key
    pub value: String,
}

/// One scored record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Predicted risk label
    pub label: String,
    /// Probability of the predicted class, in percent
    pub confidence: f64,
    /// Estimated engagement in percent; present for numeric targets only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_score: Option<f64>,
    /// Values that fell back to an unknown code
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unseen_categories: Vec<UnseenCategory>,
}

/// One row of a batch response; exactly one of `prediction` and `error`
/// is set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    /// Caller-supplied or synthesized row identifier
    pub row_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Side-by-side result of a what-if call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Simulation {
    /// Prediction for the record as given
    pub original: Prediction,
    /// Prediction after the overrides
    pub modified: Prediction,
    /// Columns the overrides touched
    pub changed_columns: Vec<String>,
}

/// An explained record
#[derive(Debug, Clone, Serialize)]
pub struct RecordExplanation {
    /// Label of the explained class
    pub label: String,
    /// Additive decomposition of its prediction
    pub explanation: Explanation,
}

/// Score one raw record
pub fn predict(bundle: &ModelArtifactBundle, record: &Record) -> Result<Prediction> {
    let (scaled, unseen) = prepare(bundle, record)?;
    score_row(bundle, &scaled, unseen)
}

/// Score every row of a raw table, preserving input order
///
/// Row identifiers come from `id_column` where present and non-empty,
/// otherwise `row_<n>` counted from 1. A row exceeding cap is a caller
/// error; a row failing to score is that row's error alone.
pub fn predict_batch(
    bundle: &ModelArtifactBundle,
    table: &Table,
    id_column: Option<&str>,
    max_rows: usize,
) -> Result<Vec<BatchRow>> {
    if table.n_rows() > max_rows {
        return Err(Error::InvalidParameter(format!(
            "batch of {} rows exceeds the cap of {max_rows}",
            table.n_rows()
        )));
    }
    if let Some(column) = id_column {
        if !table.has_column(column) {
            return Err(Error::ColumnNotFound(column.to_string()));
        }
    }

    let ids = id_column.and_then(|c| table.column(c));
    let mut rows = Vec::with_capacity(table.n_rows());
    for i in 0..table.n_rows() {
        let row_id = ids
            .map(|col| col[i].to_field())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("row_{}", i + 1));
        match predict(bundle, &table.record(i)) {
            Ok(prediction) => rows.push(BatchRow {
                row_id,
                prediction: Some(prediction),
                error: None,
            }),
            Err(e) => rows.push(BatchRow {
                row_id,
                prediction: None,
                error: Some(e.to_string()),
            }),
        }
    }
    Ok(rows)
}

/// What-if analysis: apply column overrides and re-score
pub fn simulate(
    bundle: &ModelArtifactBundle,
    record: &Record,
    overrides: &Record,
) -> Result<Simulation> {
    let original = predict(bundle, record)?;
    let mut tweaked = record.clone();
    for (column, value) in overrides {
        tweaked.insert(column.clone(), value.clone());
    }
    let modified = predict(bundle, &tweaked)?;
    Ok(Simulation {
        original,
        modified,
        changed_columns: overrides.keys().cloned().collect(),
    })
}

/// Decompose one record's prediction into per-feature contributions
pub fn explain(
    bundle: &ModelArtifactBundle,
    record: &Record,
    class: Option<usize>,
) -> Result<RecordExplanation> {
    let explainer = bundle.explainer.as_ref().ok_or(Error::ExplainerUnavailable)?;
    let (scaled, _) = prepare(bundle, record)?;
    let explanation = explainer.explain(
        &bundle.model,
        scaled.row(0),
        &bundle.feature_columns,
        class,
    )?;
    let label = decode_label(bundle, explanation.class_index)?;
    Ok(RecordExplanation { label, explanation })
}

/// Run one record through the persisted transform chain
fn prepare(
    bundle: &ModelArtifactBundle,
    record: &Record,
) -> Result<(Array2<f64>, Vec<UnseenCategory>)> {
    let mut table = Table::from_records(std::slice::from_ref(record));
    let mut unseen = Vec::new();

    for (column, encoder) in &bundle.encoders {
        let Some(values) = table.column(column).map(|v| v.to_vec()) else {
            continue;
        };
        let encoded = values
            .iter()
            .map(|v| {
                let key = v.to_field();
                if !v.is_missing() && !encoder.is_known(&key) {
                    unseen.push(UnseenCategory {
                        column: column.clone(),
                        value: key.clone(),
                    });
                }
                Value::Float(f64::from(encoder.encode(&key)))
            })
            .collect();
        table.set_column(column, encoded)?;
    }

    let excluded = vec![
        bundle.metadata.target.clone(),
        RISK_LABEL_COLUMN.to_string(),
        RISK_ENCODED_COLUMN.to_string(),
        ENGAGEMENT_COLUMN.to_string(),
    ];
    engineer_features(&mut table, &excluded)?;
    check_feature_dtypes(&table, &bundle.feature_columns)?;

    let x = table.reindex_matrix(&bundle.feature_columns);
    let scaled = bundle.scaler.transform(&x)?;
    Ok((scaled, unseen))
}

/// A text cell in a frozen feature column cannot be reindexed
fn check_feature_dtypes(table: &Table, features: &[String]) -> Result<()> {
    for name in features {
        let Some(values) = table.column(name) else {
            continue;
        };
        for v in values {
            if let Value::Text(s) = v {
                return Err(Error::FeatureMismatch(format!(
                    "column '{name}' has non-numeric value '{s}'"
                )));
            }
        }
    }
    Ok(())
}

fn score_row(
    bundle: &ModelArtifactBundle,
    scaled: &Array2<f64>,
    unseen: Vec<UnseenCategory>,
) -> Result<Prediction> {
    let proba = bundle.model.predict_proba(scaled);
    let row = proba.row(0);

    let mut class = 0;
    for (c, p) in row.iter().enumerate() {
        if *p > row[class] {
            class = c;
        }
    }
    let label = decode_label(bundle, class)?;

    let engagement_score = if bundle.metadata.target_kind == ColumnKind::Numeric {
        engagement_class(bundle.label_encoder.labels()).map(|c| row[c] * 100.0)
    } else {
        None
    };

    Ok(Prediction {
        label,
        confidence: row[class] * 100.0,
        engagement_score,
        unseen_categories: unseen,
    })
}

fn decode_label(bundle: &ModelArtifactBundle, class: usize) -> Result<String> {
    bundle
        .label_encoder
        .decode(class as u32)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::InvalidParameter(format!("classifier produced class {class} with no label"))
        })
}

/// Class whose label carries the highest default engagement; its
/// probability doubles as the engagement estimate for numeric targets
fn engagement_class(labels: &[String]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, label) in labels.iter().enumerate() {
        let score = engagement_for_label(label);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}
