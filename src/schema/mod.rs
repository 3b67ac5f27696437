//! Schema inference over raw tables
//!
//! Classifies every column as numeric or categorical from observed values
//! and locates the training target by a keyword heuristic. Classification
//! is a pure function of per-column statistics, so the same stats that
//! drive dtype decisions also back the `inspect` report.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::Table;

/// Substring keywords that mark a column as a target candidate
pub const TARGET_KEYWORDS: &[&str] = &[
    "engage",
    "drop",
    "risk",
    "performance",
    "gpa",
    "grade",
    "status",
    "complete",
    "fail",
];

/// Broad dtype class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Every non-missing value is numeric
    Numeric,
    /// At least one non-missing value is not numeric
    Categorical,
}

/// Observed statistics for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Column name as it appears in the table
    pub name: String,
    /// Dtype class derived from the values below
    pub kind: ColumnKind,
    /// Non-missing value count
    pub count: usize,
    /// Missing value count
    pub missing: usize,
    /// Distinct non-missing values
    pub distinct: usize,
    /// Minimum, for numeric columns with data
    pub min: Option<f64>,
    /// Maximum, for numeric columns with data
    pub max: Option<f64>,
    /// Mean, for numeric columns with data
    pub mean: Option<f64>,
}

impl ColumnStats {
    /// Compute stats for one column of values
    pub fn from_values(name: &str, values: &[crate::table::Value]) -> Self {
        let mut count = 0usize;
        let mut missing = 0usize;
        let mut all_numeric = true;
        let mut distinct: BTreeSet<String> = BTreeSet::new();
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in values {
            if value.is_missing() {
                missing += 1;
                continue;
            }
            count += 1;
            distinct.insert(value.to_field());
            match value.as_f64() {
                Some(v) => {
                    sum += v;
                    min = min.min(v);
                    max = max.max(v);
                }
                None => all_numeric = false,
            }
        }

        let kind = if all_numeric {
            ColumnKind::Numeric
        } else {
            ColumnKind::Categorical
        };
        let has_numeric_data = kind == ColumnKind::Numeric && count > 0;
        Self {
            name: name.to_string(),
            kind,
            count,
            missing,
            distinct: distinct.len(),
            min: has_numeric_data.then_some(min),
            max: has_numeric_data.then_some(max),
            mean: has_numeric_data.then(|| sum / count as f64),
        }
    }

    /// True when the lower-cased name contains any target keyword
    pub fn is_target_candidate(&self) -> bool {
        let lower = self.name.to_lowercase();
        TARGET_KEYWORDS.iter().any(|kw| lower.contains(kw))
    }
}

/// Inferred schema: per-column stats in original column order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// One entry per column, original order
    pub columns: Vec<ColumnStats>,
}

impl Schema {
    /// Infer a schema from a table
    pub fn infer(table: &Table) -> Result<Self> {
        if table.is_empty() {
            return Err(Error::EmptyTable(
                "schema inference needs at least one row and one column".to_string(),
            ));
        }
        let columns = table
            .column_names()
            .iter()
            .map(|name| {
                let values = table.column(name).unwrap_or(&[]);
                ColumnStats::from_values(name, values)
            })
            .collect();
        Ok(Self { columns })
    }

    /// Stats for a named column
    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Dtype class of a named column
    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.column(name).map(|c| c.kind)
    }

    /// Names of numeric columns, original order
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Names of categorical columns, original order
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Categorical)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// All column names, original order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Human-oriented dataset report backing the `inspect` command
    pub fn describe(&self) -> SchemaReport {
        let candidates = self
            .columns
            .iter()
            .filter(|c| c.is_target_candidate())
            .map(|c| c.name.clone())
            .collect();
        SchemaReport {
            n_columns: self.columns.len(),
            detected_target: locate_target(self, None).ok(),
            target_candidates: candidates,
            columns: self.columns.clone(),
        }
    }
}

/// Serializable dataset summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    /// Total column count
    pub n_columns: usize,
    /// Target the heuristic would pick, if any
    pub detected_target: Option<String>,
    /// Every column whose name matches a target keyword
    pub target_candidates: Vec<String>,
    /// Full per-column stats
    pub columns: Vec<ColumnStats>,
}

/// Locate the target column
///
/// Precedence: an explicit override (which must exist) beats everything; a
/// column named exactly `dropout` (case-insensitive) beats the keyword scan;
/// otherwise the first column in original order whose lower-cased name
/// contains a target keyword wins. No match is an error listing every
/// inspected column.
pub fn locate_target(schema: &Schema, override_name: Option<&str>) -> Result<String> {
    if let Some(name) = override_name {
        return match schema.column(name) {
            Some(stats) => Ok(stats.name.clone()),
            None => Err(Error::ColumnNotFound(name.to_string())),
        };
    }

    if let Some(stats) = schema
        .columns
        .iter()
        .find(|c| c.name.to_lowercase() == "dropout")
    {
        return Ok(stats.name.clone());
    }

    schema
        .columns
        .iter()
        .find(|c| c.is_target_candidate())
        .map(|c| c.name.clone())
        .ok_or_else(|| Error::NoTargetFound {
            columns: schema.column_names(),
        })
}
