//! Rule-driven feature engineering
//!
//! Derived features come from a fixed, ordered rule table rather than
//! ad-hoc column code, so the derivation set is auditable and each rule
//! is independently testable. A rule whose source columns are absent is
//! skipped, never an error: datasets expose whatever they expose.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::table::{Table, Value};

/// How a rule derives its feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Copy the first candidate column whose lower-cased name contains
    /// any of these substrings
    FirstMatch { patterns: &'static [&'static str] },
    /// Row-wise product of two previously derived features
    Product {
        left: &'static str,
        right: &'static str,
    },
    /// 1.0 where the named column is greater than zero, else 0.0
    PositiveFlag { source: &'static str },
}

/// One entry of the feature rule table
#[derive(Debug, Clone, Copy)]
pub struct FeatureRule {
    /// Name of the derived column
    pub name: &'static str,
    /// How it is derived
    pub derivation: Derivation,
}

/// The fixed rule table, applied in order
pub const FEATURE_RULES: &[FeatureRule] = &[
    FeatureRule {
        name: "attendance_rate",
        derivation: Derivation::FirstMatch {
            patterns: &["attend"],
        },
    },
    FeatureRule {
        name: "academic_performance",
        derivation: Derivation::FirstMatch {
            patterns: &["gpa", "grade", "mark", "score", "cgpa"],
        },
    },
    FeatureRule {
        name: "study_intensity",
        derivation: Derivation::FirstMatch {
            patterns: &["study", "hour", "time"],
        },
    },
    FeatureRule {
        name: "assignment_completion",
        derivation: Derivation::FirstMatch {
            patterns: &["assignment", "project", "submit"],
        },
    },
    FeatureRule {
        name: "activity_participation",
        derivation: Derivation::FirstMatch {
            patterns: &["activit"],
        },
    },
    FeatureRule {
        name: "attendance_performance_interaction",
        derivation: Derivation::Product {
            left: "attendance_rate",
            right: "academic_performance",
        },
    },
    FeatureRule {
        name: "study_assignment_interaction",
        derivation: Derivation::Product {
            left: "study_intensity",
            right: "assignment_completion",
        },
    },
    FeatureRule {
        name: "failure_risk",
        derivation: Derivation::PositiveFlag {
            source: "past_failures",
        },
    },
];

/// Outcome of applying the rule table to one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedRules {
    /// Rules that produced a column, with the source they resolved to
    pub applied: Vec<AppliedRule>,
    /// Rule names skipped for lack of a source column
    pub skipped: Vec<String>,
}

/// One successfully applied rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedRule {
    /// Derived column name
    pub name: String,
    /// Column(s) the rule read from
    pub sources: Vec<String>,
}

/// Apply the rule table in order, adding derived columns to the table
///
/// `excluded` columns never serve as pattern-match sources; callers pass
/// the target and the derived label columns so a derivation cannot alias
/// them under a new name.
pub fn engineer_features(table: &mut Table, excluded: &[String]) -> Result<AppliedRules> {
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for rule in FEATURE_RULES {
        let resolved = match rule.derivation {
            Derivation::FirstMatch { patterns } => {
                first_match(table, patterns, excluded).map(|source| {
                    let values = table.column(&source).unwrap_or(&[]).to_vec();
                    (vec![source], values)
                })
            }
            Derivation::Product { left, right } => {
                match (table.column(left), table.column(right)) {
                    (Some(a), Some(b)) => {
                        let values = a
                            .iter()
                            .zip(b)
                            .map(|(x, y)| {
                                match (x.as_f64(), y.as_f64()) {
                                    (Some(x), Some(y)) => Value::Float(x * y),
                                    _ => Value::Missing,
                                }
                            })
                            .collect();
                        Some((vec![left.to_string(), right.to_string()], values))
                    }
                    _ => None,
                }
            }
            Derivation::PositiveFlag { source } => table.column(source).map(|col| {
                let values = col
                    .iter()
                    .map(|v| {
                        let flag = v.as_f64().is_some_and(|x| x > 0.0);
                        Value::Float(if flag { 1.0 } else { 0.0 })
                    })
                    .collect();
                (vec![source.to_string()], values)
            }),
        };

        match resolved {
            Some((sources, values)) => {
                if table.has_column(rule.name) {
                    table.set_column(rule.name, values)?;
                } else {
                    table.push_column(rule.name, values)?;
                }
                applied.push(AppliedRule {
                    name: rule.name.to_string(),
                    sources,
                });
            }
            None => skipped.push(rule.name.to_string()),
        }
    }

    Ok(AppliedRules { applied, skipped })
}

/// First column, in table order, whose lower-cased name contains any
/// pattern and is not excluded
fn first_match(table: &Table, patterns: &[&str], excluded: &[String]) -> Option<String> {
    table
        .column_names()
        .iter()
        .find(|name| {
            if excluded.iter().any(|e| e == *name) {
                return false;
            }
            let lower = name.to_lowercase();
            patterns.iter().any(|p| lower.contains(p))
        })
        .cloned()
}
