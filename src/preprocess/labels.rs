//! Target-to-label derivation
//!
//! A raw target column becomes the categorical risk label by one of four
//! routes: a two-valued numeric target maps straight to Low/High, a
//! low-cardinality numeric target is bucketed into equal-frequency
//! quantile bands, a degenerate bucketing falls back to stringified
//! values, and everything else passes through as identity labels.

use serde::{Deserialize, Serialize};

use crate::schema::ColumnKind;
use crate::table::Value;

/// Highest cardinality still treated as a discrete numeric target
pub const MAX_DISCRETE_TARGET: usize = 10;

/// Bucket names in ascending target order
const BUCKET_LABELS: [&str; 3] = ["Low", "Medium", "High"];

/// How the target column became risk labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOutcome {
    /// Two-valued numeric target: smaller value is Low, larger is High
    BinaryMapped,
    /// Equal-frequency quantile buckets; degraded when duplicate edges
    /// collapsed the band count below three
    Bucketed { n_buckets: usize, degraded: bool },
    /// Bucketing degenerated to a single band; values used verbatim
    StringFallback,
    /// High-cardinality or non-numeric target used verbatim
    Identity,
}

/// Derive one risk label per target value
pub fn derive_labels(values: &[Value], kind: ColumnKind) -> (Vec<String>, LabelOutcome) {
    if kind == ColumnKind::Numeric {
        let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        if nums.len() == values.len() {
            let mut distinct = nums.clone();
            distinct.sort_by(|a, b| a.total_cmp(b));
            distinct.dedup();

            if distinct.len() == 2 {
                let labels = nums
                    .iter()
                    .map(|v| {
                        if *v == distinct[0] {
                            "Low".to_string()
                        } else {
                            "High".to_string()
                        }
                    })
                    .collect();
                return (labels, LabelOutcome::BinaryMapped);
            }
            if distinct.len() <= MAX_DISCRETE_TARGET {
                return bucket_labels(&nums, &distinct, values);
            }
        }
    }
    let labels = values.iter().map(Value::to_field).collect();
    (labels, LabelOutcome::Identity)
}

/// Equal-frequency bucketing with duplicate-edge collapse
fn bucket_labels(
    nums: &[f64],
    sorted_distinct: &[f64],
    raw: &[Value],
) -> (Vec<String>, LabelOutcome) {
    let mut sorted = nums.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut edges = vec![
        quantile(&sorted, 0.0),
        quantile(&sorted, 1.0 / 3.0),
        quantile(&sorted, 2.0 / 3.0),
        quantile(&sorted, 1.0),
    ];
    edges.dedup_by(|a, b| a == b);
    let n_buckets = edges.len().saturating_sub(1);

    if n_buckets < 2 || sorted_distinct.len() < 2 {
        let labels = raw.iter().map(Value::to_field).collect();
        return (labels, LabelOutcome::StringFallback);
    }

    let names: Vec<&str> = if n_buckets == 2 {
        vec![BUCKET_LABELS[0], BUCKET_LABELS[2]]
    } else {
        BUCKET_LABELS.to_vec()
    };
    let labels = nums
        .iter()
        .map(|v| {
            let mut bucket = n_buckets - 1;
            for i in 0..n_buckets {
                if *v <= edges[i + 1] {
                    bucket = i;
                    break;
                }
            }
            names[bucket].to_string()
        })
        .collect();
    (
        labels,
        LabelOutcome::Bucketed {
            n_buckets,
            degraded: n_buckets < 3,
        },
    )
}

/// Linear-interpolation quantile over sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Display engagement score for a risk label
pub fn engagement_for_label(label: &str) -> f64 {
    match label {
        "Low" => 85.0,
        "Medium" => 65.0,
        "High" => 35.0,
        _ => 50.0,
    }
}

/// Per-row engagement score column
///
/// A numeric target contributes its raw value; otherwise the label maps
/// through the fixed score table.
pub fn engagement_scores(values: &[Value], kind: ColumnKind, labels: &[String]) -> Vec<f64> {
    if kind == ColumnKind::Numeric {
        values
            .iter()
            .map(|v| v.as_f64().unwrap_or(50.0))
            .collect()
    } else {
        labels.iter().map(|l| engagement_for_label(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn floats(vals: &[f64]) -> Vec<Value> {
        vals.iter().map(|v| Value::Float(*v)).collect()
    }

    // ============ Unit Tests ============

    #[test]
    fn test_binary_zero_one_maps_low_high() {
        let (labels, outcome) = derive_labels(
            &floats(&[0.0, 1.0, 0.0, 1.0, 1.0]),
            ColumnKind::Numeric,
        );
        assert_eq!(outcome, LabelOutcome::BinaryMapped);
        assert_eq!(labels, vec!["Low", "High", "Low", "High", "High"]);
    }

    #[test]
    fn test_binary_arbitrary_values_order_by_magnitude() {
        let (labels, outcome) = derive_labels(&floats(&[7.0, 3.0, 7.0]), ColumnKind::Numeric);
        assert_eq!(outcome, LabelOutcome::BinaryMapped);
        assert_eq!(labels, vec!["High", "Low", "High"]);
    }

    #[test]
    fn test_low_cardinality_buckets_three_bands() {
        let values: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        let (labels, outcome) = derive_labels(&floats(&values), ColumnKind::Numeric);
        assert_eq!(
            outcome,
            LabelOutcome::Bucketed {
                n_buckets: 3,
                degraded: false
            }
        );
        assert_eq!(labels[0], "Low");
        assert_eq!(labels[4], "Medium");
        assert_eq!(labels[8], "High");
        for label in &labels {
            assert!(BUCKET_LABELS.contains(&label.as_str()));
        }
    }

    #[test]
    fn test_skewed_values_collapse_edges() {
        // mass on one value pushes two quantile edges together
        let mut values = vec![1.0; 20];
        values.extend([2.0, 3.0]);
        let (labels, outcome) = derive_labels(&floats(&values), ColumnKind::Numeric);
        match outcome {
            LabelOutcome::Bucketed { n_buckets, degraded } => {
                assert!(degraded);
                assert_eq!(n_buckets, 2);
                assert_eq!(labels[0], "Low");
                assert_eq!(labels[21], "High");
            }
            LabelOutcome::StringFallback => {}
            other => panic!("expected degraded bucketing, got {other:?}"),
        }
    }

    #[test]
    fn test_single_value_falls_back_to_strings() {
        let (labels, outcome) = derive_labels(&floats(&[5.0, 5.0, 5.0]), ColumnKind::Numeric);
        assert_eq!(outcome, LabelOutcome::StringFallback);
        assert_eq!(labels, vec!["5", "5", "5"]);
    }

    #[test]
    fn test_high_cardinality_identity() {
        let values: Vec<f64> = (0..30).map(|v| v as f64).collect();
        let (labels, outcome) = derive_labels(&floats(&values), ColumnKind::Numeric);
        assert_eq!(outcome, LabelOutcome::Identity);
        assert_eq!(labels[3], "3");
        assert_eq!(labels.len(), 30);
    }

    #[test]
    fn test_non_numeric_identity() {
        let values = vec![
            Value::Text("Low".to_string()),
            Value::Text("Critical".to_string()),
        ];
        let (labels, outcome) = derive_labels(&values, ColumnKind::Categorical);
        assert_eq!(outcome, LabelOutcome::Identity);
        assert_eq!(labels, vec!["Low", "Critical"]);
    }

    #[test]
    fn test_engagement_score_table() {
        assert_eq!(engagement_for_label("Low"), 85.0);
        assert_eq!(engagement_for_label("Medium"), 65.0);
        assert_eq!(engagement_for_label("High"), 35.0);
        assert_eq!(engagement_for_label("Critical"), 50.0);
    }

    #[test]
    fn test_engagement_scores_numeric_passthrough() {
        let values = floats(&[0.0, 1.0]);
        let labels = vec!["Low".to_string(), "High".to_string()];
        let scores = engagement_scores(&values, ColumnKind::Numeric, &labels);
        assert_eq!(scores, vec![0.0, 1.0]);
    }

    #[test]
    fn test_engagement_scores_categorical_mapped() {
        let values = vec![Value::Text("a".to_string()), Value::Text("b".to_string())];
        let labels = vec!["High".to_string(), "Other".to_string()];
        let scores = engagement_scores(&values, ColumnKind::Categorical, &labels);
        assert_eq!(scores, vec![35.0, 50.0]);
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
        assert_eq!(quantile(&sorted, 0.5), 2.5);
    }

    // ============ Property Tests ============

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_one_label_per_value(values in prop::collection::vec(-100f64..100.0, 1..80)) {
            let (labels, _) = derive_labels(&floats(&values), ColumnKind::Numeric);
            prop_assert_eq!(labels.len(), values.len());
        }

        #[test]
        fn prop_bucketed_labels_stay_in_vocabulary(values in prop::collection::vec(0f64..10.0, 3..60)) {
            let (labels, outcome) = derive_labels(&floats(&values), ColumnKind::Numeric);
            if matches!(outcome, LabelOutcome::Bucketed { .. } | LabelOutcome::BinaryMapped) {
                for label in &labels {
                    prop_assert!(BUCKET_LABELS.contains(&label.as_str()));
                }
            }
        }

        #[test]
        fn prop_binary_targets_yield_exactly_two_labels(
            flips in prop::collection::vec(prop::bool::ANY, 2..100)
        ) {
            prop_assume!(flips.iter().any(|b| *b) && flips.iter().any(|b| !*b));
            let values: Vec<f64> = flips.iter().map(|b| if *b { 1.0 } else { 0.0 }).collect();
            let (labels, outcome) = derive_labels(&floats(&values), ColumnKind::Numeric);
            prop_assert_eq!(outcome, LabelOutcome::BinaryMapped);
            let mut unique: Vec<&str> = labels.iter().map(String::as_str).collect();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique, vec!["High", "Low"]);
        }
    }
}
