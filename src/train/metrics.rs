//! Classification metrics for the held-out evaluation
//!
//! Confusion matrix and per-class precision/recall/F1 keyed by the
//! decoded label names, plus an sklearn-style text report. Everything
//! here serializes into the training report.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Averaging strategy for multi-class summaries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Average {
    /// Unweighted mean over classes
    Macro,
    /// Mean weighted by class support
    Weighted,
}

/// Confusion matrix over encoded classes, carrying label names
///
/// Element `[i][j]` counts samples with true class `i` predicted as `j`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
    labels: Vec<String>,
}

impl ConfusionMatrix {
    /// Build from encoded predictions; out-of-range classes are ignored
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Self {
        let n = labels.len();
        let mut matrix = vec![vec![0; n]; n];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t < n && p < n {
                matrix[t][p] += 1;
            }
        }
        Self {
            matrix,
            labels: labels.to_vec(),
        }
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Label names in class-index order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Count at `[true_class][predicted_class]`
    pub fn get(&self, true_class: usize, predicted_class: usize) -> usize {
        self.matrix[true_class][predicted_class]
    }

    /// Diagonal count for a class
    pub fn true_positives(&self, class: usize) -> usize {
        self.matrix[class][class]
    }

    /// Samples of other classes predicted as this class
    pub fn false_positives(&self, class: usize) -> usize {
        (0..self.n_classes())
            .filter(|&i| i != class)
            .map(|i| self.matrix[i][class])
            .sum()
    }

    /// Samples of this class predicted as another
    pub fn false_negatives(&self, class: usize) -> usize {
        (0..self.n_classes())
            .filter(|&j| j != class)
            .map(|j| self.matrix[class][j])
            .sum()
    }

    /// True instances of a class
    pub fn support(&self, class: usize) -> usize {
        self.matrix[class].iter().sum()
    }

    /// Total evaluated samples
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Fraction of samples on the diagonal
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.n_classes()).map(|i| self.matrix[i][i]).sum();
        correct as f64 / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Confusion matrix (rows true, columns predicted):")?;
        write!(f, "{:>12}", "")?;
        for label in &self.labels {
            write!(f, " {label:>10}")?;
        }
        writeln!(f)?;
        for (i, label) in self.labels.iter().enumerate() {
            write!(f, "{label:>12}")?;
            for j in 0..self.n_classes() {
                write!(f, " {:>10}", self.matrix[i][j])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Per-class precision, recall, and F1 with supports
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Label names in class-index order
    pub labels: Vec<String>,
    /// Per-class precision
    pub precision: Vec<f64>,
    /// Per-class recall
    pub recall: Vec<f64>,
    /// Per-class F1
    pub f1: Vec<f64>,
    /// Per-class true-instance counts
    pub support: Vec<usize>,
}

impl ClassificationMetrics {
    /// Derive per-class metrics from a confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix) -> Self {
        let n = cm.n_classes();
        let mut precision = Vec::with_capacity(n);
        let mut recall = Vec::with_capacity(n);
        let mut f1 = Vec::with_capacity(n);
        let mut support = Vec::with_capacity(n);

        for class in 0..n {
            let tp = cm.true_positives(class) as f64;
            let fp = cm.false_positives(class) as f64;
            let fn_ = cm.false_negatives(class) as f64;

            let p = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
            let r = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
            let f = if p + r > 0.0 {
                2.0 * p * r / (p + r)
            } else {
                0.0
            };

            precision.push(p);
            recall.push(r);
            f1.push(f);
            support.push(cm.support(class));
        }

        Self {
            labels: cm.labels().to_vec(),
            precision,
            recall,
            f1,
            support,
        }
    }

    /// Averaged precision
    pub fn precision_avg(&self, average: Average) -> f64 {
        self.averaged(&self.precision, average)
    }

    /// Averaged recall
    pub fn recall_avg(&self, average: Average) -> f64 {
        self.averaged(&self.recall, average)
    }

    /// Averaged F1
    pub fn f1_avg(&self, average: Average) -> f64 {
        self.averaged(&self.f1, average)
    }

    fn averaged(&self, values: &[f64], average: Average) -> f64 {
        match average {
            Average::Macro => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            Average::Weighted => {
                let total: usize = self.support.iter().sum();
                if total == 0 {
                    return 0.0;
                }
                values
                    .iter()
                    .zip(&self.support)
                    .map(|(v, s)| v * *s as f64)
                    .sum::<f64>()
                    / total as f64
            }
        }
    }
}

/// sklearn-style text report with per-class rows and a weighted average
pub fn classification_report(cm: &ConfusionMatrix) -> String {
    let metrics = ClassificationMetrics::from_confusion_matrix(cm);

    let mut report = String::new();
    report.push_str(&format!(
        "{:>12} {:>10} {:>10} {:>10} {:>10}\n",
        "", "precision", "recall", "f1-score", "support"
    ));
    report.push_str(&"-".repeat(56));
    report.push('\n');

    for (class, label) in metrics.labels.iter().enumerate() {
        report.push_str(&format!(
            "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
            label,
            metrics.precision[class],
            metrics.recall[class],
            metrics.f1[class],
            metrics.support[class]
        ));
    }

    report.push_str(&"-".repeat(56));
    report.push('\n');
    report.push_str(&format!(
        "{:>12} {:>10} {:>10} {:>10.2} {:>10}\n",
        "accuracy",
        "",
        "",
        cm.accuracy(),
        cm.total()
    ));
    report.push_str(&format!(
        "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
        "weighted avg",
        metrics.precision_avg(Average::Weighted),
        metrics.recall_avg(Average::Weighted),
        metrics.f1_avg(Average::Weighted),
        cm.total()
    ));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn labels2() -> Vec<String> {
        vec!["High".to_string(), "Low".to_string()]
    }

    #[test]
    fn test_confusion_counts() {
        let y_true = [0, 0, 1, 1, 1];
        let y_pred = [0, 1, 1, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred, &labels2());
        assert_eq!(cm.get(0, 0), 1);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(1, 0), 1);
        assert_eq!(cm.get(1, 1), 2);
        assert_eq!(cm.total(), 5);
        assert_eq!(cm.support(1), 3);
    }

    #[test]
    fn test_accuracy() {
        let y_true = [0, 0, 1, 1];
        let y_pred = [0, 0, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred, &labels2());
        assert_abs_diff_eq!(cm.accuracy(), 0.75);
    }

    #[test]
    fn test_per_class_precision_recall() {
        let y_true = [0, 0, 1, 1, 1];
        let y_pred = [0, 1, 1, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred, &labels2());
        let m = ClassificationMetrics::from_confusion_matrix(&cm);
        // class 0: tp 1, fp 1, fn 1
        assert_abs_diff_eq!(m.precision[0], 0.5);
        assert_abs_diff_eq!(m.recall[0], 0.5);
        assert_abs_diff_eq!(m.f1[0], 0.5);
        // class 1: tp 2, fp 1, fn 1
        assert_abs_diff_eq!(m.precision[1], 2.0 / 3.0);
        assert_abs_diff_eq!(m.recall[1], 2.0 / 3.0);
    }

    #[test]
    fn test_empty_class_metrics_are_zero_not_nan() {
        let labels = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        // class 2 never appears
        let y_true = [0, 1];
        let y_pred = [0, 1];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred, &labels);
        let m = ClassificationMetrics::from_confusion_matrix(&cm);
        assert_eq!(m.precision[2], 0.0);
        assert_eq!(m.recall[2], 0.0);
        assert_eq!(m.f1[2], 0.0);
        assert_eq!(m.support[2], 0);
    }

    #[test]
    fn test_weighted_average_uses_support() {
        let y_true = [0, 1, 1, 1];
        let y_pred = [0, 1, 1, 1];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred, &labels2());
        let m = ClassificationMetrics::from_confusion_matrix(&cm);
        assert_abs_diff_eq!(m.f1_avg(Average::Weighted), 1.0);
        assert_abs_diff_eq!(m.f1_avg(Average::Macro), 1.0);
    }

    #[test]
    fn test_report_contains_labels_and_accuracy() {
        let y_true = [0, 0, 1, 1];
        let y_pred = [0, 0, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred, &labels2());
        let report = classification_report(&cm);
        assert!(report.contains("High"));
        assert!(report.contains("Low"));
        assert!(report.contains("accuracy"));
        assert!(report.contains("weighted avg"));
    }

    #[test]
    fn test_display_lists_all_cells() {
        let y_true = [0, 1];
        let y_pred = [1, 1];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred, &labels2());
        let shown = format!("{cm}");
        assert!(shown.contains("High"));
        assert!(shown.contains("Low"));
    }
}
