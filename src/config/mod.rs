//! Declarative pipeline configuration
//!
//! A YAML file describes a whole run in sections; every field has a
//! default, so a minimal file names only the data path. CLI flags
//! override individual fields after the file loads.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::infer::DEFAULT_MAX_BATCH_ROWS;
use crate::model::ModelFamily;
use crate::train::TrainConfig;

/// Top-level pipeline description, one section per concern
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSpec {
    /// Input data
    pub data: DataSection,
    /// Classifier choice and hyperparameters
    pub model: ModelSection,
    /// Training procedure
    pub training: TrainingSection,
    /// Artifact location and serving limits
    pub serving: ServingSection,
}

/// Input data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Training CSV path
    pub path: PathBuf,

    /// Explicit target column; absent means heuristic detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Where to write the engineered-table CSV snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            target: None,
            snapshot: None,
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Model family: `gradient_boosting` | `random_forest` | `default`
    pub family: ModelFamily,

    /// Trees in the ensemble
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_trees: Option<usize>,

    /// Depth limit per tree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Boosting learning rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            family: ModelFamily::GradientBoosting,
            n_trees: None,
            max_depth: None,
            learning_rate: None,
        }
    }
}

/// Training procedure configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    /// Seed for every stochastic step
    pub seed: u64,

    /// Held-out fraction, stratified by class
    pub test_fraction: f64,

    /// Cross-validation folds over the training split
    pub cv_folds: usize,

    /// Features with standard deviation at or below this are dropped
    pub near_zero_std: f64,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            cv_folds: 5,
            near_zero_std: 0.01,
        }
    }
}

/// Artifact and serving configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingSection {
    /// Bundle directory written by training and read by inference
    pub artifacts: PathBuf,

    /// Hard cap on rows per batch call
    pub max_batch_rows: usize,
}

impl Default for ServingSection {
    fn default() -> Self {
        Self {
            artifacts: PathBuf::from("model_bundle"),
            max_batch_rows: DEFAULT_MAX_BATCH_ROWS,
        }
    }
}

impl PipelineSpec {
    /// Load and validate a spec from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let spec: PipelineSpec = serde_yaml::from_str(&raw)
            .map_err(|e| Error::Serialization(format!("config parse: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reject out-of-range fields before anything runs with them
    pub fn validate(&self) -> Result<()> {
        if !(self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0) {
            return Err(Error::InvalidParameter(format!(
                "test_fraction must be in (0, 1), got {}",
                self.training.test_fraction
            )));
        }
        if self.training.cv_folds < 2 {
            return Err(Error::InvalidParameter(format!(
                "cv_folds must be at least 2, got {}",
                self.training.cv_folds
            )));
        }
        if self.serving.max_batch_rows == 0 {
            return Err(Error::InvalidParameter(
                "max_batch_rows must be positive".to_string(),
            ));
        }
        if self.model.n_trees == Some(0) {
            return Err(Error::InvalidParameter(
                "n_trees must be positive".to_string(),
            ));
        }
        if self.model.learning_rate.is_some_and(|lr| lr <= 0.0) {
            return Err(Error::InvalidParameter(
                "learning_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Trainer view of this spec
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            family: self.model.family,
            seed: self.training.seed,
            test_fraction: self.training.test_fraction,
            cv_folds: self.training.cv_folds,
            near_zero_std: self.training.near_zero_std,
            n_trees: self.model.n_trees,
            max_depth: self.model.max_depth,
            learning_rate: self.model.learning_rate,
            snapshot_path: self.data.snapshot.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_full_spec_parses() {
        let yaml = r"
data:
  path: students.csv
  target: dropout
  snapshot: processed.csv

model:
  family: random_forest
  n_trees: 50
  max_depth: 8

training:
  seed: 7
  test_fraction: 0.25
  cv_folds: 3

serving:
  artifacts: out/bundle
  max_batch_rows: 500
";
        let spec: PipelineSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.data.path, PathBuf::from("students.csv"));
        assert_eq!(spec.data.target.as_deref(), Some("dropout"));
        assert_eq!(spec.model.family, ModelFamily::RandomForest);
        assert_eq!(spec.model.n_trees, Some(50));
        assert_eq!(spec.training.seed, 7);
        assert_eq!(spec.serving.max_batch_rows, 500);
        spec.validate().unwrap();
    }

    #[test]
    fn test_minimal_spec_uses_defaults() {
        let yaml = r"
data:
  path: students.csv
";
        let spec: PipelineSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.model.family, ModelFamily::GradientBoosting);
        assert!(spec.model.n_trees.is_none());
        assert_eq!(spec.training.seed, 42);
        assert_eq!(spec.training.test_fraction, 0.2);
        assert_eq!(spec.training.cv_folds, 5);
        assert_eq!(spec.serving.artifacts, PathBuf::from("model_bundle"));
        assert_eq!(spec.serving.max_batch_rows, DEFAULT_MAX_BATCH_ROWS);
    }

    #[test]
    fn test_bad_test_fraction_rejected() {
        let yaml = r"
training:
  test_fraction: 1.5
";
        let spec: PipelineSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            spec.validate(),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unknown_family_rejected_at_parse() {
        let yaml = r"
model:
  family: neural_net
";
        let parsed: std::result::Result<PipelineSpec, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_train_config_mapping() {
        let yaml = r"
data:
  path: students.csv
  snapshot: snap.csv
model:
  family: random_forest
  n_trees: 30
training:
  seed: 9
";
        let spec: PipelineSpec = serde_yaml::from_str(yaml).unwrap();
        let config = spec.train_config();
        assert_eq!(config.family, ModelFamily::RandomForest);
        assert_eq!(config.n_trees, Some(30));
        assert_eq!(config.seed, 9);
        assert_eq!(config.snapshot_path, Some(PathBuf::from("snap.csv")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "data:\n  path: students.csv").unwrap();
        let spec = PipelineSpec::load(file.path()).unwrap();
        assert_eq!(spec.data.path, PathBuf::from("students.csv"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = PipelineSpec::load(Path::new("/nonexistent/pipeline.yaml"));
        assert!(matches!(err, Err(Error::Io(_))));
    }
}
