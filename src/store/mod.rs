//! Bundle persistence
//!
//! A trained pipeline is a directory of independently decodable
//! artifacts plus a human-readable `metadata.json`. Saves stage into a
//! sibling temp directory and rename into place, so readers never see a
//! half-written bundle. Loads verify every required artifact up front
//! and report the first missing one.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::explain::TreeExplainer;
use crate::model::{StandardScaler, TrainedModel};
use crate::preprocess::{CategoryEncoder, LabelEncoder};
use crate::schema::ColumnKind;
use crate::train::TrainOutput;

/// Classifier artifact file name
pub const CLASSIFIER_FILE: &str = "classifier.bin";
/// Scaler artifact file name
pub const SCALER_FILE: &str = "scaler.bin";
/// Frozen feature list file name
pub const FEATURE_COLUMNS_FILE: &str = "feature_columns.bin";
/// Categorical encoder map file name
pub const ENCODERS_FILE: &str = "encoders.bin";
/// Label encoder file name
pub const LABEL_ENCODER_FILE: &str = "label_encoder.bin";
/// Optional explainer file name
pub const EXPLAINER_FILE: &str = "explainer.bin";
/// Training metadata file name
pub const METADATA_FILE: &str = "metadata.json";

const REQUIRED_FILES: &[&str] = &[
    CLASSIFIER_FILE,
    SCALER_FILE,
    FEATURE_COLUMNS_FILE,
    ENCODERS_FILE,
    LABEL_ENCODER_FILE,
    METADATA_FILE,
];

/// Training provenance stored beside the binary artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// When training finished
    pub trained_at: DateTime<Utc>,
    /// Model family name
    pub family: String,
    /// Target column the model was trained against
    pub target: String,
    /// Dtype class of the target
    pub target_kind: ColumnKind,
    /// Number of feature columns
    pub n_features: usize,
    /// Rows in the training split
    pub n_train: usize,
    /// Label names in class-index order
    pub labels: Vec<String>,
    /// Version of this crate at train time
    pub crate_version: String,
}

/// Everything inference and explanation need, loaded once and shared
/// immutably
#[derive(Debug, Clone)]
pub struct ModelArtifactBundle {
    /// The fitted classifier
    pub model: TrainedModel,
    /// Scaler fitted on the training split
    pub scaler: StandardScaler,
    /// Feature columns in model order
    pub feature_columns: Vec<String>,
    /// Per-column categorical encoders
    pub encoders: BTreeMap<String, CategoryEncoder>,
    /// Label encoder over the derived risk labels
    pub label_encoder: LabelEncoder,
    /// Path attributor, absent when construction failed
    pub explainer: Option<TreeExplainer>,
    /// Training provenance
    pub metadata: BundleMetadata,
}

impl ModelArtifactBundle {
    /// Assemble a bundle from a finished training run
    pub fn from_training(output: TrainOutput, explainer: Option<TreeExplainer>) -> Self {
        let metadata = BundleMetadata {
            trained_at: output.report.trained_at,
            family: output.report.family.clone(),
            target: output.target.clone(),
            target_kind: output.target_kind,
            n_features: output.feature_columns.len(),
            n_train: output.report.n_train,
            labels: output.report.labels.clone(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        Self {
            model: output.model,
            scaler: output.scaler,
            feature_columns: output.feature_columns,
            encoders: output.encoders,
            label_encoder: output.label_encoder,
            explainer,
            metadata,
        }
    }
}

/// Persist a bundle, atomically replacing whatever was at `dir`
pub fn save_bundle(bundle: &ModelArtifactBundle, dir: &Path) -> Result<()> {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::InvalidParameter(format!(
                "bundle path '{}' has no directory name",
                dir.display()
            ))
        })?;
    if let Some(parent) = dir.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // staging sits beside the destination so the rename stays on one
    // filesystem
    let staging = dir.with_file_name(format!("{name}.staging.{}", std::process::id()));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    encode_artifact(&bundle.model, &staging.join(CLASSIFIER_FILE))?;
    encode_artifact(&bundle.scaler, &staging.join(SCALER_FILE))?;
    encode_artifact(&bundle.feature_columns, &staging.join(FEATURE_COLUMNS_FILE))?;
    encode_artifact(&bundle.encoders, &staging.join(ENCODERS_FILE))?;
    encode_artifact(&bundle.label_encoder, &staging.join(LABEL_ENCODER_FILE))?;
    if let Some(explainer) = &bundle.explainer {
        encode_artifact(explainer, &staging.join(EXPLAINER_FILE))?;
    }
    let json = serde_json::to_string_pretty(&bundle.metadata)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    fs::write(staging.join(METADATA_FILE), json)?;

    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::rename(&staging, dir)?;
    Ok(())
}

/// Load a bundle; any missing required artifact fails the whole load
pub fn load_bundle(dir: &Path) -> Result<ModelArtifactBundle> {
    for required in REQUIRED_FILES {
        if !dir.join(required).exists() {
            return Err(Error::ModelNotLoaded {
                missing: required.to_string(),
            });
        }
    }

    let model: TrainedModel = decode_artifact(&dir.join(CLASSIFIER_FILE))?;
    let scaler: StandardScaler = decode_artifact(&dir.join(SCALER_FILE))?;
    let feature_columns: Vec<String> = decode_artifact(&dir.join(FEATURE_COLUMNS_FILE))?;
    let encoders: BTreeMap<String, CategoryEncoder> = decode_artifact(&dir.join(ENCODERS_FILE))?;
    let label_encoder: LabelEncoder = decode_artifact(&dir.join(LABEL_ENCODER_FILE))?;

    let explainer_path = dir.join(EXPLAINER_FILE);
    let explainer = if explainer_path.exists() {
        Some(decode_artifact(&explainer_path)?)
    } else {
        None
    };

    let json = fs::read_to_string(dir.join(METADATA_FILE))?;
    let metadata: BundleMetadata =
        serde_json::from_str(&json).map_err(|e| Error::Serialization(e.to_string()))?;

    Ok(ModelArtifactBundle {
        model,
        scaler,
        feature_columns,
        encoders,
        label_encoder,
        explainer,
        metadata,
    })
}

fn encode_artifact<T: bincode::Encode>(value: &T, path: &Path) -> Result<()> {
    let bytes = bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::Serialization(e.to_string()))?;
    fs::write(path, bytes)?;
    Ok(())
}

fn decode_artifact<T: bincode::Decode<()>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    let (value, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
        .map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ForestParams, RandomForest};
    use ndarray::Array2;

    fn fitted_bundle(n_trees: usize) -> (ModelArtifactBundle, Array2<f64>) {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i * 2 + j) as f64);
        let y: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let w = vec![1.0; 20];
        let params = ForestParams {
            n_trees,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&x, &y, &w, 2, params).unwrap();
        let model = TrainedModel::RandomForest(forest);
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();
        let explainer = TreeExplainer::fit(&model, &scaled).unwrap();

        let mut encoders = BTreeMap::new();
        encoders.insert(
            "campus".to_string(),
            CategoryEncoder::fit(&["north".to_string(), "south".to_string()]),
        );

        let bundle = ModelArtifactBundle {
            model,
            scaler,
            feature_columns: vec!["gpa".to_string(), "study_hours".to_string()],
            encoders,
            label_encoder: LabelEncoder::fit(&["High".to_string(), "Low".to_string()]),
            explainer: Some(explainer),
            metadata: BundleMetadata {
                trained_at: Utc::now(),
                family: "random_forest".to_string(),
                target: "dropout".to_string(),
                target_kind: ColumnKind::Numeric,
                n_features: 2,
                n_train: 20,
                labels: vec!["High".to_string(), "Low".to_string()],
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        (bundle, scaled)
    }

    #[test]
    fn test_round_trip_preserves_predictions() {
        let (bundle, scaled) = fitted_bundle(10);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle");

        save_bundle(&bundle, &path).unwrap();
        let loaded = load_bundle(&path).unwrap();

        assert_eq!(bundle.model.predict(&scaled), loaded.model.predict(&scaled));
        assert_eq!(loaded.feature_columns, bundle.feature_columns);
        assert_eq!(loaded.label_encoder, bundle.label_encoder);
        assert_eq!(loaded.encoders["campus"].categories().len(), 2);
        assert!(loaded.explainer.is_some());
        assert_eq!(loaded.metadata.family, "random_forest");
    }

    #[test]
    fn test_missing_required_artifact_fails() {
        let (bundle, _) = fitted_bundle(5);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle");
        save_bundle(&bundle, &path).unwrap();

        fs::remove_file(path.join(CLASSIFIER_FILE)).unwrap();
        match load_bundle(&path) {
            Err(Error::ModelNotLoaded { missing }) => assert_eq!(missing, CLASSIFIER_FILE),
            other => panic!("expected ModelNotLoaded, got {other:?}"),
        }
    }

    #[test]
    fn test_explainer_is_optional() {
        let (mut bundle, _) = fitted_bundle(5);
        bundle.explainer = None;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle");

        save_bundle(&bundle, &path).unwrap();
        assert!(!path.join(EXPLAINER_FILE).exists());
        let loaded = load_bundle(&path).unwrap();
        assert!(loaded.explainer.is_none());
    }

    #[test]
    fn test_save_replaces_existing_bundle() {
        let (first, _) = fitted_bundle(5);
        let (mut second, _) = fitted_bundle(7);
        second.metadata.family = "gradient_boosting".to_string();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle");
        save_bundle(&first, &path).unwrap();
        save_bundle(&second, &path).unwrap();

        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded.metadata.family, "gradient_boosting");

        // staging directory must not linger after the swap
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("staging"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_metadata_json_is_human_readable() {
        let (bundle, _) = fitted_bundle(5);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle");
        save_bundle(&bundle, &path).unwrap();

        let raw = fs::read_to_string(path.join(METADATA_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["family"], "random_forest");
        assert_eq!(value["labels"][0], "High");
    }

    #[test]
    fn test_load_from_missing_directory() {
        let err = load_bundle(Path::new("/nonexistent/bundle"));
        assert!(matches!(err, Err(Error::ModelNotLoaded { .. })));
    }
}
