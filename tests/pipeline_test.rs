//! End-to-end pipeline integration tests
//!
//! Exercise the full train/save/load/predict cycle on a synthetic student
//! cohort with a 70/30 dropout imbalance, plus the failure modes a caller
//! hits first: missing targets, unseen categories, and oversized batches.

use predecir::error::Error;
use predecir::explain::{AttributionSpace, TreeExplainer};
use predecir::infer::{self, predict, predict_batch, simulate};
use predecir::model::ModelFamily;
use predecir::schema::{locate_target, Schema};
use predecir::store::{load_bundle, save_bundle, ModelArtifactBundle};
use predecir::table::{read_csv, read_csv_reader, Record, Table, Value};
use predecir::train::{train, TrainConfig};

/// Synthetic cohort: 70% of rows drop out, with attendance, GPA, and study
/// hours clearly separating the two groups.
fn students_csv(n: usize) -> String {
    let mut csv = String::from("student_id,name,attendance_rate,gpa,study_hours,campus,dropout\n");
    for i in 0..n {
        let noise = (i * 37 % 10) as f64 / 100.0;
        let dropped = i % 10 < 7;
        let campus = ["north", "south", "east"][i % 3];
        let (attendance, gpa, hours) = if dropped {
            (0.45 + noise, 2.0 + noise, 4.0 + noise)
        } else {
            (0.92 + noise, 3.5 + noise, 15.0 + noise)
        };
        csv.push_str(&format!(
            "S{i:03},student {i},{attendance:.2},{gpa:.2},{hours:.2},{campus},{}\n",
            u8::from(dropped)
        ));
    }
    csv
}

fn students_table(n: usize) -> Table {
    read_csv_reader(students_csv(n).as_bytes()).unwrap()
}

fn fast_config() -> TrainConfig {
    TrainConfig {
        n_trees: Some(20),
        cv_folds: 2,
        ..TrainConfig::default()
    }
}

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// A row shaped like the dropped-out majority of the training cohort
fn dropped_profile() -> Record {
    record(&[
        ("attendance_rate", Value::Float(0.45)),
        ("gpa", Value::Float(2.0)),
        ("study_hours", Value::Float(4.0)),
        ("campus", Value::Text("north".to_string())),
    ])
}

/// A row shaped like the retained minority
fn retained_profile() -> Record {
    record(&[
        ("attendance_rate", Value::Float(0.95)),
        ("gpa", Value::Float(3.8)),
        ("study_hours", Value::Float(16.0)),
        ("campus", Value::Text("south".to_string())),
    ])
}

fn trained_bundle(n: usize) -> ModelArtifactBundle {
    let table = students_table(n);
    let output = train(&table, None, &fast_config()).unwrap();
    let explainer = TreeExplainer::fit(&output.model, &output.scaled_train).ok();
    ModelArtifactBundle::from_training(output, explainer)
}

#[test]
fn test_full_cycle_roundtrip_predictions_match() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle");

    let bundle = trained_bundle(100);
    save_bundle(&bundle, &path).unwrap();
    let restored = load_bundle(&path).unwrap();

    let fresh = students_table(100);
    for i in 0..10 {
        let row = fresh.record(i);
        let before = predict(&bundle, &row).unwrap();
        let after = predict(&restored, &row).unwrap();
        assert_eq!(before, after, "row {i} diverged after reload");
    }
}

#[test]
fn test_majority_profile_scores_high_risk() {
    let bundle = trained_bundle(100);

    // dropout=1 is the larger of the two target values, so it maps to High
    let prediction = predict(&bundle, &dropped_profile()).unwrap();
    assert_eq!(prediction.label, "High");
    assert!(
        prediction.confidence >= 50.0,
        "binary argmax confidence was {}",
        prediction.confidence
    );

    let prediction = predict(&bundle, &retained_profile()).unwrap();
    assert_eq!(prediction.label, "Low");
}

#[test]
fn test_predict_is_idempotent() {
    let bundle = trained_bundle(60);
    let row = dropped_profile();
    let first = predict(&bundle, &row).unwrap();
    let second = predict(&bundle, &row).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unseen_category_still_scores() {
    let bundle = trained_bundle(60);
    let mut row = dropped_profile();
    row.insert("campus".to_string(), Value::Text("pluto".to_string()));

    let prediction = predict(&bundle, &row).unwrap();
    assert_eq!(prediction.unseen_categories.len(), 1);
    assert_eq!(prediction.unseen_categories[0].column, "campus");
    assert_eq!(prediction.unseen_categories[0].value, "pluto");
    assert!(!prediction.label.is_empty());
}

#[test]
fn test_missing_and_extra_columns_tolerated() {
    let bundle = trained_bundle(60);

    // Subset: a missing feature fills as zero instead of failing
    let mut subset = dropped_profile();
    subset.remove("study_hours");
    predict(&bundle, &subset).unwrap();

    // Superset: unknown columns are dropped during reindexing
    let mut superset = dropped_profile();
    superset.insert("shoe_size".to_string(), Value::Float(42.0));
    predict(&bundle, &superset).unwrap();
}

#[test]
fn test_engagement_tracks_risk_for_numeric_targets() {
    let bundle = trained_bundle(100);

    let risky = predict(&bundle, &dropped_profile()).unwrap();
    let safe = predict(&bundle, &retained_profile()).unwrap();

    let risky_engagement = risky.engagement_score.unwrap();
    let safe_engagement = safe.engagement_score.unwrap();
    assert!(
        safe_engagement > risky_engagement,
        "retained profile should look more engaged: {safe_engagement} vs {risky_engagement}"
    );
}

#[test]
fn test_simulate_reports_changed_columns() {
    let bundle = trained_bundle(100);
    let overrides = record(&[
        ("attendance_rate", Value::Float(0.95)),
        ("study_hours", Value::Float(16.0)),
        ("gpa", Value::Float(3.8)),
    ]);

    let result = simulate(&bundle, &dropped_profile(), &overrides).unwrap();
    assert_eq!(result.original.label, "High");
    assert_eq!(result.modified.label, "Low");
    assert_eq!(
        result.changed_columns,
        vec!["attendance_rate", "gpa", "study_hours"]
    );
}

#[test]
fn test_explanation_is_additive() {
    let bundle = trained_bundle(100);
    let explained = infer::explain(&bundle, &dropped_profile(), None).unwrap();
    let explanation = &explained.explanation;

    let total: f64 = explanation.bias
        + explanation
            .attributions
            .iter()
            .map(|a| a.contribution)
            .sum::<f64>();
    // Boosting explanations decompose the log-odds margin
    assert_eq!(explanation.space, AttributionSpace::LogOdds);
    let recovered = 1.0 / (1.0 + (-total).exp());
    assert!(
        (recovered - explanation.probability).abs() < 1e-6,
        "decomposition drifted: {recovered} vs {}",
        explanation.probability
    );
}

#[test]
fn test_batch_synthesizes_row_ids() {
    let bundle = trained_bundle(60);
    let batch = students_table(5);

    let rows = predict_batch(&bundle, &batch, None, 100).unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.row_id.as_str()).collect();
    assert_eq!(ids, vec!["row_1", "row_2", "row_3", "row_4", "row_5"]);

    let rows = predict_batch(&bundle, &batch, Some("student_id"), 100).unwrap();
    assert_eq!(rows[0].row_id, "S000");
    assert!(rows.iter().all(|r| r.prediction.is_some()));
}

#[test]
fn test_batch_cap_enforced() {
    let bundle = trained_bundle(60);
    let batch = students_table(30);
    let err = predict_batch(&bundle, &batch, None, 5).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
}

#[test]
fn test_no_keyword_dataset_reports_all_columns() {
    let csv = "age,height,weight\n20,170,60\n21,165,55\n22,180,80\n";
    let table = read_csv_reader(csv.as_bytes()).unwrap();

    let err = train(&table, None, &fast_config()).unwrap_err();
    match err {
        Error::NoTargetFound { columns } => {
            assert_eq!(columns, vec!["age", "height", "weight"]);
        }
        other => panic!("expected NoTargetFound, got {other}"),
    }

    // The schema-level heuristic reports the same outcome
    let schema = Schema::infer(&table).unwrap();
    assert!(locate_target(&schema, None).is_err());
}

#[test]
fn test_multiclass_boosting_rejected_with_forest_hint() {
    let mut csv = String::from("student_id,hours_online,grade\n");
    for i in 0..60 {
        csv.push_str(&format!("S{i},{}.5,{}\n", 3 + i % 9, 1 + i % 6));
    }
    let table = read_csv_reader(csv.as_bytes()).unwrap();

    let err = train(&table, None, &fast_config()).unwrap_err();
    match err {
        Error::UnsupportedModel(msg) => assert!(msg.contains("random_forest")),
        other => panic!("expected UnsupportedModel, got {other}"),
    }

    // The suggested family handles three classes
    let config = TrainConfig {
        family: ModelFamily::RandomForest,
        ..fast_config()
    };
    let output = train(&table, None, &config).unwrap();
    assert_eq!(output.label_encoder.labels().len(), 3);
}

#[test]
fn test_snapshot_contains_derived_columns() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("engineered.csv");

    let table = students_table(60);
    let config = TrainConfig {
        snapshot_path: Some(snapshot.clone()),
        ..fast_config()
    };
    train(&table, None, &config).unwrap();

    let written = read_csv(&snapshot).unwrap();
    assert_eq!(written.n_rows(), 60);
    assert!(written.has_column("risk_level"));
    assert!(written.has_column("risk_level_encoded"));
    assert!(written.has_column("engagement_score"));
    assert!(written.has_column("attendance_rate"));
}

#[test]
fn test_explicit_target_override_wins() {
    // Both gpa and dropout match the keyword list; the override decides
    let mut csv = String::from("gpa,custom_flag,dropout\n");
    for i in 0..40 {
        csv.push_str(&format!("{}.1,{},{}\n", 2 + i % 2, i % 2, (i + 1) % 2));
    }
    let table = read_csv_reader(csv.as_bytes()).unwrap();

    let output = train(&table, Some("custom_flag"), &fast_config()).unwrap();
    assert_eq!(output.target, "custom_flag");
    assert_eq!(output.report.target, "custom_flag");
}

#[test]
fn test_metadata_survives_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle");

    let bundle = trained_bundle(60);
    save_bundle(&bundle, &path).unwrap();
    let restored = load_bundle(&path).unwrap();

    assert_eq!(restored.metadata.target, "dropout");
    assert_eq!(restored.metadata.family, bundle.metadata.family);
    assert_eq!(restored.metadata.labels, vec!["High", "Low"]);
    assert_eq!(restored.metadata.n_features, restored.feature_columns.len());
    assert!(restored.encoders.contains_key("campus"));
}
