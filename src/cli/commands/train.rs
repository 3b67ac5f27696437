//! Train command implementation

use crate::cli::args::{apply_overrides, TrainArgs};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::PipelineSpec;
use crate::explain::TreeExplainer;
use crate::store::{save_bundle, ModelArtifactBundle};
use crate::table::read_csv;
use crate::train::train;

pub fn run_train(args: TrainArgs, level: LogLevel) -> Result<(), String> {
    // Resolve config file first, then layer CLI overrides on top
    let mut spec = match &args.config {
        Some(path) => PipelineSpec::load(path).map_err(|e| format!("Config error: {e}"))?,
        None => PipelineSpec::default(),
    };
    apply_overrides(&mut spec, &args);
    spec.validate().map_err(|e| format!("Config error: {e}"))?;

    if spec.data.path.as_os_str().is_empty() {
        return Err("No dataset given: pass DATA or set data.path in the config".to_string());
    }

    log(
        level,
        LogLevel::Normal,
        &format!("Training from {}", spec.data.path.display()),
    );

    if args.dry_run {
        log(
            level,
            LogLevel::Normal,
            "Dry run - config validated successfully",
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Family: {}", spec.model.family),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Seed: {}", spec.training.seed),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Test fraction: {}", spec.training.test_fraction),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Bundle: {}", spec.serving.artifacts.display()),
        );
        return Ok(());
    }

    let table = read_csv(&spec.data.path).map_err(|e| format!("Data error: {e}"))?;
    log(
        level,
        LogLevel::Verbose,
        &format!("  Loaded {} rows x {} columns", table.n_rows(), table.n_cols()),
    );

    let config = spec.train_config();
    let output = train(&table, spec.data.target.as_deref(), &config)
        .map_err(|e| format!("Training error: {e}"))?;

    let explainer = TreeExplainer::fit(&output.model, &output.scaled_train).ok();
    if explainer.is_none() {
        log(
            level,
            LogLevel::Verbose,
            "  Explainer unavailable; saving the bundle without one",
        );
    }

    let rendered = output.report.render();
    let bundle = ModelArtifactBundle::from_training(output, explainer);
    save_bundle(&bundle, &spec.serving.artifacts).map_err(|e| format!("Save error: {e}"))?;

    log(level, LogLevel::Normal, "");
    log(level, LogLevel::Normal, &rendered);
    log(
        level,
        LogLevel::Normal,
        &format!("Bundle saved to {}", spec.serving.artifacts.display()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::parse_args;
    use crate::cli::Command;
    use std::path::Path;

    fn write_students_csv(path: &Path, n: usize) {
        let mut csv = String::from("student_id,attendance_rate,gpa,study_hours,dropout\n");
        for i in 0..n {
            let noise = (i * 37 % 10) as f64 / 100.0;
            let dropped = i % 10 < 7;
            let (attendance, gpa, hours) = if dropped {
                (0.45 + noise, 2.1 + noise, 4.0 + noise)
            } else {
                (0.93 + noise, 3.6 + noise, 16.0 + noise)
            };
            csv.push_str(&format!(
                "S{i},{attendance:.2},{gpa:.2},{hours:.2},{}\n",
                u8::from(dropped)
            ));
        }
        std::fs::write(path, csv).unwrap();
    }

    fn train_args(argv: &[&str]) -> TrainArgs {
        let cli = parse_args(argv.iter().copied()).unwrap();
        match cli.command {
            Command::Train(args) => args,
            _ => panic!("expected train command"),
        }
    }

    #[test]
    fn test_run_train_requires_data() {
        let args = train_args(&["predecir", "train"]);
        let err = run_train(args, LogLevel::Quiet).unwrap_err();
        assert!(err.contains("No dataset"));
    }

    #[test]
    fn test_run_train_rejects_bad_fraction() {
        let args = train_args(&["predecir", "train", "x.csv", "--test-fraction", "1.5"]);
        let err = run_train(args, LogLevel::Quiet).unwrap_err();
        assert!(err.contains("Config error"));
    }

    #[test]
    fn test_run_train_dry_run_validates_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("pipeline.yaml");
        std::fs::write(&config, "data:\n  path: students.csv\n").unwrap();

        let config_arg = config.to_str().unwrap();
        let args = train_args(&["predecir", "train", "--config", config_arg, "--dry-run"]);
        run_train(args, LogLevel::Quiet).unwrap();
    }

    #[test]
    fn test_run_train_end_to_end_writes_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("students.csv");
        let bundle = dir.path().join("bundle");
        let snapshot = dir.path().join("engineered.csv");
        write_students_csv(&data, 40);

        let args = train_args(&[
            "predecir",
            "train",
            data.to_str().unwrap(),
            "--trees",
            "10",
            "--cv-folds",
            "2",
            "--output",
            bundle.to_str().unwrap(),
            "--snapshot",
            snapshot.to_str().unwrap(),
        ]);
        run_train(args, LogLevel::Quiet).unwrap();

        assert!(bundle.join("metadata.json").exists());
        assert!(bundle.join("classifier.bin").exists());
        assert!(snapshot.exists());
    }
}
