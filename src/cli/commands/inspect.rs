//! Inspect command implementation

use crate::cli::args::{InspectArgs, OutputFormat};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::schema::{locate_target, ColumnKind, Schema, SchemaReport};
use crate::table::read_csv;

pub fn run_inspect(args: InspectArgs, level: LogLevel) -> Result<(), String> {
    let table = read_csv(&args.data).map_err(|e| format!("Data error: {e}"))?;
    let schema = Schema::infer(&table).map_err(|e| format!("Schema error: {e}"))?;

    let mut report = schema.describe();
    if args.target.is_some() {
        let target = locate_target(&schema, args.target.as_deref())
            .map_err(|e| format!("Target error: {e}"))?;
        report.detected_target = Some(target);
    }

    if args.format == OutputFormat::Json {
        let payload =
            serde_json::to_string_pretty(&report).map_err(|e| format!("Output error: {e}"))?;
        println!("{payload}");
        return Ok(());
    }

    log(
        level,
        LogLevel::Normal,
        &format!("Inspecting {} ({} rows)", args.data.display(), table.n_rows()),
    );
    print_report(&report);
    Ok(())
}

/// Render the dataset summary as an aligned text table
fn print_report(report: &SchemaReport) {
    println!("Columns: {}", report.n_columns);
    match &report.detected_target {
        Some(target) => println!("Target:  {target}"),
        None => println!("Target:  none detected"),
    }
    if !report.target_candidates.is_empty() {
        println!("Candidates: {}", report.target_candidates.join(", "));
    }

    println!(
        "\n{:<24} {:<12} {:>7} {:>8} {:>9} {:>10} {:>10} {:>10}",
        "column", "kind", "count", "missing", "distinct", "min", "max", "mean"
    );
    for column in &report.columns {
        let kind = match column.kind {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
        };
        println!(
            "{:<24} {:<12} {:>7} {:>8} {:>9} {:>10} {:>10} {:>10}",
            column.name,
            kind,
            column.count,
            column.missing,
            column.distinct,
            stat(column.min),
            stat(column.max),
            stat(column.mean)
        );
    }
}

/// Format an optional statistic, `-` when absent
fn stat(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::parse_args;
    use crate::cli::Command;

    fn inspect_args(argv: &[&str]) -> InspectArgs {
        let cli = parse_args(argv.iter().copied()).unwrap();
        match cli.command {
            Command::Inspect(args) => args,
            _ => panic!("expected inspect command"),
        }
    }

    #[test]
    fn test_run_inspect_missing_file() {
        let args = inspect_args(&["predecir", "inspect", "/nonexistent/data.csv"]);
        let err = run_inspect(args, LogLevel::Quiet).unwrap_err();
        assert!(err.contains("Data error"));
    }

    #[test]
    fn test_run_inspect_reports_target() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("students.csv");
        std::fs::write(&data, "age,gpa,dropout\n20,3.1,0\n21,2.0,1\n").unwrap();

        let args = inspect_args(&["predecir", "inspect", data.to_str().unwrap()]);
        run_inspect(args, LogLevel::Quiet).unwrap();
    }

    #[test]
    fn test_run_inspect_tolerates_no_target() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("plain.csv");
        std::fs::write(&data, "age,height\n20,170\n21,165\n").unwrap();

        // Without an explicit target the summary still renders
        let args = inspect_args(&["predecir", "inspect", data.to_str().unwrap()]);
        run_inspect(args, LogLevel::Quiet).unwrap();
    }

    #[test]
    fn test_run_inspect_rejects_absent_override() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("plain.csv");
        std::fs::write(&data, "age,height\n20,170\n").unwrap();

        let args = inspect_args(&[
            "predecir",
            "inspect",
            data.to_str().unwrap(),
            "--target",
            "absent",
        ]);
        let err = run_inspect(args, LogLevel::Quiet).unwrap_err();
        assert!(err.contains("Target error"));
    }
}
