//! Predict command implementation

use std::path::Path;

use crate::cli::args::{OutputFormat, PredictArgs};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::infer::{predict_batch, BatchRow};
use crate::store::load_bundle;
use crate::table::{read_csv, write_csv, Table, Value};

pub fn run_predict(args: PredictArgs, level: LogLevel) -> Result<(), String> {
    let bundle = load_bundle(&args.model).map_err(|e| format!("Bundle error: {e}"))?;
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  Loaded {} bundle trained {} on target '{}'",
            bundle.metadata.family, bundle.metadata.trained_at, bundle.metadata.target
        ),
    );

    let table = read_csv(&args.data).map_err(|e| format!("Data error: {e}"))?;
    let rows = predict_batch(&bundle, &table, args.id_column.as_deref(), args.max_rows)
        .map_err(|e| format!("Prediction error: {e}"))?;

    for row in &rows {
        let Some(prediction) = &row.prediction else {
            continue;
        };
        for unseen in &prediction.unseen_categories {
            log(
                level,
                LogLevel::Verbose,
                &format!(
                    "  Row {}: unseen {} value '{}'",
                    row.row_id, unseen.column, unseen.value
                ),
            );
        }
    }

    match args.format {
        OutputFormat::Json => {
            let payload =
                serde_json::to_string_pretty(&rows).map_err(|e| format!("Output error: {e}"))?;
            println!("{payload}");
        }
        OutputFormat::Text => print_rows(&rows),
    }

    if let Some(path) = &args.output {
        write_rows_csv(&rows, path).map_err(|e| format!("Output error: {e}"))?;
        log(
            level,
            LogLevel::Normal,
            &format!("Predictions written to {}", path.display()),
        );
    }

    let failed = rows.iter().filter(|r| r.error.is_some()).count();
    log(
        level,
        LogLevel::Normal,
        &format!("Scored {} rows ({failed} failed)", rows.len()),
    );
    Ok(())
}

/// Render scored rows as an aligned text table
fn print_rows(rows: &[BatchRow]) {
    println!(
        "{:<16} {:<10} {:>10} {:>10}",
        "row", "risk", "confidence", "engagement"
    );
    for row in rows {
        match (&row.prediction, &row.error) {
            (Some(p), _) => {
                let engagement = p
                    .engagement_score
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
                println!(
                    "{:<16} {:<10} {:>10.1} {:>10}",
                    row.row_id, p.label, p.confidence, engagement
                );
            }
            (None, Some(error)) => println!("{:<16} error: {error}", row.row_id),
            (None, None) => {}
        }
    }
}

/// Persist scored rows as a CSV mirroring the text table
fn write_rows_csv(rows: &[BatchRow], path: &Path) -> crate::error::Result<()> {
    let ids = rows
        .iter()
        .map(|r| Value::Text(r.row_id.clone()))
        .collect();
    let labels = rows
        .iter()
        .map(|r| match &r.prediction {
            Some(p) => Value::Text(p.label.clone()),
            None => Value::Missing,
        })
        .collect();
    let confidence = rows
        .iter()
        .map(|r| match &r.prediction {
            Some(p) => Value::Float(p.confidence),
            None => Value::Missing,
        })
        .collect();
    let engagement = rows
        .iter()
        .map(|r| {
            r.prediction
                .as_ref()
                .and_then(|p| p.engagement_score)
                .map_or(Value::Missing, Value::Float)
        })
        .collect();
    let errors = rows
        .iter()
        .map(|r| {
            r.error
                .as_ref()
                .map_or(Value::Missing, |e| Value::Text(e.clone()))
        })
        .collect();

    let mut out = Table::new();
    out.push_column("row_id", ids)?;
    out.push_column("risk_level", labels)?;
    out.push_column("confidence", confidence)?;
    out.push_column("engagement_score", engagement)?;
    out.push_column("error", errors)?;
    write_csv(&out, path)
}
