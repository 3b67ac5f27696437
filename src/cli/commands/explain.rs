//! Explain command implementation

use crate::cli::args::{ExplainArgs, OutputFormat};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::explain::AttributionSpace;
use crate::infer;
use crate::store::load_bundle;
use crate::table::read_csv;

pub fn run_explain(args: ExplainArgs, level: LogLevel) -> Result<(), String> {
    let bundle = load_bundle(&args.model).map_err(|e| format!("Bundle error: {e}"))?;
    let table = read_csv(&args.data).map_err(|e| format!("Data error: {e}"))?;
    if args.row == 0 || args.row > table.n_rows() {
        return Err(format!(
            "Row {} out of range: {} has rows 1..={}",
            args.row,
            args.data.display(),
            table.n_rows()
        ));
    }

    let record = table.record(args.row - 1);
    let explained =
        infer::explain(&bundle, &record, args.class).map_err(|e| format!("Explain error: {e}"))?;

    if args.format == OutputFormat::Json {
        let payload =
            serde_json::to_string_pretty(&explained).map_err(|e| format!("Output error: {e}"))?;
        println!("{payload}");
        return Ok(());
    }

    let explanation = &explained.explanation;
    let space = match explanation.space {
        AttributionSpace::Probability => "probability",
        AttributionSpace::LogOdds => "log-odds",
    };
    log(
        level,
        LogLevel::Normal,
        &format!("Explaining row {} of {}", args.row, args.data.display()),
    );
    println!(
        "Class:      {} (p = {:.3})",
        explained.label, explanation.probability
    );
    println!("Space:      {space}");
    println!("Baseline:   {:+.4}", explanation.baseline);
    println!("Bias:       {:+.4}", explanation.bias);
    println!("\nTop contributions:");
    for attribution in explanation.top(args.top) {
        println!(
            "  {:<36} {:+.4}",
            attribution.feature, attribution.contribution
        );
    }
    Ok(())
}
