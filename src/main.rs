//! Predecir CLI
//!
//! Command-line entry point for the predecir library.
//!
//! # Usage
//!
//! ```bash
//! # Summarize a dataset and the detected target
//! predecir inspect students.csv
//!
//! # Train with built-in defaults
//! predecir train students.csv --output model_bundle
//!
//! # Train from a YAML pipeline config, overriding the family
//! predecir train --config pipeline.yaml --family random_forest
//!
//! # Score new records
//! predecir predict incoming.csv --model model_bundle --id-column student_id
//!
//! # Explain the third row of a batch
//! predecir explain incoming.csv --model model_bundle --row 3
//! ```

use clap::Parser;
use predecir::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
