//! CLI command implementations

mod explain;
mod inspect;
mod predict;
mod train;

use crate::cli::args::{Cli, Command};
use crate::cli::LogLevel;

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    // Configure output based on verbose/quiet flags
    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };

    match cli.command {
        Command::Train(args) => train::run_train(args, log_level),
        Command::Predict(args) => predict::run_predict(args, log_level),
        Command::Explain(args) => explain::run_explain(args, log_level),
        Command::Inspect(args) => inspect::run_inspect(args, log_level),
    }
}
