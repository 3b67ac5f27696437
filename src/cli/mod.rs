//! Command-line interface
//!
//! Thin wrapper over the library: clap argument definitions, a
//! verbosity-gated logger, and one module per subcommand.

mod args;
mod commands;
mod logging;

pub use args::{
    apply_overrides, parse_args, Cli, Command, ExplainArgs, InspectArgs, OutputFormat, PredictArgs,
    TrainArgs,
};
pub use commands::run_command;
pub use logging::{log, LogLevel};
