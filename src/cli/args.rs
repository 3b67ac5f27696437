//! Argument definitions for the predecir binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PipelineSpec;
use crate::infer::DEFAULT_MAX_BATCH_ROWS;
use crate::model::ModelFamily;

/// Predecir: student risk classification pipeline
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "predecir")]
#[command(version)]
#[command(about = "Train, inspect, and serve explainable student-risk classifiers")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train a classifier and save its artifact bundle
    Train(TrainArgs),

    /// Score a CSV of records against a saved bundle
    Predict(PredictArgs),

    /// Break one prediction into per-feature contributions
    Explain(ExplainArgs),

    /// Summarize a dataset and the target the heuristic would pick
    Inspect(InspectArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Training dataset (CSV with a header row)
    #[arg(value_name = "DATA")]
    pub data: Option<PathBuf>,

    /// YAML pipeline configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target column, overriding detection
    #[arg(short, long)]
    pub target: Option<String>,

    /// Model family (gradient_boosting, random_forest, default)
    #[arg(short, long)]
    pub family: Option<ModelFamily>,

    /// Override the family's tree count
    #[arg(long)]
    pub trees: Option<usize>,

    /// Override the family's depth limit
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Override the boosting learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// Held-out fraction, strictly between 0 and 1
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Cross-validation folds over the training split
    #[arg(long)]
    pub cv_folds: Option<usize>,

    /// Bundle directory to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the engineered table to this CSV before fitting
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Validate the resolved configuration without training
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the predict command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct PredictArgs {
    /// Records to score (CSV with a header row)
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Bundle directory written by `train`
    #[arg(short, long, default_value = "model_bundle")]
    pub model: PathBuf,

    /// Column to take row identifiers from
    #[arg(long)]
    pub id_column: Option<String>,

    /// Most rows accepted in one batch
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_ROWS)]
    pub max_rows: usize,

    /// Write scored rows to this CSV
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the explain command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ExplainArgs {
    /// Records to explain (CSV with a header row)
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Bundle directory written by `train`
    #[arg(short, long, default_value = "model_bundle")]
    pub model: PathBuf,

    /// Row to explain, counted from 1
    #[arg(short, long, default_value_t = 1)]
    pub row: usize,

    /// Class index to attribute instead of the predicted one
    #[arg(long)]
    pub class: Option<usize>,

    /// Contributions to show
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the inspect command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// Dataset to summarize (CSV with a header row)
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Target column, overriding detection
    #[arg(short, long)]
    pub target: Option<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Unknown output format: {s}. Valid formats: text, json"
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a PipelineSpec
pub fn apply_overrides(spec: &mut PipelineSpec, args: &TrainArgs) {
    if let Some(data) = &args.data {
        spec.data.path = data.clone();
    }
    if let Some(target) = &args.target {
        spec.data.target = Some(target.clone());
    }
    if let Some(snapshot) = &args.snapshot {
        spec.data.snapshot = Some(snapshot.clone());
    }
    if let Some(family) = args.family {
        spec.model.family = family;
    }
    if let Some(trees) = args.trees {
        spec.model.n_trees = Some(trees);
    }
    if let Some(max_depth) = args.max_depth {
        spec.model.max_depth = Some(max_depth);
    }
    if let Some(learning_rate) = args.learning_rate {
        spec.model.learning_rate = Some(learning_rate);
    }
    if let Some(seed) = args.seed {
        spec.training.seed = seed;
    }
    if let Some(test_fraction) = args.test_fraction {
        spec.training.test_fraction = test_fraction;
    }
    if let Some(cv_folds) = args.cv_folds {
        spec.training.cv_folds = cv_folds;
    }
    if let Some(output) = &args.output {
        spec.serving.artifacts = output.clone();
    }
}
