//! Pipeline error types

use thiserror::Error;

/// Errors surfaced by the risk-classification pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// No column matched the target-detection heuristic
    #[error("No target column found; inspected columns: [{}]", columns.join(", "))]
    NoTargetFound { columns: Vec<String> },

    /// A required artifact was absent when loading a model bundle
    #[error("Model not loaded: missing artifact '{missing}'")]
    ModelNotLoaded { missing: String },

    /// The bundle carries no explainer; callers degrade to "no explanation"
    #[error("Explainer unavailable for this model bundle")]
    ExplainerUnavailable,

    /// A record could not be mapped onto the frozen feature list
    #[error("Feature mismatch: {0}")]
    FeatureMismatch(String),

    /// The requested model family cannot handle this training setup
    #[error("Unsupported model configuration: {0}")]
    UnsupportedModel(String),

    /// A caller-supplied parameter is out of range or inconsistent
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The input table has no rows or no columns
    #[error("Empty table: {0}")]
    EmptyTable(String),

    /// Referenced column does not exist in the table
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e.to_string())
    }
}
