//! Student risk classification pipeline.
//!
//! Predecir turns a raw CSV of student records into an explainable risk
//! classifier:
//! - Schema inference and keyword-based target detection
//! - Risk label derivation, categorical encoding, and feature scaling
//! - Rule-driven feature engineering shared by training and serving
//! - Tree ensembles (gradient boosting, random forest) with balanced
//!   class weights, stratified splits, and cross-validation
//! - Path-attribution explanations for individual predictions
//! - A versioned artifact bundle covering the train/save/load/predict cycle
//!
//! The [`train`], [`store`], and [`infer`] modules cover the full pipeline;
//! [`cli`] wraps them as subcommands of the `predecir` binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod explain;
pub mod features;
pub mod infer;
pub mod model;
pub mod preprocess;
pub mod schema;
pub mod store;
pub mod table;
pub mod train;

pub use config::PipelineSpec;
pub use error::{Error, Result};
pub use explain::{Explanation, TreeExplainer};
pub use infer::{explain, predict, predict_batch, simulate, BatchRow, Prediction};
pub use model::{ModelFamily, TrainedModel};
pub use preprocess::preprocess;
pub use schema::{locate_target, Schema};
pub use store::{load_bundle, save_bundle, ModelArtifactBundle};
pub use table::{read_csv, write_csv, Table, Value};
pub use train::{train, TrainConfig, TrainOutput, TrainingReport};
