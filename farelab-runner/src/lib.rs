//! FareLab Runner: pipeline orchestration on top of `farelab-core`.
//!
//! This crate provides:
//! - TOML pipeline configuration with validated defaults
//! - Preprocessing and feature persistence stages
//! - Seeded hold-out and k-fold splits
//! - Regression metrics (R², MAE, RMSE, MAPE)
//! - Training runs with optional grid search
//! - Model artifacts, evaluation and batch prediction
//! - JSONL experiment history
//! - Environment verification

pub mod artifacts;
pub mod config;
pub mod history;
pub mod inference;
pub mod metrics;
pub mod pipeline;
pub mod split;
pub mod trainer;
pub mod tuning;
pub mod verify;

pub use artifacts::{ArtifactError, FittedPipeline, SCHEMA_VERSION};
pub use config::{ConfigError, PipelineConfig, DEFAULT_CONFIG_FILE};
pub use history::{RankMetric, RunHistory, RunRecord};
pub use inference::{evaluate, predict, EvaluationReport, PredictionReport};
pub use metrics::RegressionMetrics;
pub use pipeline::{preprocess, PipelineError, PreprocessReport};
pub use split::{k_fold, train_test_split, SplitSpec, TrainTest};
pub use trainer::{fit_pipeline, train, train_with, RunError, TrainingData, TrainingResult};
pub use tuning::{grid_search, CandidateScore, TuningOutcome};
pub use verify::{verify, Check, CheckStatus, VerifyReport};
