//! Training runs: split, encode, optionally tune, fit, score, persist.
//!
//! Two entry points:
//! - `fit_pipeline()`: pure, records in, fitted pipeline + result out. No I/O.
//! - `train()` / `train_with()`: loads data (or generates it), calls
//!   `fit_pipeline()`, then writes the feature matrix, the artifact and a
//!   history record. Used by the CLI.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use farelab_core::data::stages::short_hash;
use farelab_core::data::{DataError, StageError};
use farelab_core::domain::FlightRecord;
use farelab_core::features::{FeatureEncoder, FeatureError, FeatureMatrix};
use farelab_core::models::{ModelError, ModelKind, ModelParams, Regressor, TrainedModel};
use farelab_core::synthetic::synthetic_flights;

use crate::artifacts::{ArtifactError, FittedPipeline, SCHEMA_VERSION};
use crate::config::{ConfigError, PipelineConfig};
use crate::history::{RunHistory, RunRecord};
use crate::metrics::RegressionMetrics;
use crate::pipeline::{dataset_hash, persist_features, preprocess, PipelineError};
use crate::split::{train_test_split, SplitSpec};
use crate::tuning::{grid_search, TuningOutcome};

/// Fewer rows than this cannot give a meaningful split.
pub const MIN_TRAINING_ROWS: usize = 10;

/// Errors from training, evaluation and prediction.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("history error: {0}")]
    History(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("need at least {required} usable rows, got {rows}")]
    NotEnoughRows { rows: usize, required: usize },
    #[error("CSV error: {0}")]
    Csv(String),
}

/// Where training rows come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingData {
    /// A CSV on disk; `None` means the configured raw dataset.
    Dataset { input: Option<PathBuf> },
    /// Generated flights, seeded from `[split].seed`.
    Synthetic { rows: usize },
}

/// Summary of one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub kind: ModelKind,
    pub params: ModelParams,
    pub tuned: bool,
    pub train_metrics: RegressionMetrics,
    pub test_metrics: RegressionMetrics,
    pub cv_rmse: Option<f64>,
    pub tuning: Option<TuningOutcome>,
    pub dataset_hash: String,
    pub feature_count: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub duration_ms: u64,
    pub artifact_path: Option<PathBuf>,
    pub features_path: Option<PathBuf>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Output of `fit_pipeline`.
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub result: TrainingResult,
    pub pipeline: FittedPipeline,
    pub train_matrix: FeatureMatrix,
}

#[derive(Serialize)]
struct RunKey<'a> {
    dataset_hash: &'a str,
    kind: ModelKind,
    params: &'a ModelParams,
    split: SplitSpec,
}

/// Deterministic run id: BLAKE3 over dataset hash, family, params and split.
pub fn run_id(
    dataset_hash: &str,
    params: &ModelParams,
    split: SplitSpec,
) -> Result<String, serde_json::Error> {
    let key = RunKey {
        dataset_hash,
        kind: params.kind(),
        params,
        split,
    };
    let json = serde_json::to_vec(&key)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

fn pick(records: &[FlightRecord], indices: &[usize]) -> Vec<FlightRecord> {
    indices.iter().map(|&i| records[i].clone()).collect()
}

/// Split, encode, optionally tune, fit and score. No I/O.
pub fn fit_pipeline(
    config: &PipelineConfig,
    kind: ModelKind,
    tune: bool,
    records: &[FlightRecord],
    dataset_hash: &str,
) -> Result<FitOutput, RunError> {
    let start = Instant::now();
    if records.len() < MIN_TRAINING_ROWS {
        return Err(RunError::NotEnoughRows {
            rows: records.len(),
            required: MIN_TRAINING_ROWS,
        });
    }

    let spec = SplitSpec {
        test_fraction: config.split.test_fraction,
        seed: config.split.seed,
    };
    let split = train_test_split(records.len(), spec);
    let train_records = pick(records, &split.train);
    let test_records = pick(records, &split.test);

    let encoder = FeatureEncoder::fit(&train_records)?;
    let train_m = encoder.transform(&train_records);
    let test_m = encoder.transform(&test_records);

    let base = config.params_for(kind);
    let (params, tuning) = if tune {
        let outcome = grid_search(&base, &train_m, config.split.cv_folds, config.split.seed)?;
        (outcome.best.clone(), Some(outcome))
    } else {
        (base, None)
    };

    let mut model = TrainedModel::from_params(&params)?;
    model.fit(&train_m.rows, &train_m.targets)?;
    let train_metrics = RegressionMetrics::compute(&train_m.targets, &model.predict(&train_m.rows)?);
    let test_metrics = RegressionMetrics::compute(&test_m.targets, &model.predict(&test_m.rows)?);

    let run_id = run_id(dataset_hash, &params, spec)?;
    info!(
        run_id = %short_hash(&run_id),
        model = %kind,
        test_rmse = test_metrics.rmse,
        test_r2 = test_metrics.r2,
        "model fitted"
    );

    let feature_names = encoder.feature_names();
    let result = TrainingResult {
        schema_version: SCHEMA_VERSION,
        run_id: run_id.clone(),
        kind,
        params: params.clone(),
        tuned: tune,
        train_metrics,
        test_metrics,
        cv_rmse: tuning.as_ref().map(|t| t.best_cv_rmse),
        tuning,
        dataset_hash: dataset_hash.to_string(),
        feature_count: feature_names.len(),
        train_rows: train_m.len(),
        test_rows: test_m.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        artifact_path: None,
        features_path: None,
    };
    let pipeline = FittedPipeline {
        schema_version: SCHEMA_VERSION,
        run_id,
        kind,
        params,
        split: spec,
        dataset_hash: dataset_hash.to_string(),
        feature_names,
        encoder,
        model,
    };
    Ok(FitOutput {
        result,
        pipeline,
        train_matrix: train_m,
    })
}

/// Train on the configured raw dataset.
pub fn train(config: &PipelineConfig, kind: ModelKind, tune: bool) -> Result<TrainingResult, RunError> {
    train_with(config, kind, tune, &TrainingData::Dataset { input: None })
}

/// Train and persist: feature matrix, artifact, history record.
pub fn train_with(
    config: &PipelineConfig,
    kind: ModelKind,
    tune: bool,
    data: &TrainingData,
) -> Result<TrainingResult, RunError> {
    let start = Instant::now();
    let layout = config.layout();
    layout.ensure()?;

    let (records, hash) = match data {
        TrainingData::Dataset { input } => {
            let path = input.clone().unwrap_or_else(|| config.raw_path());
            let (report, records) = preprocess(&layout, &path)?;
            (records, report.dataset_hash)
        }
        TrainingData::Synthetic { rows } => {
            let records = synthetic_flights(*rows, config.split.seed);
            let hash = dataset_hash(&records)?;
            info!(rows, "generated synthetic training data");
            (records, hash)
        }
    };

    let fitted = fit_pipeline(config, kind, tune, &records, &hash)?;
    let key = format!(
        "{hash}:{}:{}:train",
        serde_json::to_string(&fitted.pipeline.split)?,
        fitted.pipeline.feature_names.len()
    );
    let (features_path, _) = persist_features(&layout, "features_train", &key, &fitted.train_matrix)?;
    let artifact_path = fitted.pipeline.save(&config.paths.artifacts_dir)?;

    let mut result = fitted.result;
    result.artifact_path = Some(artifact_path);
    result.features_path = Some(features_path);
    result.duration_ms = start.elapsed().as_millis() as u64;

    RunHistory::new(&config.paths.history_file).append(&RunRecord::from_result(&result, Utc::now()))?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use farelab_core::models::{BoostingParams, LinearParams};

    fn small_config() -> PipelineConfig {
        let mut c = PipelineConfig::default();
        c.random_forest.n_trees = 10;
        c.gradient_boosting.n_estimators = 30;
        c
    }

    #[test]
    fn run_id_is_deterministic_and_param_sensitive() {
        let split = SplitSpec {
            test_fraction: 0.2,
            seed: 42,
        };
        let p1 = ModelParams::Linear(LinearParams { alpha: 1.0 });
        let p2 = ModelParams::Linear(LinearParams { alpha: 2.0 });
        assert_eq!(run_id("h", &p1, split).unwrap(), run_id("h", &p1, split).unwrap());
        assert_ne!(run_id("h", &p1, split).unwrap(), run_id("h", &p2, split).unwrap());
        assert_ne!(run_id("h", &p1, split).unwrap(), run_id("g", &p1, split).unwrap());
        let other_split = SplitSpec { seed: 1, ..split };
        assert_ne!(run_id("h", &p1, split).unwrap(), run_id("h", &p1, other_split).unwrap());
        assert_eq!(run_id("h", &p1, split).unwrap().len(), 64);
    }

    #[test]
    fn every_family_beats_the_mean_on_training_data() {
        let config = small_config();
        let records = synthetic_flights(200, 3);
        for kind in ModelKind::ALL {
            let out = fit_pipeline(&config, kind, false, &records, "hash").unwrap();
            assert!(out.result.train_metrics.r2 > 0.0, "{kind}: {:?}", out.result.train_metrics);
            assert_eq!(out.result.train_rows + out.result.test_rows, 200);
            assert_eq!(out.result.test_rows, 40);
            assert_eq!(out.pipeline.kind, kind);
            assert!(out.result.cv_rmse.is_none());
        }
    }

    #[test]
    fn same_inputs_same_run() {
        let config = small_config();
        let records = synthetic_flights(100, 4);
        let a = fit_pipeline(&config, ModelKind::RandomForest, false, &records, "h").unwrap();
        let b = fit_pipeline(&config, ModelKind::RandomForest, false, &records, "h").unwrap();
        assert_eq!(a.result.run_id, b.result.run_id);
        assert_eq!(a.result.test_metrics, b.result.test_metrics);
    }

    #[test]
    fn tuning_reports_cv_score_and_winner() {
        let mut config = small_config();
        config.gradient_boosting = BoostingParams {
            n_estimators: 10,
            ..BoostingParams::default()
        };
        let records = synthetic_flights(90, 6);
        let out = fit_pipeline(&config, ModelKind::GradientBoosting, true, &records, "h").unwrap();
        let tuning = out.result.tuning.as_ref().unwrap();
        assert!(out.result.tuned);
        assert_eq!(out.result.cv_rmse, Some(tuning.best_cv_rmse));
        assert_eq!(out.result.params, tuning.best);
        assert_eq!(out.pipeline.params, tuning.best);
    }

    #[test]
    fn too_few_rows_fail_cleanly() {
        let records = synthetic_flights(5, 1);
        match fit_pipeline(&PipelineConfig::default(), ModelKind::Linear, false, &records, "h") {
            Err(RunError::NotEnoughRows { rows: 5, required }) => assert_eq!(required, MIN_TRAINING_ROWS),
            other => panic!("unexpected {other:?}"),
        }
    }
}
