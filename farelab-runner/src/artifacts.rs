//! Fitted pipeline artifacts: encoder + model + the split that produced them.
//!
//! Saved as pretty JSON to `artifacts/<run_id12>.json` with an atomic write.
//! An artifact carries everything needed to encode new rows and to
//! re-derive its own held-out split.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use farelab_core::data::stages::{atomic_write, short_hash};
use farelab_core::data::StageError;
use farelab_core::domain::FlightRecord;
use farelab_core::features::FeatureEncoder;
use farelab_core::models::{ModelError, ModelKind, ModelParams, Regressor, TrainedModel};

use crate::split::SplitSpec;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact {} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact schema version {found} is newer than supported version {SCHEMA_VERSION}")]
    UnsupportedSchema { found: u32 },

    #[error("artifact is inconsistent: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Stage(#[from] StageError),
}

/// Everything needed to score new flights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub kind: ModelKind,
    pub params: ModelParams,
    pub split: SplitSpec,
    pub dataset_hash: String,
    pub encoder: FeatureEncoder,
    pub model: TrainedModel,
    pub feature_names: Vec<String>,
}

impl FittedPipeline {
    /// Encode and score records.
    pub fn predict_records(&self, records: &[FlightRecord]) -> Result<Vec<f64>, ModelError> {
        let rows: Vec<Vec<f64>> = records.iter().map(|r| self.encoder.encode(r)).collect();
        self.model.predict(&rows)
    }

    /// `<dir>/<run_id12>.json`
    pub fn artifact_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", short_hash(&self.run_id)))
    }

    /// Write the artifact into `dir`. Returns the file path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ArtifactError> {
        let path = self.artifact_path(dir);
        let json = serde_json::to_vec_pretty(self).map_err(|e| ArtifactError::Json {
            path: path.clone(),
            source: e,
        })?;
        atomic_write(&path, &json)?;
        tracing::info!(path = %path.display(), run_id = %short_hash(&self.run_id), "saved model artifact");
        Ok(path)
    }

    /// Load and check an artifact.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => {
                return Err(ArtifactError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let pipeline: Self = serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        pipeline.check()?;
        Ok(pipeline)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(ArtifactError::UnsupportedSchema {
                found: self.schema_version,
            });
        }
        if self.model.kind() != self.kind {
            return Err(ArtifactError::Inconsistent(format!(
                "header says {} but model is {}",
                self.kind,
                self.model.kind()
            )));
        }
        if self.encoder.feature_names() != self.feature_names {
            return Err(ArtifactError::Inconsistent(
                "feature names do not match the encoder".into(),
            ));
        }
        match self.model.n_features() {
            Some(w) if w == self.feature_names.len() => Ok(()),
            Some(w) => Err(ArtifactError::Inconsistent(format!(
                "model expects {w} features, encoder produces {}",
                self.feature_names.len()
            ))),
            None => Err(ArtifactError::Inconsistent("model is not fitted".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farelab_core::models::LinearParams;
    use farelab_core::synthetic::synthetic_flights;

    fn fitted() -> FittedPipeline {
        let records = synthetic_flights(60, 3);
        let encoder = FeatureEncoder::fit(&records).unwrap();
        let m = encoder.transform(&records);
        let params = ModelParams::Linear(LinearParams::default());
        let mut model = TrainedModel::from_params(&params).unwrap();
        model.fit(&m.rows, &m.targets).unwrap();
        FittedPipeline {
            schema_version: SCHEMA_VERSION,
            run_id: "0123456789abcdef0123".into(),
            kind: ModelKind::Linear,
            params,
            split: SplitSpec {
                test_fraction: 0.2,
                seed: 42,
            },
            dataset_hash: "feed".into(),
            feature_names: encoder.feature_names(),
            encoder,
            model,
        }
    }

    #[test]
    fn save_load_roundtrip_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let p = fitted();
        let path = p.save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("0123456789ab.json"));

        let loaded = FittedPipeline::load(&path).unwrap();
        let records = synthetic_flights(10, 8);
        assert_eq!(
            p.predict_records(&records).unwrap(),
            loaded.predict_records(&records).unwrap()
        );
    }

    #[test]
    fn newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = fitted();
        p.schema_version = SCHEMA_VERSION + 1;
        let path = p.save(dir.path()).unwrap();
        assert!(matches!(
            FittedPipeline::load(&path),
            Err(ArtifactError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn mismatched_feature_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = fitted();
        p.feature_names.pop();
        let path = p.save(dir.path()).unwrap();
        assert!(matches!(
            FittedPipeline::load(&path),
            Err(ArtifactError::Inconsistent(_))
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FittedPipeline::load(&dir.path().join("nope.json")),
            Err(ArtifactError::NotFound { .. })
        ));
    }
}
