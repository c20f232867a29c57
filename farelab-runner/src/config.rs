//! Pipeline configuration loaded from `farelab.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! working configuration. Values are validated once on load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use farelab_core::data::{CredentialStore, StageLayout};
use farelab_core::domain::dataset::{DEFAULT_FILE_NAME, DEFAULT_KAGGLE_REF};
use farelab_core::domain::DatasetRef;
use farelab_core::models::{BoostingParams, ForestParams, LinearParams, ModelKind, ModelParams};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "farelab.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub history_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifacts_dir: PathBuf::from("artifacts"),
            history_file: PathBuf::from("runs/history.jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// `owner/slug` on Kaggle.
    pub kaggle_ref: String,
    pub file_name: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            kaggle_ref: DEFAULT_KAGGLE_REF.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

/// Hold-out split and cross-validation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub cv_folds: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            cv_folds: 3,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub dataset: DatasetConfig,
    pub split: SplitConfig,
    pub linear: LinearParams,
    pub random_forest: ForestParams,
    pub gradient_boosting: BoostingParams,
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. Relative paths inside stay relative to the working directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, else defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.split;
        if !(s.test_fraction > 0.0 && s.test_fraction < 1.0) {
            return Err(invalid(
                "split.test_fraction",
                format!("{} is not in (0, 1)", s.test_fraction),
            ));
        }
        if s.cv_folds < 2 {
            return Err(invalid("split.cv_folds", "must be >= 2"));
        }
        self.dataset_ref()?;
        if self.dataset.file_name.trim().is_empty() {
            return Err(invalid("dataset.file_name", "must not be empty"));
        }

        for kind in ModelKind::ALL {
            self.params_for(kind)
                .validate()
                .map_err(|e| invalid(section_name(kind), e.to_string()))?;
        }
        Ok(())
    }

    pub fn dataset_ref(&self) -> Result<DatasetRef, ConfigError> {
        DatasetRef::parse(&self.dataset.kaggle_ref, self.dataset.file_name.clone()).ok_or_else(|| {
            invalid(
                "dataset.kaggle_ref",
                format!("'{}' is not of the form owner/slug", self.dataset.kaggle_ref),
            )
        })
    }

    /// Configured hyperparameters for a model family, seeded from `[split].seed`.
    pub fn params_for(&self, kind: ModelKind) -> ModelParams {
        match kind {
            ModelKind::Linear => ModelParams::Linear(self.linear.clone()),
            ModelKind::RandomForest => ModelParams::RandomForest(ForestParams {
                seed: self.split.seed,
                ..self.random_forest.clone()
            }),
            ModelKind::GradientBoosting => ModelParams::GradientBoosting(BoostingParams {
                seed: self.split.seed,
                ..self.gradient_boosting.clone()
            }),
        }
    }

    pub fn layout(&self) -> StageLayout {
        StageLayout::new(&self.paths.data_dir)
    }

    /// Where the raw dataset lands after `download`.
    pub fn raw_path(&self) -> PathBuf {
        self.layout()
            .dir(farelab_core::data::Stage::Raw)
            .join(&self.dataset.file_name)
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::standard()
    }
}

fn section_name(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Linear => "linear",
        ModelKind::RandomForest => "random_forest",
        ModelKind::GradientBoosting => "gradient_boosting",
    }
}
