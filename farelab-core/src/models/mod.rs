//! Regression models for fare prediction.
//!
//! All models implement [`Regressor`] over row-major `f64` matrices. The
//! fitting itself is done by `smartcore` (ridge, random forest) and
//! `xgboost` (gradient boosting). [`TrainedModel`] is the serialisable sum
//! of the three families and is what gets stored in fitted artifacts.

pub mod boosting;
pub mod forest;
pub mod linear;

use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use linear::{LinearParams, LinearRegression};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("cannot fit on zero rows")]
    EmptyInput,

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),


    #[error("invalid parameter {name}: {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("model has not been fitted")]
    NotFitted,

    #[error("model backend failed: {0}")]
    Backend(String),
}

impl ModelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ModelError::InvalidParam {
            name,
            reason: reason.into(),
        }
    }
}

impl From<smartcore::error::Failed> for ModelError {
    fn from(e: smartcore::error::Failed) -> Self {
        ModelError::Backend(e.to_string())
    }
}

impl From<xgboost::XGBError> for ModelError {
    fn from(e: xgboost::XGBError) -> Self {
        ModelError::Backend(e.to_string())
    }
}

/// A regression model over dense rows.
pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError>;

    /// Predictions for a non-empty batch. The model must be fitted and every
    /// row must have the fitted width; use [`Regressor::predict`] for checked
    /// prediction.
    fn predict_rows(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;

    /// Fitted input width, `None` before fitting.
    fn n_features(&self) -> Option<usize>;

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let width = self.n_features().ok_or(ModelError::NotFitted)?;
        if let Some(row) = x.iter().find(|r| r.len() != width) {
            return Err(ModelError::DimensionMismatch(format!(
                "model expects {width} features, row has {}",
                row.len()
            )));
        }
        if x.is_empty() {
            return Ok(Vec::new());
        }
        self.predict_rows(x)
    }
}

/// Shared input checks for `fit`. Returns the row width.
pub(crate) fn check_xy(x: &[Vec<f64>], y: &[f64]) -> Result<usize, ModelError> {
    if x.is_empty() {
        return Err(ModelError::EmptyInput);
    }
    if x.len() != y.len() {
        return Err(ModelError::DimensionMismatch(format!(
            "{} rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 {
        return Err(ModelError::DimensionMismatch("rows have no features".into()));
    }
    if let Some(r) = x.iter().find(|r| r.len() != width) {
        return Err(ModelError::DimensionMismatch(format!(
            "ragged rows: expected width {width}, found {}",
            r.len()
        )));
    }
    Ok(width)
}

/// Row-major rows as a smartcore matrix.
pub(crate) fn dense(x: &[Vec<f64>]) -> DenseMatrix<f64> {
    DenseMatrix::from_2d_vec(&x.to_vec())
}

/// Model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Linear,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "linear" | "linear_regression" | "ridge" => Ok(ModelKind::Linear),
            "random_forest" | "rf" | "forest" => Ok(ModelKind::RandomForest),
            "gradient_boosting" | "gbt" | "gbm" | "xgboost" => Ok(ModelKind::GradientBoosting),
            other => Err(ModelError::invalid(
                "model",
                format!("unknown model '{other}' (expected linear, random_forest or gradient_boosting)"),
            )),
        }
    }
}

/// Hyperparameters for one model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParams {
    Linear(LinearParams),
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
}

impl ModelParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelParams::Linear(_) => ModelKind::Linear,
            ModelParams::RandomForest(_) => ModelKind::RandomForest,
            ModelParams::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            ModelParams::Linear(p) => p.validate(),
            ModelParams::RandomForest(p) => p.validate(),
            ModelParams::GradientBoosting(p) => p.validate(),
        }
    }

    /// Compact `k=v` description for reports.
    pub fn describe(&self) -> String {
        match self {
            ModelParams::Linear(p) => format!("alpha={}", p.alpha),
            ModelParams::RandomForest(p) => format!(
                "n_trees={} max_depth={} min_samples_leaf={} max_features={}",
                p.n_trees, p.max_depth, p.min_samples_leaf, p.max_features
            ),
            ModelParams::GradientBoosting(p) => format!(
                "n_estimators={} learning_rate={} max_depth={} min_samples_leaf={} subsample={}",
                p.n_estimators, p.learning_rate, p.max_depth, p.min_samples_leaf, p.subsample
            ),
        }
    }
}

/// A model of any family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    Linear(LinearRegression),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl TrainedModel {
    /// An unfitted model for the given parameters.
    pub fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        params.validate()?;
        Ok(match params {
            ModelParams::Linear(p) => TrainedModel::Linear(LinearRegression::new(p.clone())),
            ModelParams::RandomForest(p) => TrainedModel::RandomForest(RandomForest::new(p.clone())),
            ModelParams::GradientBoosting(p) => {
                TrainedModel::GradientBoosting(GradientBoosting::new(p.clone()))
            }
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::Linear(_) => ModelKind::Linear,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            TrainedModel::Linear(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            TrainedModel::Linear(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
        }
    }
}

impl Regressor for TrainedModel {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        self.inner_mut().fit(x, y)
    }

    fn predict_rows(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        self.inner().predict_rows(x)
    }

    fn n_features(&self) -> Option<usize> {
        self.inner().n_features()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_aliases_parse() {
        assert_eq!("rf".parse::<ModelKind>().unwrap(), ModelKind::RandomForest);
        assert_eq!("XGBoost".parse::<ModelKind>().unwrap(), ModelKind::GradientBoosting);
        assert_eq!("gradient-boosting".parse::<ModelKind>().unwrap(), ModelKind::GradientBoosting);
        assert_eq!("linear".parse::<ModelKind>().unwrap(), ModelKind::Linear);
        assert!("svm".parse::<ModelKind>().is_err());
    }

    #[test]
    fn kind_round_trips_through_display() {
        for k in ModelKind::ALL {
            assert_eq!(k.to_string().parse::<ModelKind>().unwrap(), k);
        }
    }

    #[test]
    fn unfitted_model_refuses_to_predict() {
        let m = TrainedModel::from_params(&ModelParams::Linear(LinearParams::default())).unwrap();
        assert_eq!(m.predict(&[vec![1.0]]), Err(ModelError::NotFitted));
    }

    #[test]
    fn check_xy_rejects_bad_shapes() {
        assert_eq!(check_xy(&[], &[]), Err(ModelError::EmptyInput));
        assert!(matches!(
            check_xy(&[vec![1.0]], &[1.0, 2.0]),
            Err(ModelError::DimensionMismatch(_))
        ));
        assert!(matches!(
            check_xy(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]),
            Err(ModelError::DimensionMismatch(_))
        ));
        assert!(matches!(
            check_xy(&[vec![], vec![]], &[1.0, 2.0]),
            Err(ModelError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn serialized_model_keeps_kind_tag() {
        let mut m = TrainedModel::from_params(&ModelParams::Linear(LinearParams { alpha: 0.0 })).unwrap();
        m.fit(&[vec![0.0], vec![1.0], vec![2.0]], &[1.0, 3.0, 5.0]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"kind\":\"linear\""));
        let back: TrainedModel = serde_json::from_str(&json).unwrap();
        let p = back.predict(&[vec![3.0]]).unwrap();
        assert!((p[0] - 7.0).abs() < 1e-6);
    }

    #[test]
    fn empty_batch_predicts_nothing() {
        let mut m = TrainedModel::from_params(&ModelParams::Linear(LinearParams::default())).unwrap();
        m.fit(&[vec![0.0], vec![1.0], vec![2.0]], &[1.0, 3.0, 5.0]).unwrap();
        assert_eq!(m.predict(&[]).unwrap(), Vec::<f64>::new());
        assert!(matches!(
            m.predict(&[vec![1.0, 2.0]]),
            Err(ModelError::DimensionMismatch(_))
        ));
    }
}
