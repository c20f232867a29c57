//! Gradient-boosted regression trees with squared loss, trained by xgboost.
//!
//! Boosting starts from the target mean (`base_score`); each round fits a
//! tree of depth `max_depth` on a row subsample and adds it scaled by the
//! learning rate. The booster handle is not thread-safe, so the fitted model
//! is kept as xgboost's saved model bytes and reloaded for prediction.

use super::{check_xy, ModelError, Regressor};
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::NamedTempFile;
use xgboost::parameters::learning::{LearningTaskParametersBuilder, Objective};
use xgboost::parameters::tree::TreeBoosterParametersBuilder;
use xgboost::parameters::{BoosterParametersBuilder, BoosterType, TrainingParametersBuilder};
use xgboost::{Booster, DMatrix};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum per leaf; with squared loss this is a row count.
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each round.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 4,
            min_samples_leaf: 5,
            subsample: 0.8,
            seed: 42,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::invalid("n_estimators", "must be >= 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ModelError::invalid(
                "learning_rate",
                format!("must be in (0, 1], got {}", self.learning_rate),
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ModelError::invalid(
                "subsample",
                format!("must be in (0, 1], got {}", self.subsample),
            ));
        }
        if self.max_depth == 0 {
            return Err(ModelError::invalid("max_depth", "must be >= 1"));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::invalid("min_samples_leaf", "must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub params: BoostingParams,
    init: f64,
    n_features: Option<usize>,
    /// xgboost's saved model.
    model: Vec<u8>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            init: 0.0,
            n_features: None,
            model: Vec::new(),
        }
    }

    /// Training-set mean the ensemble starts from.
    pub fn initial_prediction(&self) -> f64 {
        self.init
    }

    fn booster(&self) -> Result<Booster, ModelError> {
        if self.n_features.is_none() {
            return Err(ModelError::NotFitted);
        }
        let tmp = NamedTempFile::new().map_err(backend_io)?;
        fs::write(tmp.path(), &self.model).map_err(backend_io)?;
        Ok(Booster::load(tmp.path())?)
    }
}

fn backend_io(e: std::io::Error) -> ModelError {
    ModelError::Backend(format!("booster model file: {e}"))
}

/// Row-major rows as an xgboost matrix.
fn dmatrix(x: &[Vec<f64>]) -> Result<DMatrix, ModelError> {
    let flat: Vec<f32> = x.iter().flatten().map(|&v| v as f32).collect();
    Ok(DMatrix::from_dense(&flat, x.len())?)
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        self.params.validate()?;
        let p = check_xy(x, y)?;
        let init = y.iter().sum::<f64>() / y.len() as f64;

        let mut dtrain = dmatrix(x)?;
        let labels: Vec<f32> = y.iter().map(|&v| v as f32).collect();
        dtrain.set_labels(&labels)?;

        let tree = TreeBoosterParametersBuilder::default()
            .eta(self.params.learning_rate as f32)
            .max_depth(u32::try_from(self.params.max_depth).unwrap_or(u32::MAX))
            .min_child_weight(u32::try_from(self.params.min_samples_leaf).unwrap_or(u32::MAX))
            .subsample(self.params.subsample as f32)
            .build()
            .map_err(ModelError::Backend)?;
        let learning = LearningTaskParametersBuilder::default()
            .objective(Objective::RegLinear)
            .base_score(init as f32)
            .seed(self.params.seed)
            .build()
            .map_err(ModelError::Backend)?;
        let booster_params = BoosterParametersBuilder::default()
            .booster_type(BoosterType::Tree(tree))
            .learning_params(learning)
            .verbose(false)
            .build()
            .map_err(ModelError::Backend)?;
        let training = TrainingParametersBuilder::default()
            .dtrain(&dtrain)
            .boost_rounds(u32::try_from(self.params.n_estimators).unwrap_or(u32::MAX))
            .booster_params(booster_params)
            .evaluation_sets(None)
            .build()
            .map_err(ModelError::Backend)?;
        let booster = Booster::train(&training)?;

        let tmp = NamedTempFile::new().map_err(backend_io)?;
        booster.save(tmp.path())?;
        let model = fs::read(tmp.path()).map_err(backend_io)?;

        tracing::debug!(
            rounds = self.params.n_estimators,
            rows = x.len(),
            model_bytes = model.len(),
            "fitted gradient boosting"
        );
        self.init = init;
        self.n_features = Some(p);
        self.model = model;
        Ok(())
    }

    fn predict_rows(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let booster = self.booster()?;
        let out = booster.predict(&dmatrix(x)?)?;
        Ok(out.into_iter().map(f64::from).collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..100).map(|i| vec![(i % 10) as f64, (i / 10) as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 * r[0] * r[0] + 10.0 * r[1]).collect();
        (x, y)
    }

    fn sse(m: &GradientBoosting, x: &[Vec<f64>], y: &[f64]) -> f64 {
        let pred = m.predict(x).unwrap();
        y.iter().zip(&pred).map(|(t, p)| (t - p).powi(2)).sum()
    }

    #[test]
    fn more_rounds_lower_training_error() {
        let (x, y) = data();
        let base = BoostingParams {
            n_estimators: 5,
            min_samples_leaf: 1,
            ..BoostingParams::default()
        };
        let mut few = GradientBoosting::new(base.clone());
        let mut many = GradientBoosting::new(BoostingParams { n_estimators: 80, ..base });
        few.fit(&x, &y).unwrap();
        many.fit(&x, &y).unwrap();
        assert!(sse(&many, &x, &y) < sse(&few, &x, &y));
    }

    #[test]
    fn starts_from_the_mean() {
        let (x, y) = data();
        let mut m = GradientBoosting::new(BoostingParams {
            n_estimators: 3,
            ..BoostingParams::default()
        });
        m.fit(&x, &y).unwrap();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        assert!((m.initial_prediction() - mean).abs() < 1e-9);
        let mean_sse: f64 = y.iter().map(|t| (t - mean).powi(2)).sum();
        assert!(sse(&m, &x, &y) < mean_sse);
    }

    #[test]
    fn rejects_bad_learning_rate_and_subsample() {
        let mut m = GradientBoosting::new(BoostingParams {
            learning_rate: 0.0,
            ..BoostingParams::default()
        });
        assert!(m.fit(&[vec![1.0]], &[1.0]).is_err());
        let mut m = GradientBoosting::new(BoostingParams {
            subsample: 1.5,
            ..BoostingParams::default()
        });
        assert!(m.fit(&[vec![1.0]], &[1.0]).is_err());
    }

    #[test]
    fn deterministic_for_seed() {
        let (x, y) = data();
        let mut a = GradientBoosting::new(BoostingParams::default());
        let mut b = GradientBoosting::new(BoostingParams::default());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn fitted_model_survives_serde() {
        let (x, y) = data();
        let mut m = GradientBoosting::new(BoostingParams {
            n_estimators: 20,
            ..BoostingParams::default()
        });
        m.fit(&x, &y).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: GradientBoosting = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict(&x).unwrap(), m.predict(&x).unwrap());
    }

    #[test]
    fn unfitted_booster_is_not_loaded() {
        let m = GradientBoosting::new(BoostingParams::default());
        assert_eq!(m.predict_rows(&[vec![1.0, 2.0]]), Err(ModelError::NotFitted));
    }
}
