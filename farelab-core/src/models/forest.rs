//! Random forest: smartcore's bagged CART regressor.
//!
//! Each tree sees a bootstrap sample and considers `ceil(max_features * p)`
//! candidate features per split. The forest RNG is seeded from
//! `ForestParams::seed`, so a forest is reproducible for a given seed.

use super::{check_xy, dense, ModelError, Regressor};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::sync::Arc;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Fraction of features considered at each split.
    pub max_features: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_leaf: 2,
            max_features: 0.5,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_trees == 0 {
            return Err(ModelError::invalid("n_trees", "must be >= 1"));
        }
        if self.max_depth == 0 {
            return Err(ModelError::invalid("max_depth", "must be >= 1"));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::invalid("min_samples_leaf", "must be >= 1"));
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(ModelError::invalid(
                "max_features",
                format!("must be in (0, 1], got {}", self.max_features),
            ));
        }
        Ok(())
    }

    fn forest(&self, n_features: usize) -> RandomForestRegressorParameters {
        let m = ((self.max_features * n_features as f64).ceil() as usize).clamp(1, n_features);
        RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees)
            .with_max_depth(u16::try_from(self.max_depth).unwrap_or(u16::MAX))
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_min_samples_split(2)
            .with_m(m)
            .with_seed(self.seed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    n_features: Option<usize>,
    forest: Option<Arc<Forest>>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            n_features: None,
            forest: None,
        }
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        self.params.validate()?;
        let p = check_xy(x, y)?;
        let forest = Forest::fit(&dense(x), &y.to_vec(), self.params.forest(p))?;
        tracing::debug!(trees = self.params.n_trees, rows = x.len(), "fitted random forest");
        self.forest = Some(Arc::new(forest));
        self.n_features = Some(p);
        Ok(())
    }

    fn predict_rows(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let forest = self.forest.as_ref().ok_or(ModelError::NotFitted)?;
        Ok(forest.predict(&dense(x))?)
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..120)
            .map(|i| vec![(i % 12) as f64, (i / 12) as f64, ((i * 5) % 7) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 100.0 * r[0] + 20.0 * r[1]).collect();
        (x, y)
    }

    fn small() -> ForestParams {
        ForestParams {
            n_trees: 12,
            max_depth: 6,
            min_samples_leaf: 1,
            max_features: 0.67,
            seed: 9,
        }
    }

    fn fitted(params: ForestParams) -> (RandomForest, Vec<Vec<f64>>, Vec<f64>) {
        let (x, y) = data();
        let mut f = RandomForest::new(params);
        f.fit(&x, &y).unwrap();
        (f, x, y)
    }

    #[test]
    fn same_seed_same_forest() {
        let (a, x, _) = fitted(small());
        let (b, _, _) = fitted(small());
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn different_seed_different_forest() {
        let (a, x, _) = fitted(small());
        let (b, _, _) = fitted(ForestParams { seed: 10, ..small() });
        assert_ne!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn beats_the_mean_predictor() {
        let (f, x, y) = fitted(small());
        let pred = f.predict(&x).unwrap();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let sse_mean: f64 = y.iter().map(|t| (t - mean).powi(2)).sum();
        let sse_forest: f64 = y.iter().zip(&pred).map(|(t, p)| (t - p).powi(2)).sum();
        assert!(sse_forest < 0.1 * sse_mean);
    }

    #[test]
    fn survives_a_serde_round_trip() {
        let (f, x, _) = fitted(small());
        let json = serde_json::to_string(&f).unwrap();
        let back: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.n_features(), Some(3));
        let before = f.predict(&x).unwrap();
        let after = back.predict(&x).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0));
        }
    }

    #[test]
    fn zero_trees_is_invalid() {
        let mut f = RandomForest::new(ForestParams { n_trees: 0, ..small() });
        assert!(matches!(f.fit(&[vec![1.0]], &[1.0]), Err(ModelError::InvalidParam { .. })));
    }

    #[test]
    fn max_features_outside_unit_interval_is_invalid() {
        let mut f = RandomForest::new(ForestParams { max_features: 0.0, ..small() });
        assert!(matches!(
            f.fit(&[vec![1.0]], &[1.0]),
            Err(ModelError::InvalidParam { name: "max_features", .. })
        ));
    }
}
