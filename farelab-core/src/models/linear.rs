//! Ridge linear regression on standardised features.
//!
//! The fit is smartcore's `RidgeRegression` with column normalisation and a
//! Cholesky solve. Columns with zero variance in the training data are left
//! out of the fit and get a zero coefficient. The fitted plane is stored as
//! plain coefficients on the original feature scale.

use super::{check_xy, dense, ModelError, Regressor};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::ridge_regression::{
    RidgeRegression, RidgeRegressionParameters, RidgeRegressionSolverName,
};

type Ridge = RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    /// L2 penalty on standardised coefficients. 0 gives ordinary least squares.
    pub alpha: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl LinearParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(ModelError::invalid("alpha", format!("must be >= 0, got {}", self.alpha)));
        }
        Ok(())
    }

    fn ridge(&self) -> RidgeRegressionParameters<f64> {
        RidgeRegressionParameters::default()
            .with_alpha(self.alpha)
            .with_solver(RidgeRegressionSolverName::Cholesky)
            .with_normalize(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub params: LinearParams,
    coefficients: Vec<f64>,
    intercept: f64,
    fitted: bool,
}

impl LinearRegression {
    pub fn new(params: LinearParams) -> Self {
        Self {
            params,
            coefficients: Vec::new(),
            intercept: 0.0,
            fitted: false,
        }
    }

    /// Coefficients on the original feature scale.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

fn column_std(x: &[Vec<f64>], j: usize) -> f64 {
    let n = x.len() as f64;
    let mean = x.iter().map(|r| r[j]).sum::<f64>() / n;
    (x.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n).sqrt()
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        self.params.validate()?;
        let p = check_xy(x, y)?;
        let y_mean = y.iter().sum::<f64>() / x.len() as f64;
        let active: Vec<usize> = (0..p).filter(|&j| column_std(x, j) > 1e-12).collect();

        let mut coefficients = vec![0.0; p];
        let intercept = if active.is_empty() {
            y_mean
        } else {
            let k = active.len();
            let xa: Vec<Vec<f64>> = x
                .iter()
                .map(|r| active.iter().map(|&j| r[j]).collect())
                .collect();
            let ridge = Ridge::fit(&dense(&xa), &y.to_vec(), self.params.ridge())?;

            // Row 0 is the origin, row i is the i-th unit vector.
            let basis: Vec<Vec<f64>> = (0..=k)
                .map(|i| {
                    let mut r = vec![0.0; k];
                    if i > 0 {
                        r[i - 1] = 1.0;
                    }
                    r
                })
                .collect();
            let at = ridge.predict(&dense(&basis))?;
            for (i, &j) in active.iter().enumerate() {
                coefficients[j] = at[i + 1] - at[0];
            }
            at[0]
        };

        tracing::debug!(features = p, active = active.len(), alpha = self.params.alpha, "fitted linear model");
        self.coefficients = coefficients;
        self.intercept = intercept;
        self.fitted = true;
        Ok(())
    }

    fn predict_rows(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        Ok(x.iter()
            .map(|row| {
                self.intercept
                    + self
                        .coefficients
                        .iter()
                        .zip(row)
                        .map(|(c, v)| c * v)
                        .sum::<f64>()
            })
            .collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.fitted.then_some(self.coefficients.len())
    }
}
